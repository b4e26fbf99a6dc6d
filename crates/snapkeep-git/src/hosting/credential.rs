//! Where API tokens come from.

/// Supplies the token used against the hosting API.
///
/// Called again on every re-authentication, so sources that read external
/// state pick up changes.
pub trait CredentialSource: Send + Sync {
    /// Returns the current token, if any.
    fn token(&self) -> Option<String>;
}

/// Reads the token from the first set environment variable.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    vars: Vec<String>,
}

impl EnvCredential {
    /// Reads from the given variables in order.
    pub fn new(vars: Vec<impl Into<String>>) -> Self {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for EnvCredential {
    fn default() -> Self {
        Self::new(vec!["SNAPKEEP_TOKEN", "GITHUB_TOKEN"])
    }
}

impl CredentialSource for EnvCredential {
    fn token(&self) -> Option<String> {
        self.vars
            .iter()
            .filter_map(|v| std::env::var(v).ok())
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
    }
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    /// Creates a source that always returns `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// Creates a source with no token.
    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredential {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

impl std::fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticCredential")
            .field(&self.0.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_credential_missing() {
        let source = EnvCredential::new(vec!["SNAPKEEP_TEST_TOKEN_THAT_IS_NEVER_SET"]);
        assert!(source.token().is_none());
    }

    #[test]
    fn test_static_credential() {
        assert_eq!(StaticCredential::new("abc").token().as_deref(), Some("abc"));
        assert!(StaticCredential::none().token().is_none());
    }

    #[test]
    fn test_static_credential_debug_hides_token() {
        let debug = format!("{:?}", StaticCredential::new("secret"));
        assert!(!debug.contains("secret"));
    }
}
