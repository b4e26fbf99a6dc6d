//! Hosting API trait definition.

use async_trait::async_trait;

use crate::destination::RepoUrl;
use crate::error::HostingError;

/// The parts of a hosting service's API the engine uses.
///
/// Implementations hold their credential explicitly. There is no process-wide
/// client; a handle is passed to whoever needs it, and
/// [`reauthenticate`](HostingApi::reauthenticate) is the only way its
/// credential changes.
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Lists branch names (without `refs/heads/`) that start with `prefix`.
    async fn list_branches(&self, repo: &RepoUrl, prefix: &str)
    -> Result<Vec<String>, HostingError>;

    /// Creates a private repository owned by the authenticated identity and
    /// returns its clone URL.
    async fn create_private_repository(&self, name: &str) -> Result<RepoUrl, HostingError>;

    /// Returns true if the repository exists and is visible to the credential.
    async fn repository_exists(&self, repo: &RepoUrl) -> Result<bool, HostingError>;

    /// Returns the login of the authenticated identity.
    async fn authenticated_user(&self) -> Result<String, HostingError>;

    /// Reloads the credential and checks it. Returns the login on success.
    async fn reauthenticate(&self) -> Result<String, HostingError>;
}

/// Makes sure `api` holds an accepted credential, re-authenticating once if
/// it was rejected.
///
/// Any other failure leaves the credential unjudged: it is logged and the
/// caller carries on, so an unreachable service surfaces at the step that
/// actually needs it.
pub async fn ensure_authenticated(api: &dyn HostingApi) -> snapkeep_core::Result<()> {
    match api.authenticated_user().await {
        Ok(_) => return Ok(()),
        Err(HostingError::Unauthorized(_)) => {},
        Err(e) => {
            tracing::warn!(error = %e, "Could not verify hosting credential, continuing");
            return Ok(());
        },
    }

    tracing::info!("Hosting credential not accepted, re-authenticating");
    api.reauthenticate()
        .await
        .map(drop)
        .map_err(|e| snapkeep_core::SnapshotError::authentication(e.to_string()))
}
