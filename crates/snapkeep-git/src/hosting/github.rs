//! GitHub REST API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::credential::CredentialSource;
use super::traits::HostingApi;
use crate::destination::RepoUrl;
use crate::error::HostingError;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct RefEntry {
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoEntry {
    clone_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    private: bool,
    auto_init: bool,
}

/// Authenticated GitHub API handle.
///
/// The token is loaded from its [`CredentialSource`] when the client is built
/// and again on each [`reauthenticate`](HostingApi::reauthenticate).
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    credentials: Arc<dyn CredentialSource>,
    token: RwLock<Option<String>>,
}

impl GitHubClient {
    /// Creates a client against api.github.com.
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Result<Self, HostingError> {
        Self::with_api_base(credentials, DEFAULT_API_BASE, Duration::from_secs(30))
    }

    /// Creates a client against a different API root, e.g. GitHub Enterprise.
    pub fn with_api_base(
        credentials: Arc<dyn CredentialSource>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HostingError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("snapkeep/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        let token = credentials.token();

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
            token: RwLock::new(token),
        })
    }

    /// Returns the API root.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<RequestBuilder, HostingError> {
        let token = self
            .token
            .read()
            .clone()
            .ok_or_else(|| HostingError::Unauthorized("no API token configured".to_string()))?;

        Ok(self
            .http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION))
    }
}

/// Maps non-success statuses to errors.
async fn check(resp: Response, what: &str) -> Result<Response, HostingError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            HostingError::Unauthorized(format!("{what}: {message}"))
        },
        StatusCode::NOT_FOUND => HostingError::NotFound(what.to_string()),
        _ => HostingError::Http {
            status: status.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn list_branches(
        &self,
        repo: &RepoUrl,
        prefix: &str,
    ) -> Result<Vec<String>, HostingError> {
        let path = format!(
            "/repos/{}/{}/git/matching-refs/heads/{}",
            repo.owner(),
            repo.repo(),
            prefix
        );
        let resp = self.request(reqwest::Method::GET, &path)?.send().await?;

        // An empty repository has no refs at all and answers 409.
        if resp.status() == StatusCode::CONFLICT {
            debug!(repo = %repo, "Destination repository is empty");
            return Ok(Vec::new());
        }

        let refs: Vec<RefEntry> = check(resp, &repo.slug()).await?.json().await?;
        Ok(refs
            .into_iter()
            .filter_map(|r| r.reference.strip_prefix("refs/heads/").map(str::to_string))
            .collect())
    }

    async fn create_private_repository(&self, name: &str) -> Result<RepoUrl, HostingError> {
        let body = CreateRepoRequest {
            name,
            private: true,
            auto_init: false,
        };
        let resp = self
            .request(reqwest::Method::POST, "/user/repos")?
            .json(&body)
            .send()
            .await?;
        let created: RepoEntry = check(resp, name).await?.json().await?;

        info!(repo = %name, url = %created.clone_url, "Created private repository");

        RepoUrl::parse(&created.clone_url).map_err(|e| HostingError::Http {
            status: 200,
            message: e.to_string(),
        })
    }

    async fn repository_exists(&self, repo: &RepoUrl) -> Result<bool, HostingError> {
        let path = format!("/repos/{}/{}", repo.owner(), repo.repo());
        let resp = self.request(reqwest::Method::GET, &path)?.send().await?;
        match check(resp, &repo.slug()).await {
            Ok(_) => Ok(true),
            Err(HostingError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn authenticated_user(&self) -> Result<String, HostingError> {
        let resp = self.request(reqwest::Method::GET, "/user")?.send().await?;
        let user: UserEntry = check(resp, "authenticated user").await?.json().await?;
        Ok(user.login)
    }

    async fn reauthenticate(&self) -> Result<String, HostingError> {
        let token = self.credentials.token();
        *self.token.write() = token;
        let login = self.authenticated_user().await?;
        info!(login = %login, "Re-authenticated against hosting API");
        Ok(login)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("has_token", &self.token.read().is_some())
            .finish()
    }
}
