//! Hosting service API: branch enumeration, repository provisioning and
//! credential checks.

mod credential;
mod github;
mod traits;

pub use credential::{CredentialSource, EnvCredential, StaticCredential};
pub use github::GitHubClient;
pub use traits::{HostingApi, ensure_authenticated};
