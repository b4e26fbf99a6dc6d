//! The VCS command layer.
//!
//! The engine talks to version control only through the [`Vcs`] trait.
//! [`GitCli`] implements it on top of the system `git` binary.

mod git_cli;
mod status;
mod traits;

pub use git_cli::GitCli;
pub use status::parse_porcelain_v2;
pub use traits::{CheckoutTarget, HeadState, IndexEntry, RemoteDirection, Vcs, WorkingTreeState};
