mod client;
mod pagination;
mod types;

pub use client::GitHubClient;
pub use types::{ActorProfile, CommitRecord, GitHubError, RepoCommits, RepositoryRef};
