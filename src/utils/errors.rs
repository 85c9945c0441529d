use thiserror::Error;

/// Application-level failure. The verification engine converts these into a
/// `valid: false` report at its boundary, so nothing above it observes a
/// raised error in normal operation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("GitHub API error: {0}")]
    GitHub(#[from] crate::github::GitHubError),

    #[error("Validation error: {0}")]
    Validation(String),
}
