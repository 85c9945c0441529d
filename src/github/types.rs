use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("API request failed: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Response envelope for every GraphQL call. GitHub reports application
/// failures through `errors` even on HTTP 200, so both fields are optional.
#[derive(Debug, Deserialize)]
pub struct GraphQlEnvelope {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlErrorEntry {
    pub message: String,
}

/// The account whose contributions are being measured.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorProfile {
    pub login: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRef {
    pub name: String,
    pub owner: RepositoryOwner,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

impl RepositoryRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.login, self.name)
    }
}

/// Wire shape of a commit in the default-branch history connection.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitNode {
    #[serde(rename = "committedDate")]
    pub committed_date: DateTime<Utc>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub user: Option<AuthorUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorUser {
    pub login: String,
}

/// Wire shape of one day's commits in a contributions collection.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributionNode {
    #[serde(rename = "occurredAt")]
    pub occurred_at: DateTime<Utc>,
    #[serde(rename = "commitCount")]
    pub commit_count: u32,
}

/// A single commit as seen by the eligibility filter. Not retained past
/// aggregation.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub committed_at: DateTime<Utc>,
    pub author_login: Option<String>,
    pub message: Option<String>,
}

impl From<CommitNode> for CommitRecord {
    fn from(node: CommitNode) -> Self {
        Self {
            committed_at: node.committed_date,
            author_login: node.author.and_then(|a| a.user).map(|u| u.login),
            message: node.message,
        }
    }
}

/// One repository's commits, ready for filtering.
#[derive(Debug, Clone)]
pub struct RepoCommits {
    pub repository: RepositoryRef,
    pub commits: Vec<CommitRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commit_node_resolves_author_login() {
        let node: CommitNode = serde_json::from_value(json!({
            "committedDate": "2024-03-01T12:30:00Z",
            "message": "Rework cursor handling",
            "author": { "user": { "login": "octocat" } }
        }))
        .unwrap();

        let record = CommitRecord::from(node);
        assert_eq!(record.author_login.as_deref(), Some("octocat"));
        assert_eq!(record.message.as_deref(), Some("Rework cursor handling"));
    }

    #[test]
    fn commit_node_tolerates_unresolved_author() {
        let node: CommitNode = serde_json::from_value(json!({
            "committedDate": "2024-03-01T12:30:00Z",
            "author": { "user": null }
        }))
        .unwrap();

        let record = CommitRecord::from(node);
        assert!(record.author_login.is_none());
        assert!(record.message.is_none());
    }

    #[test]
    fn envelope_parses_errors_without_data() {
        let envelope: GraphQlEnvelope = serde_json::from_value(json!({
            "errors": [{ "message": "Something went wrong" }]
        }))
        .unwrap();

        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors.unwrap()[0].message, "Something went wrong");
    }
}
