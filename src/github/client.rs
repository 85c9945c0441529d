use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
    Client, StatusCode,
};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Credential;
use crate::github::pagination::{walk_connection, Page};
use crate::github::types::{
    ActorProfile, CommitNode, CommitRecord, ContributionNode, GitHubError, GraphQlEnvelope,
    RepoCommits, RepositoryRef,
};

const REQUEST_TIMEOUT_SECS: u64 = 8;

/// A contributions collection is bounded to one year per query; windows of
/// 90 days also keep every per-repository day connection under the 100-node
/// page size, so a window never needs a second page.
const COLLECTION_WINDOW_DAYS: i64 = 90;

const USER_QUERY: &str = r#"
query($login: String!) {
  user(login: $login) {
    login
    createdAt
  }
}
"#;

const REPOSITORIES_QUERY: &str = r#"
query($login: String!, $cursor: String) {
  user(login: $login) {
    repositoriesContributedTo(
      first: 100
      after: $cursor
      contributionTypes: [COMMIT]
      includeUserRepositories: true
    ) {
      pageInfo {
        endCursor
        hasNextPage
      }
      nodes {
        name
        createdAt
        owner {
          login
        }
      }
    }
  }
}
"#;

const COMMIT_HISTORY_QUERY: &str = r#"
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target {
        ... on Commit {
          history(first: 100, after: $cursor) {
            pageInfo {
              endCursor
              hasNextPage
            }
            edges {
              node {
                committedDate
                message
                author {
                  user {
                    login
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const CONTRIBUTIONS_QUERY: &str = r#"
query($login: String!, $from: DateTime!, $to: DateTime!) {
  user(login: $login) {
    contributionsCollection(from: $from, to: $to) {
      commitContributionsByRepository(maxRepositories: 100) {
        repository {
          name
          createdAt
          owner {
            login
          }
        }
        contributions(first: 100) {
          pageInfo {
            endCursor
            hasNextPage
          }
          nodes {
            occurredAt
            commitCount
          }
        }
      }
    }
  }
}
"#;

pub struct GitHubClient {
    client: Client,
    endpoint: String,
}

impl GitHubClient {
    pub fn new(credential: &Credential) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("github-contribution-verifier/1.0"),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", credential.token))
                .expect("token contains invalid header characters"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: credential.endpoint.clone(),
        }
    }

    /// Issues one GraphQL call and returns the `data` object. A single
    /// attempt is made; retrying is the caller's decision.
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value, GitHubError> {
        let body = json!({ "query": query, "variables": variables });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();

        if status == StatusCode::FORBIDDEN {
            let exhausted = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|remaining| remaining.to_str().ok())
                .map_or(false, |remaining| remaining == "0");
            if exhausted {
                return Err(GitHubError::RateLimit);
            }
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GitHubError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: GraphQlEnvelope = response.json().await?;
        unwrap_envelope(envelope)
    }

    /// Resolves the account being verified. A null `user` field means the
    /// login does not exist, which is distinct from a transport failure.
    pub async fn fetch_user(&self, login: &str) -> Result<ActorProfile, GitHubError> {
        debug!("Resolving GitHub user: {}", login);

        let data = self.execute(USER_QUERY, json!({ "login": login })).await?;
        match data.get("user") {
            Some(user) if !user.is_null() => {
                let profile: ActorProfile = serde_json::from_value(user.clone())?;
                debug!("User {} created at {}", profile.login, profile.created_at);
                Ok(profile)
            }
            _ => Err(GitHubError::UserNotFound(login.to_string())),
        }
    }

    /// Lists every repository the user has committed to. Transport errors
    /// abort the listing; this runs before any commit walk, so a broken
    /// token or endpoint surfaces here.
    pub async fn list_contributed_repositories(
        &self,
        login: &str,
    ) -> Result<Vec<RepositoryRef>, GitHubError> {
        debug!("Listing repositories contributed to by {}", login);

        let raw_nodes = walk_connection(|cursor| async move {
            let variables = json!({ "login": login, "cursor": cursor });
            let data = self.execute(REPOSITORIES_QUERY, variables).await?;

            let user = data.get("user");
            if user.map_or(true, Value::is_null) {
                return Err(GitHubError::UserNotFound(login.to_string()));
            }
            Ok(user
                .and_then(|user| user.get("repositoriesContributedTo"))
                .and_then(Page::from_connection))
        })
        .await?;

        let mut repositories = Vec::with_capacity(raw_nodes.len());
        for node in raw_nodes {
            match serde_json::from_value::<RepositoryRef>(node) {
                Ok(repository) => repositories.push(repository),
                Err(err) => warn!("Skipping malformed repository node: {}", err),
            }
        }

        info!(
            "Found {} contributed repositories for {}",
            repositories.len(),
            login
        );
        Ok(repositories)
    }

    /// Walks the default branch's commit history. Failures stop the walk
    /// for this repository only, keeping whatever was collected; one broken
    /// repository must not sink the whole run.
    pub async fn fetch_repository_commits(
        &self,
        repository: &RepositoryRef,
    ) -> Result<Vec<CommitRecord>, GitHubError> {
        let owner = repository.owner.login.as_str();
        let name = repository.name.as_str();
        debug!("Fetching commit history for {}/{}", owner, name);

        let raw_nodes = walk_connection(|cursor| async move {
            let variables = json!({ "owner": owner, "name": name, "cursor": cursor });
            let data = match self.execute(COMMIT_HISTORY_QUERY, variables).await {
                Ok(data) => data,
                Err(err) => {
                    warn!("Stopping commit walk for {}/{}: {}", owner, name, err);
                    return Ok(None);
                }
            };
            // An empty repository has a null defaultBranchRef; treat it and
            // any other unexpected shape as an exhausted connection.
            Ok(data
                .pointer("/repository/defaultBranchRef/target/history")
                .and_then(Page::from_connection))
        })
        .await?;

        let mut commits = Vec::with_capacity(raw_nodes.len());
        for node in raw_nodes {
            match serde_json::from_value::<CommitNode>(node) {
                Ok(commit) => commits.push(CommitRecord::from(commit)),
                Err(err) => warn!(
                    "Skipping malformed commit node in {}/{}: {}",
                    owner, name, err
                ),
            }
        }

        debug!("Collected {} commits from {}/{}", commits.len(), owner, name);
        Ok(commits)
    }

    /// Fetches the user's commit contributions grouped by repository, one
    /// bounded window at a time. A failed window is skipped so the rest of
    /// the range still counts.
    pub async fn fetch_commit_contributions(
        &self,
        login: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RepoCommits>, GitHubError> {
        debug!(
            "Fetching commit contributions for {} between {} and {}",
            login,
            from.date_naive(),
            to.date_naive()
        );

        let mut groups = Vec::new();
        let mut window_start = from;

        while window_start < to {
            let window_end =
                (window_start + chrono::Duration::days(COLLECTION_WINDOW_DAYS)).min(to);
            let variables = json!({
                "login": login,
                "from": window_start.to_rfc3339(),
                "to": window_end.to_rfc3339(),
            });

            match self.execute(CONTRIBUTIONS_QUERY, variables).await {
                Ok(data) => groups.extend(parse_contribution_groups(&data, login)),
                Err(err) => warn!(
                    "Skipping contribution window {}..{}: {}",
                    window_start.date_naive(),
                    window_end.date_naive(),
                    err
                ),
            }

            window_start = window_end;
        }

        info!(
            "Collected contribution days across {} repository groups for {}",
            groups.len(),
            login
        );
        Ok(groups)
    }
}

fn unwrap_envelope(envelope: GraphQlEnvelope) -> Result<Value, GitHubError> {
    // GitHub reports logical failures with HTTP 200, so the errors array is
    // checked before trusting data.
    if let Some(errors) = envelope.errors {
        if !errors.is_empty() {
            let message = errors
                .into_iter()
                .map(|entry| entry.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GitHubError::GraphQl(message));
        }
    }

    envelope
        .data
        .ok_or_else(|| GitHubError::GraphQl("response carried no data".to_string()))
}

/// Turns one contribution-collection response into per-repository commit
/// records. Each contribution node is one day the user committed in that
/// repository; the collection is already scoped to the user, so the actor
/// is recorded as the author and no message is available.
fn parse_contribution_groups(data: &Value, login: &str) -> Vec<RepoCommits> {
    let Some(groups) = data
        .pointer("/user/contributionsCollection/commitContributionsByRepository")
        .and_then(Value::as_array)
    else {
        warn!("Contribution window returned no usable collection");
        return Vec::new();
    };

    let mut repo_commits = Vec::with_capacity(groups.len());
    for group in groups {
        let repository = match group
            .get("repository")
            .map(|repository| serde_json::from_value::<RepositoryRef>(repository.clone()))
        {
            Some(Ok(repository)) => repository,
            _ => {
                warn!("Skipping contribution group with a malformed repository");
                continue;
            }
        };

        let Some(page) = group.get("contributions").and_then(Page::from_connection) else {
            warn!(
                "Skipping contribution group for {} without a day connection",
                repository.full_name()
            );
            continue;
        };
        if page.has_next_page {
            warn!(
                "Contribution days for {} truncated at {} nodes",
                repository.full_name(),
                page.nodes.len()
            );
        }

        let mut commits = Vec::with_capacity(page.nodes.len());
        let mut commit_total = 0u32;
        for node in page.nodes {
            match serde_json::from_value::<ContributionNode>(node) {
                Ok(day) => {
                    commit_total += day.commit_count;
                    commits.push(CommitRecord {
                        committed_at: day.occurred_at,
                        author_login: Some(login.to_string()),
                        message: None,
                    });
                }
                Err(err) => warn!("Skipping malformed contribution day: {}", err),
            }
        }

        debug!(
            "{}: {} contribution days covering {} commits",
            repository.full_name(),
            commits.len(),
            commit_total
        );
        repo_commits.push(RepoCommits { repository, commits });
    }

    repo_commits
}
