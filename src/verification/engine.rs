use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info, warn};

use crate::github::{GitHubClient, RepoCommits};
use crate::utils::errors::AppError;
use crate::verification::policy::{
    EligibilityFilter, MeaningfulMessagePolicy, MessagePolicy, UnresolvedAuthorPolicy,
};

/// How commit dates are obtained. The contribution collection needs one
/// traversal for the whole account; walking each repository's history is
/// slower but carries author logins and messages for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    ContributionCollection,
    RepositoryHistory,
}

#[derive(Debug, Clone)]
pub struct VerificationOptions {
    pub strategy: FetchStrategy,
    pub require_meaningful_messages: bool,
    pub count_unresolved_authors: bool,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            strategy: FetchStrategy::ContributionCollection,
            require_meaningful_messages: false,
            count_unresolved_authors: false,
        }
    }
}

/// Outcome of one verification run. Failures are carried in `error` with
/// `valid: false`; callers never see a raised failure.
#[derive(Debug, Clone, Serialize)]
pub struct ContributionReport {
    pub username: String,
    pub valid: bool,
    pub contribution_days: usize,
    pub threshold: u32,
    pub years_back: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_contribution: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_contribution: Option<NaiveDate>,
    pub monthly_days: BTreeMap<String, usize>,
    pub verified_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct VerificationEngine {
    github: GitHubClient,
    options: VerificationOptions,
}

impl VerificationEngine {
    pub fn new(github: GitHubClient, options: VerificationOptions) -> Self {
        Self { github, options }
    }

    /// Verifies that the user has at least `threshold` distinct commit days
    /// within the last `years_back` years. This is the error boundary: any
    /// failure below becomes a report with `valid: false` and a reason.
    pub async fn verify_contributions(
        &self,
        username: &str,
        threshold: u32,
        years_back: u32,
    ) -> ContributionReport {
        // 365-day years, deliberately; the lookback is an approximation,
        // not a calendar computation.
        let cutoff = Utc::now() - Duration::days(i64::from(years_back) * 365);

        match self.collect_days(username, cutoff).await {
            Ok(days) => build_report(username, threshold, years_back, cutoff.date_naive(), &days),
            Err(err) => {
                error!("Verification aborted for {}: {}", username, err);
                failure_report(username, threshold, years_back, err.to_string())
            }
        }
    }

    async fn collect_days(
        &self,
        username: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<BTreeSet<NaiveDate>, AppError> {
        crate::utils::validation::validate_github_username(username)?;

        let profile = self.github.fetch_user(username).await?;

        let strategy = self.effective_strategy();
        let groups = match strategy {
            FetchStrategy::ContributionCollection => {
                let from = cutoff.max(profile.created_at);
                self.github
                    .fetch_commit_contributions(&profile.login, from, Utc::now())
                    .await?
            }
            FetchStrategy::RepositoryHistory => {
                let repositories = self
                    .github
                    .list_contributed_repositories(&profile.login)
                    .await?;
                let mut groups = Vec::with_capacity(repositories.len());
                for repository in repositories {
                    let commits = self.github.fetch_repository_commits(&repository).await?;
                    groups.push(RepoCommits { repository, commits });
                }
                groups
            }
        };

        let message_policy: Option<Box<dyn MessagePolicy>> = self
            .options
            .require_meaningful_messages
            .then(|| Box::new(MeaningfulMessagePolicy) as Box<dyn MessagePolicy>);
        let unresolved = if self.options.count_unresolved_authors {
            UnresolvedAuthorPolicy::Count
        } else {
            UnresolvedAuthorPolicy::Skip
        };
        let filter = EligibilityFilter::new(&profile, unresolved, message_policy);

        let days = eligible_days(&filter, &groups);
        info!(
            "{} has {} distinct contribution days across {} repository groups",
            profile.login,
            days.len(),
            groups.len()
        );
        Ok(days)
    }

    fn effective_strategy(&self) -> FetchStrategy {
        // Contribution-collection nodes carry no commit messages, so the
        // message heuristic forces a full history walk.
        if self.options.require_meaningful_messages
            && self.options.strategy == FetchStrategy::ContributionCollection
        {
            warn!("Message filtering requested, switching to repository history traversal");
            return FetchStrategy::RepositoryHistory;
        }
        self.options.strategy
    }
}

/// Deduplicates eligible commits into calendar days (UTC, timestamp
/// truncated to its date).
fn eligible_days(filter: &EligibilityFilter, groups: &[RepoCommits]) -> BTreeSet<NaiveDate> {
    let mut days = BTreeSet::new();
    for group in groups {
        for commit in &group.commits {
            if filter.is_eligible(commit, Some(group.repository.created_at)) {
                days.insert(commit.committed_at.date_naive());
            }
        }
    }
    days
}

/// Counts contribution days per "YYYY-MM" month. Derived from the day set,
/// so the bucket counts always sum to the set size.
fn monthly_buckets(days: &BTreeSet<NaiveDate>) -> BTreeMap<String, usize> {
    let mut buckets = BTreeMap::new();
    for day in days {
        *buckets.entry(day.format("%Y-%m").to_string()).or_insert(0) += 1;
    }
    buckets
}

fn build_report(
    username: &str,
    threshold: u32,
    years_back: u32,
    cutoff: NaiveDate,
    days: &BTreeSet<NaiveDate>,
) -> ContributionReport {
    let recent_days = days.iter().filter(|day| **day >= cutoff).count();

    ContributionReport {
        username: username.to_string(),
        valid: recent_days >= threshold as usize,
        contribution_days: recent_days,
        threshold,
        years_back,
        first_contribution: days.iter().next().copied(),
        last_contribution: days.iter().next_back().copied(),
        monthly_days: monthly_buckets(days),
        verified_at: Utc::now(),
        error: None,
    }
}

fn failure_report(
    username: &str,
    threshold: u32,
    years_back: u32,
    error: String,
) -> ContributionReport {
    ContributionReport {
        username: username.to_string(),
        valid: false,
        contribution_days: 0,
        threshold,
        years_back,
        first_contribution: None,
        last_contribution: None,
        monthly_days: BTreeMap::new(),
        verified_at: Utc::now(),
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{ActorProfile, CommitRecord, RepositoryRef};

    fn record(committed: &str, author: Option<&str>) -> CommitRecord {
        CommitRecord {
            committed_at: committed.parse().unwrap(),
            author_login: author.map(str::to_string),
            message: None,
        }
    }

    fn repo(owner: &str, name: &str, created: &str) -> RepositoryRef {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "createdAt": created,
            "owner": { "login": owner }
        }))
        .unwrap()
    }

    fn filter() -> EligibilityFilter {
        EligibilityFilter::new(
            &ActorProfile {
                login: "octocat".to_string(),
                created_at: "2015-01-01T00:00:00Z".parse().unwrap(),
            },
            UnresolvedAuthorPolicy::Skip,
            None,
        )
    }

    #[test]
    fn duplicate_days_and_foreign_authors_collapse() {
        let groups = vec![
            RepoCommits {
                repository: repo("octocat", "repo-a", "2020-01-01T00:00:00Z"),
                commits: vec![
                    record("2024-01-05T09:00:00Z", Some("octocat")),
                    record("2024-01-05T17:30:00Z", Some("octocat")),
                    record("2024-02-01T08:00:00Z", Some("octocat")),
                ],
            },
            RepoCommits {
                repository: repo("someone-else", "repo-b", "2020-01-01T00:00:00Z"),
                commits: vec![record("2024-01-05T12:00:00Z", Some("someone-else"))],
            },
        ];

        let days = eligible_days(&filter(), &groups);
        let expected: BTreeSet<NaiveDate> = ["2024-01-05", "2024-02-01"]
            .iter()
            .map(|day| day.parse().unwrap())
            .collect();
        assert_eq!(days, expected);

        let buckets = monthly_buckets(&days);
        assert_eq!(buckets.get("2024-01"), Some(&1));
        assert_eq!(buckets.get("2024-02"), Some(&1));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let groups = vec![RepoCommits {
            repository: repo("octocat", "repo-a", "2020-01-01T00:00:00Z"),
            commits: vec![
                record("2024-01-05T09:00:00Z", Some("octocat")),
                record("2024-03-09T09:00:00Z", Some("octocat")),
            ],
        }];

        let filter = filter();
        let first = eligible_days(&filter, &groups);
        let second = eligible_days(&filter, &groups);
        assert_eq!(first, second);
        assert_eq!(monthly_buckets(&first), monthly_buckets(&second));
    }

    #[test]
    fn monthly_bucket_counts_sum_to_day_set_size() {
        let days: BTreeSet<NaiveDate> = [
            "2023-11-30",
            "2023-12-01",
            "2023-12-31",
            "2024-01-01",
            "2024-01-02",
        ]
        .iter()
        .map(|day| day.parse().unwrap())
        .collect();

        let buckets = monthly_buckets(&days);
        assert_eq!(buckets.values().sum::<usize>(), days.len());
        assert_eq!(buckets.get("2023-12"), Some(&2));
    }

    #[test]
    fn threshold_applies_only_within_the_lookback_window() {
        let now = Utc::now();
        let cutoff = (now - Duration::days(365)).date_naive();

        let mut days = BTreeSet::new();
        days.insert((now - Duration::days(10)).date_naive());
        for offset in 0..5 {
            days.insert((now - Duration::days(400 + offset)).date_naive());
        }

        let report = build_report("octocat", 2, 1, cutoff, &days);
        assert!(!report.valid);
        assert_eq!(report.contribution_days, 1);
        // The span fields still describe everything collected.
        assert_eq!(report.first_contribution, days.iter().next().copied());
        assert_eq!(report.last_contribution, days.iter().next_back().copied());
        assert_eq!(report.monthly_days.values().sum::<usize>(), days.len());
    }

    #[test]
    fn meeting_the_threshold_is_valid() {
        let now = Utc::now();
        let cutoff = (now - Duration::days(365)).date_naive();

        let days: BTreeSet<NaiveDate> = (0..30)
            .map(|offset| (now - Duration::days(offset * 3)).date_naive())
            .collect();

        let report = build_report("octocat", 30, 1, cutoff, &days);
        assert!(report.valid);
        assert_eq!(report.contribution_days, 30);
        assert!(report.error.is_none());
    }

    #[test]
    fn empty_day_set_produces_an_empty_report() {
        let report = build_report(
            "octocat",
            1,
            1,
            "2024-01-01".parse().unwrap(),
            &BTreeSet::new(),
        );
        assert!(!report.valid);
        assert_eq!(report.contribution_days, 0);
        assert!(report.first_contribution.is_none());
        assert!(report.monthly_days.is_empty());
    }

    #[test]
    fn failure_reports_carry_the_reason() {
        let report = failure_report("octocat", 30, 1, "User not found: octocat".to_string());
        assert!(!report.valid);
        assert_eq!(report.error.as_deref(), Some("User not found: octocat"));
    }
}
