use chrono::{DateTime, NaiveDate, Utc};

use crate::github::{ActorProfile, CommitRecord};

/// What to do with commits whose author cannot be resolved to a GitHub
/// login (non-linked emails, some bots). Both behaviors exist in the wild,
/// so the choice is explicit rather than baked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedAuthorPolicy {
    Count,
    Skip,
}

/// Decides whether a commit message looks like deliberate work.
pub trait MessagePolicy: Send + Sync {
    fn is_meaningful(&self, message: &str) -> bool;
}

const NOISE_PREFIXES: [&str; 5] = ["merge", "bump", "update", "add", "fix"];
const BOT_MARKERS: [&str; 2] = ["dependabot", "renovate"];
const MIN_MESSAGE_TOKENS: usize = 4;

/// Rejects merge/bump noise, bot-authored chore commits, and messages too
/// short to describe any work.
#[derive(Debug, Default)]
pub struct MeaningfulMessagePolicy;

impl MessagePolicy for MeaningfulMessagePolicy {
    fn is_meaningful(&self, message: &str) -> bool {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return false;
        }

        let lowered = trimmed.to_lowercase();
        if NOISE_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix)) {
            return false;
        }
        if BOT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return false;
        }

        trimmed.split_whitespace().count() >= MIN_MESSAGE_TOKENS
    }
}

/// Decides whether a commit counts toward the contribution day set.
///
/// The creation-date gates exist because backfilled or rebased commits can
/// carry dates before the account or the repository existed.
pub struct EligibilityFilter {
    actor: String,
    user_created: NaiveDate,
    unresolved_authors: UnresolvedAuthorPolicy,
    message_policy: Option<Box<dyn MessagePolicy>>,
}

impl EligibilityFilter {
    pub fn new(
        profile: &ActorProfile,
        unresolved_authors: UnresolvedAuthorPolicy,
        message_policy: Option<Box<dyn MessagePolicy>>,
    ) -> Self {
        Self {
            actor: profile.login.clone(),
            user_created: profile.created_at.date_naive(),
            unresolved_authors,
            message_policy,
        }
    }

    pub fn is_eligible(
        &self,
        commit: &CommitRecord,
        repo_created: Option<DateTime<Utc>>,
    ) -> bool {
        match commit.author_login.as_deref() {
            Some(login) if login != self.actor => return false,
            None if self.unresolved_authors == UnresolvedAuthorPolicy::Skip => return false,
            _ => {}
        }

        // Account creation is a date bound, repository creation a timestamp
        // bound; both guard against commits dated before either existed.
        if commit.committed_at.date_naive() < self.user_created {
            return false;
        }
        if let Some(repo_created) = repo_created {
            if commit.committed_at < repo_created {
                return false;
            }
        }

        if let Some(policy) = &self.message_policy {
            let message = commit.message.as_deref().unwrap_or("");
            if !policy.is_meaningful(message) {
                return false;
            }
        }

        true
    }
}
