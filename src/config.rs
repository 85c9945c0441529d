use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::verification::{FetchStrategy, VerificationOptions};

const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";
const DEFAULT_THRESHOLD: u32 = 30;
const DEFAULT_YEARS_BACK: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GITHUB_TOKEN is not set")]
    MissingToken,

    #[error("GITHUB_USERNAME is not set")]
    MissingUsername,

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Authorizes every GraphQL call. Loaded once at startup, read-only after.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credential: Credential,
    pub username: String,
    pub threshold: u32,
    pub years_back: u32,
    pub options: VerificationOptions,
}

impl Config {
    /// Reads the whole configuration surface from the environment. A
    /// missing token or username is fatal; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = required("GITHUB_TOKEN").ok_or(ConfigError::MissingToken)?;
        let username = required("GITHUB_USERNAME").ok_or(ConfigError::MissingUsername)?;
        let endpoint =
            required("GITHUB_GRAPHQL_URL").unwrap_or_else(|| DEFAULT_GRAPHQL_URL.to_string());

        let threshold = parse_var("CONTRIBUTION_THRESHOLD", DEFAULT_THRESHOLD)?;
        let years_back = parse_var("LOOKBACK_YEARS", DEFAULT_YEARS_BACK)?;
        let require_meaningful_messages = parse_var("REQUIRE_MEANINGFUL_COMMITS", false)?;
        let count_unresolved_authors = parse_var("COUNT_UNRESOLVED_AUTHORS", false)?;

        let strategy = match required("FETCH_STRATEGY").as_deref() {
            None | Some("contributions") => FetchStrategy::ContributionCollection,
            Some("history") => FetchStrategy::RepositoryHistory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "FETCH_STRATEGY",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            credential: Credential { token, endpoint },
            username,
            threshold,
            years_back,
            options: VerificationOptions {
                strategy,
                require_meaningful_messages,
                count_unresolved_authors,
            },
        })
    }
}

fn required(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match required(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}
