mod config;
mod github;
mod utils;
mod verification;

use tracing::{error, info};

use crate::config::Config;
use crate::github::GitHubClient;
use crate::verification::VerificationEngine;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting GitHub contribution verification");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Configuration error: {}", err);
            std::process::exit(2);
        }
    };

    let client = GitHubClient::new(&config.credential);
    let engine = VerificationEngine::new(client, config.options.clone());

    let report = engine
        .verify_contributions(&config.username, config.threshold, config.years_back)
        .await;

    info!(
        "{}: {} contribution days against a threshold of {} over {} year(s), valid: {}",
        report.username, report.contribution_days, report.threshold, report.years_back, report.valid
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&report).expect("report serializes to JSON")
    );

    if !report.valid {
        std::process::exit(1);
    }
}
