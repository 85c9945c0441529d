use regex::Regex;

use crate::utils::errors::AppError;

/// Checks a GitHub login before it is interpolated into any query:
/// 1-39 characters, alphanumeric or hyphen, no leading/trailing/doubled
/// hyphens.
pub fn validate_github_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() || username.len() > 39 {
        return Err(AppError::Validation(
            "GitHub username must be between 1 and 39 characters".to_string(),
        ));
    }

    let pattern =
        Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,37}[a-zA-Z0-9])?$").expect("Invalid regex pattern");
    if !pattern.is_match(username) || username.contains("--") {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid GitHub username",
            username
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_usernames() {
        assert!(validate_github_username("octocat").is_ok());
        assert!(validate_github_username("test-user").is_ok());
        assert!(validate_github_username("user123").is_ok());
        assert!(validate_github_username("a").is_ok());
        assert!(validate_github_username("a-b-c").is_ok());
    }

    #[test]
    fn rejects_malformed_usernames() {
        assert!(validate_github_username("").is_err());
        assert!(validate_github_username("-leading").is_err());
        assert!(validate_github_username("trailing-").is_err());
        assert!(validate_github_username("doubled--hyphen").is_err());
        assert!(validate_github_username("not@valid").is_err());
        assert!(validate_github_username(&"a".repeat(40)).is_err());
    }
}
