//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.token is required")]
    MissingToken,
    #[error("bot.token must look like <id>:<secret>")]
    MalformedToken,
    #[error("bot.api_url must start with http:// or https://, got '{0}'")]
    InvalidApiUrl(String),
    #[error("flood.max_level must be at least 1, got {0}")]
    InvalidMaxLevel(i64),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("storage.static_dir exists but is not a directory: {0}")]
    StaticDirNotDirectory(String),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("packages.binary must be an absolute path, got '{0}'")]
    PackageBinaryNotAbsolute(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Bot credentials
    let token = config.bot.token.trim();
    if token.is_empty() {
        errors.push(ValidationError::MissingToken);
    } else if !token.contains(':') {
        errors.push(ValidationError::MalformedToken);
    }
    let api_url = &config.bot.api_url;
    if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
        errors.push(ValidationError::InvalidApiUrl(api_url.clone()));
    }

    // Moderation
    if config.flood.max_level < 1 {
        errors.push(ValidationError::InvalidMaxLevel(config.flood.max_level));
    }
    if config.flood.cooldown_secs == 0 {
        errors.push(ValidationError::ZeroDuration("flood.cooldown_secs"));
    }
    if config.cache.sweep_period_secs == 0 {
        errors.push(ValidationError::ZeroDuration("cache.sweep_period_secs"));
    }
    if config.feeds.update_period_secs == 0 {
        errors.push(ValidationError::ZeroDuration("feeds.update_period_secs"));
    }

    // Storage
    let static_dir = Path::new(&config.storage.static_dir);
    if static_dir.exists() && !static_dir.is_dir() {
        errors.push(ValidationError::StaticDirNotDirectory(
            config.storage.static_dir.clone(),
        ));
    }

    if config.database.path != ":memory:" {
        let db_path = Path::new(&config.database.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(
                config.database.path.clone(),
            ));
        }
    }

    if config.packages.enabled && !Path::new(&config.packages.binary).is_absolute() {
        errors.push(ValidationError::PackageBinaryNotAbsolute(
            config.packages.binary.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_valid_config_passes() {
        let config = parse(
            r#"
[bot]
token = "123:abc"
"#,
        );
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_token_fails() {
        let config = parse(
            r#"
[bot]
token = " "
"#,
        );
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingToken)));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let config = parse(
            r#"
[bot]
token = "nocolon"
api_url = "ftp://example.org"

[flood]
max_level = 0
cooldown_secs = 0

[feeds]
update_period_secs = 0

[packages]
binary = "dnf"
"#,
        );
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MalformedToken)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidApiUrl(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidMaxLevel(0))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::PackageBinaryNotAbsolute(_))));
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ValidationError::ZeroDuration(_)))
                .count(),
            2
        );
    }

    #[test]
    fn test_static_dir_must_be_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let toml = format!(
            r#"
[bot]
token = "1:a"

[storage]
static_dir = "{}"
"#,
            file.path().display()
        );
        let errors = validate(&parse(&toml)).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::StaticDirNotDirectory(_))));
    }

    #[test]
    fn test_missing_database_dir_fails() {
        let config = parse(
            r#"
[bot]
token = "1:a"

[database]
path = "/nonexistent/dir/archive.db"
"#,
        );
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DatabasePathInvalid(_))));
    }
}
