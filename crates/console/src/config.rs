use std::time::Duration;

use kiss_client::commit::CommitConfig;
use kiss_core::types::JobId;

/// Default pause between the progress channel opening and the commit.
const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Console configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Shop API base URL.
    pub api_url: String,
    /// Bearer token; also identifies the progress channel.
    pub auth_token: String,
    pub job_id: JobId,
    /// `keepMinors` for the initial staged fetch.
    pub keep_minors: bool,
    /// Start with `NO_IMPORT` rows hidden.
    pub hide_ignored: bool,
    pub commit: CommitConfig,
}

impl ConsoleConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                          | Default  |
    /// |----------------------------------|----------|
    /// | `KISS_API_URL`                   | required |
    /// | `KISS_AUTH_TOKEN`                | required |
    /// | `KISS_JOB_ID`                    | required |
    /// | `KISS_KEEP_MINORS`               | `false`  |
    /// | `KISS_HIDE_IGNORED`              | `false`  |
    /// | `KISS_SETTLE_DELAY_MS`           | `500`    |
    /// | `KISS_CHANNEL_OPEN_TIMEOUT_SECS` | unset    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = var("KISS_API_URL").ok_or(ConfigError::Missing("KISS_API_URL"))?;
        let auth_token = var("KISS_AUTH_TOKEN").ok_or(ConfigError::Missing("KISS_AUTH_TOKEN"))?;

        let job_id = var("KISS_JOB_ID").ok_or(ConfigError::Missing("KISS_JOB_ID"))?;
        let job_id: JobId = job_id.parse().map_err(|_| ConfigError::Invalid {
            name: "KISS_JOB_ID",
            expected: "an integer",
            value: job_id.clone(),
        })?;

        let keep_minors = parse_flag("KISS_KEEP_MINORS", var("KISS_KEEP_MINORS"))?;
        let hide_ignored = parse_flag("KISS_HIDE_IGNORED", var("KISS_HIDE_IGNORED"))?;

        let settle_delay_ms = match var("KISS_SETTLE_DELAY_MS") {
            Some(v) => parse_u64("KISS_SETTLE_DELAY_MS", v)?,
            None => DEFAULT_SETTLE_DELAY_MS,
        };
        let open_timeout = var("KISS_CHANNEL_OPEN_TIMEOUT_SECS")
            .map(|v| parse_u64("KISS_CHANNEL_OPEN_TIMEOUT_SECS", v))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            api_url,
            auth_token,
            job_id,
            keep_minors,
            hide_ignored,
            commit: CommitConfig {
                settle_delay: Duration::from_millis(settle_delay_ms),
                open_timeout,
            },
        })
    }
}

fn parse_flag(name: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            expected: "true or false",
            value,
        }),
    }
}

fn parse_u64(name: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        expected: "a non-negative integer",
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ConsoleConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConsoleConfig::from_vars(|name| map.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("KISS_API_URL", "http://shop.local/api"),
        ("KISS_AUTH_TOKEN", "tok"),
        ("KISS_JOB_ID", "1042"),
    ];

    #[test]
    fn defaults_apply() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.job_id, 1042);
        assert!(!config.keep_minors);
        assert!(!config.hide_ignored);
        assert_eq!(config.commit.settle_delay, Duration::from_millis(500));
        assert!(config.commit.open_timeout.is_none());
    }

    #[test]
    fn optional_values_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("KISS_KEEP_MINORS", "true"),
            ("KISS_HIDE_IGNORED", "1"),
            ("KISS_SETTLE_DELAY_MS", "50"),
            ("KISS_CHANNEL_OPEN_TIMEOUT_SECS", "10"),
        ]);
        let config = load(&vars).unwrap();
        assert!(config.keep_minors);
        assert!(config.hide_ignored);
        assert_eq!(config.commit.settle_delay, Duration::from_millis(50));
        assert_eq!(config.commit.open_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn missing_required_variable() {
        let err = load(&REQUIRED[..2]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("KISS_JOB_ID"));

        let err = load(&[("KISS_API_URL", " "), ("KISS_AUTH_TOKEN", "t"), ("KISS_JOB_ID", "1")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("KISS_API_URL"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut vars = REQUIRED.to_vec();
        vars[2] = ("KISS_JOB_ID", "abc");
        assert_matches!(load(&vars), Err(ConfigError::Invalid { name: "KISS_JOB_ID", .. }));

        let mut vars = REQUIRED.to_vec();
        vars.push(("KISS_KEEP_MINORS", "maybe"));
        assert_matches!(load(&vars), Err(ConfigError::Invalid { name: "KISS_KEEP_MINORS", .. }));
    }
}
