use crate::error::{ConclaveError, Result};
use crate::retry::{RetryPolicy, MAX_RETRY_ATTEMPTS};
use crate::selector::{RankPolicy, MAX_JOIN_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_TOKEN: &str = "CONCLAVE_TOKEN";
pub const ENV_NOTIFY_URL: &str = "CONCLAVE_NOTIFY_URL";
pub const ENV_NOTIFY_CHAT_ID: &str = "CONCLAVE_NOTIFY_CHAT_ID";
pub const ENV_API_URL: &str = "CONCLAVE_API_URL";
pub const ENV_SELF_ID: &str = "CONCLAVE_SELF_ID";
pub const ENV_SELF_PERCENT: &str = "CONCLAVE_SELF_PERCENT";
pub const ENV_MAX_JOIN_ATTEMPTS: &str = "CONCLAVE_MAX_JOIN_ATTEMPTS";
pub const ENV_RANK_POLICY: &str = "CONCLAVE_RANK_POLICY";
pub const ENV_MAX_CONTENT_LEN: &str = "CONCLAVE_MAX_CONTENT_LEN";
pub const ENV_NOTIFY_ON_SUCCESS: &str = "CONCLAVE_NOTIFY_ON_SUCCESS";
pub const ENV_DRY_RUN: &str = "CONCLAVE_DRY_RUN";
pub const ENV_RETRY_ATTEMPTS: &str = "CONCLAVE_RETRY_ATTEMPTS";
pub const ENV_RETRY_BASE_MS: &str = "CONCLAVE_RETRY_BASE_MS";

pub const DEFAULT_API_URL: &str = "https://api.conclave.example/v1";
pub const DEFAULT_MAX_CONTENT_LEN: usize = 2000;
pub const MIN_CONTENT_LEN: usize = 64;
pub const MAX_CONTENT_LEN: usize = 20_000;
pub const MAX_SELF_PERCENT: u32 = 60;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    /// Value accepted as given, but probably not what was meant.
    Notice,
    /// Value was out of range and has been clamped.
    Clamped,
}

impl ConfigWarning {
    fn clamped(key: &str, given: impl std::fmt::Display, used: impl std::fmt::Display) -> Self {
        Self {
            level: WarnLevel::Clamped,
            message: format!("{key}={given} is out of range, using {used}"),
        }
    }
}

// ---------------------------------------------------------------------------
// NotifyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    pub webhook_url: String,
    pub chat_id: Option<String>,
    /// Also report successful mutating actions, not just anomalies.
    pub on_success: bool,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Run configuration, built once at startup and passed down by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub token: String,
    pub notify: NotifyConfig,
    pub self_id: Option<String>,
    pub self_percent: u32,
    pub max_join_attempts: usize,
    pub rank_policy: RankPolicy,
    pub max_content_len: usize,
    pub dry_run: bool,
    pub retry: RetryPolicy,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<(Self, Vec<ConfigWarning>)> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Missing required keys and unparseable values are errors. Values that
    /// parse but fall outside their range are clamped and reported.
    pub fn from_lookup<F>(lookup: F) -> Result<(Self, Vec<ConfigWarning>)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut warnings = Vec::new();

        let token = get(ENV_TOKEN).ok_or_else(|| ConclaveError::MissingConfig(ENV_TOKEN.into()))?;
        let webhook_url =
            get(ENV_NOTIFY_URL).ok_or_else(|| ConclaveError::MissingConfig(ENV_NOTIFY_URL.into()))?;
        require_http_url(ENV_NOTIFY_URL, &webhook_url)?;

        let api_url = get(ENV_API_URL)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        require_http_url(ENV_API_URL, &api_url)?;

        let raw_percent: i64 = parse_or(&get, ENV_SELF_PERCENT, 0)?;
        let self_percent = raw_percent.clamp(0, MAX_SELF_PERCENT as i64) as u32;
        if self_percent as i64 != raw_percent {
            warnings.push(ConfigWarning::clamped(ENV_SELF_PERCENT, raw_percent, self_percent));
        }

        let self_id = get(ENV_SELF_ID);
        if self_id.is_none() && self_percent > 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Notice,
                message: format!(
                    "{ENV_SELF_PERCENT}={self_percent} has no effect without {ENV_SELF_ID} \
                     unless the API reports our idea"
                ),
            });
        }

        let raw_attempts: usize = parse_or(&get, ENV_MAX_JOIN_ATTEMPTS, 5)?;
        let max_join_attempts = raw_attempts.clamp(1, MAX_JOIN_ATTEMPTS);
        if max_join_attempts != raw_attempts {
            warnings.push(ConfigWarning::clamped(
                ENV_MAX_JOIN_ATTEMPTS,
                raw_attempts,
                max_join_attempts,
            ));
        }

        let rank_policy = match get(ENV_RANK_POLICY) {
            Some(raw) => RankPolicy::parse(&raw).map_err(|e| ConclaveError::InvalidConfig {
                key: ENV_RANK_POLICY.into(),
                reason: e.to_string(),
            })?,
            None => RankPolicy::default(),
        };

        let raw_len: usize = parse_or(&get, ENV_MAX_CONTENT_LEN, DEFAULT_MAX_CONTENT_LEN)?;
        let max_content_len = raw_len.clamp(MIN_CONTENT_LEN, MAX_CONTENT_LEN);
        if max_content_len != raw_len {
            warnings.push(ConfigWarning::clamped(ENV_MAX_CONTENT_LEN, raw_len, max_content_len));
        }

        let raw_retries: u32 = parse_or(&get, ENV_RETRY_ATTEMPTS, 3)?;
        let max_attempts = raw_retries.clamp(1, MAX_RETRY_ATTEMPTS);
        if max_attempts != raw_retries {
            warnings.push(ConfigWarning::clamped(ENV_RETRY_ATTEMPTS, raw_retries, max_attempts));
        }
        let base_ms: u64 = parse_or(&get, ENV_RETRY_BASE_MS, 250)?;
        let retry = RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            ..RetryPolicy::default()
        };

        let config = Config {
            api_url,
            token,
            notify: NotifyConfig {
                webhook_url,
                chat_id: get(ENV_NOTIFY_CHAT_ID),
                on_success: parse_bool(&get, ENV_NOTIFY_ON_SUCCESS)?,
            },
            self_id,
            self_percent,
            max_join_attempts,
            rank_policy,
            max_content_len,
            dry_run: parse_bool(&get, ENV_DRY_RUN)?,
            retry,
        };
        Ok((config, warnings))
    }
}

fn require_http_url(key: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConclaveError::InvalidConfig {
            key: key.into(),
            reason: format!("'{value}' is not an http(s) URL"),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConclaveError::InvalidConfig {
            key: key.into(),
            reason: format!("'{raw}': {e}"),
        }),
    }
}

fn parse_bool<G>(get: &G, key: &str) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConclaveError::InvalidConfig {
                key: key.into(),
                reason: format!("'{v}' is not a boolean"),
            }),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::RankKey;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<(Config, Vec<ConfigWarning>)> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    const REQUIRED: &[(&str, &str)] = &[
        (ENV_TOKEN, "secret"),
        (ENV_NOTIFY_URL, "https://hooks.example/abc"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        REQUIRED.iter().chain(extra.iter()).copied().collect()
    }

    #[test]
    fn defaults() {
        let (config, warnings) = load(REQUIRED).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.self_percent, 0);
        assert_eq!(config.max_join_attempts, 5);
        assert_eq!(config.rank_policy, RankPolicy::default());
        assert_eq!(config.max_content_len, DEFAULT_MAX_CONTENT_LEN);
        assert!(!config.dry_run);
        assert!(!config.notify.on_success);
        assert!(config.notify.chat_id.is_none());
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = load(&[(ENV_NOTIFY_URL, "https://hooks.example")]).unwrap_err();
        assert!(matches!(err, ConclaveError::MissingConfig(ref k) if k == ENV_TOKEN));
    }

    #[test]
    fn blank_required_value_counts_as_missing() {
        let err = load(&[(ENV_TOKEN, "   "), (ENV_NOTIFY_URL, "https://h")]).unwrap_err();
        assert!(matches!(err, ConclaveError::MissingConfig(_)));
    }

    #[test]
    fn missing_notify_url_is_fatal() {
        let err = load(&[(ENV_TOKEN, "t")]).unwrap_err();
        assert!(matches!(err, ConclaveError::MissingConfig(ref k) if k == ENV_NOTIFY_URL));
    }

    #[test]
    fn unparseable_number_is_fatal() {
        let err = load(&with(&[(ENV_SELF_PERCENT, "lots")])).unwrap_err();
        assert!(matches!(err, ConclaveError::InvalidConfig { ref key, .. } if key == ENV_SELF_PERCENT));
    }

    #[test]
    fn bad_bool_is_fatal() {
        assert!(load(&with(&[(ENV_DRY_RUN, "maybe")])).is_err());
    }

    #[test]
    fn non_http_url_is_fatal() {
        assert!(load(&with(&[(ENV_API_URL, "ftp://x")])).is_err());
    }

    #[test]
    fn out_of_range_values_are_clamped_with_warnings() {
        let (config, warnings) = load(&with(&[
            (ENV_SELF_ID, "idea-1"),
            (ENV_SELF_PERCENT, "90"),
            (ENV_MAX_JOIN_ATTEMPTS, "50"),
            (ENV_MAX_CONTENT_LEN, "10"),
        ]))
        .unwrap();
        assert_eq!(config.self_percent, 60);
        assert_eq!(config.max_join_attempts, MAX_JOIN_ATTEMPTS);
        assert_eq!(config.max_content_len, MIN_CONTENT_LEN);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Clamped));
    }

    #[test]
    fn optional_values() {
        let (config, _) = load(&with(&[
            (ENV_API_URL, "http://localhost:9000/"),
            (ENV_NOTIFY_CHAT_ID, "-100123"),
            (ENV_RANK_POLICY, "phase,occupancy_desc"),
            (ENV_NOTIFY_ON_SUCCESS, "yes"),
            (ENV_DRY_RUN, "1"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.notify.chat_id.as_deref(), Some("-100123"));
        assert_eq!(
            config.rank_policy.keys,
            vec![RankKey::Phase, RankKey::OccupancyDesc]
        );
        assert!(config.notify.on_success);
        assert!(config.dry_run);
    }

    #[test]
    fn bad_rank_policy_is_fatal() {
        let err = load(&with(&[(ENV_RANK_POLICY, "phase,vibes")])).unwrap_err();
        assert!(matches!(err, ConclaveError::InvalidConfig { ref key, .. } if key == ENV_RANK_POLICY));
    }

    #[test]
    fn self_percent_without_self_id_is_noted() {
        let (_, warnings) = load(&with(&[(ENV_SELF_PERCENT, "10")])).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Notice);
    }
}
