use crate::model::{ConfigError, DateRange, Segment};
use crate::utils::today;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// Requests may carry at most five groups: the anchor plus four others.
pub const API_MAX_GROUPS: usize = 5;

pub const CLIENT_ID_ENV: &str = "NAVER_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "NAVER_CLIENT_SECRET";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub start_date: NaiveDate,
    /// Defaults to today when absent.
    pub end_date: Option<NaiveDate>,
    pub ages: Vec<String>,
    pub device: String,
    pub segments: Vec<Segment>,
    pub max_groups_per_batch: usize,
    pub max_terms_per_group: usize,
    pub request_timeout_seconds: u64,
    pub retries: u32,
    pub retry_backoff_millis: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openapi.naver.com/v1/datalab/search".to_string(),
            client_id: None,
            client_secret: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end_date: None,
            // 19 to 44 year olds
            ages: ["3", "4", "5", "6", "7"].iter().map(|s| s.to_string()).collect(),
            device: String::new(),
            segments: vec![Segment::Male, Segment::Female],
            max_groups_per_batch: API_MAX_GROUPS - 1,
            max_terms_per_group: 20,
            request_timeout_seconds: 15,
            retries: 0,
            retry_backoff_millis: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl AppConfig {
    /// Overrides credentials with values found through `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(CLIENT_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.client_id = Some(id);
        }
        if let Some(secret) = lookup(CLIENT_SECRET_ENV).filter(|v| !v.trim().is_empty()) {
            self.client_secret = Some(secret);
        }
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let client_id = non_blank(&self.client_id).ok_or(ConfigError::MissingCredentials {
            which: CLIENT_ID_ENV,
        })?;
        let client_secret = non_blank(&self.client_secret).ok_or(ConfigError::MissingCredentials {
            which: CLIENT_SECRET_ENV,
        })?;
        Ok(Credentials {
            client_id,
            client_secret,
        })
    }

    pub fn date_range(&self) -> Result<DateRange, ConfigError> {
        DateRange::new(self.start_date, self.end_date.unwrap_or_else(today))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_groups_per_batch == 0 || self.max_groups_per_batch >= API_MAX_GROUPS {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "max_groups_per_batch must be between 1 and {}, got {}",
                    API_MAX_GROUPS - 1,
                    self.max_groups_per_batch
                ),
            });
        }
        if self.max_terms_per_group == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_terms_per_group must be positive".into(),
            });
        }
        if self.segments.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "at least one segment is required".into(),
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.segments.iter().find(|s| !seen.insert(**s)) {
            return Err(ConfigError::Invalid {
                reason: format!("segment {} is listed more than once", dup),
            });
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                reason: "request_timeout_seconds must be positive".into(),
            });
        }
        self.date_range()?;
        Ok(())
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Loads `path` if it exists, otherwise falls back to defaults.
pub fn load_config_or_default(path: &str) -> Result<AppConfig, ConfigError> {
    if Path::new(path).exists() {
        load_config(path)
    } else {
        info!("Config file {} not found, using defaults", path);
        Ok(AppConfig::default())
    }
}
