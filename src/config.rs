use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{DashboardError, Result};

const DEFAULT_LOAD_ATTEMPTS: u32 = 3;
const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOAD_BACKOFF_MS: u64 = 500;
const DEFAULT_INSERT_BATCH: usize = 500;

/// Process settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub load: LoadPolicy,
    pub insert_batch: usize,
}

/// Bounded retry applied to every collection read at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_LOAD_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS),
            backoff: Duration::from_millis(DEFAULT_LOAD_BACKOFF_MS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let attempts: u32 = parse_var(&lookup, "HEALTH_LOAD_ATTEMPTS", DEFAULT_LOAD_ATTEMPTS)?;
        if attempts == 0 {
            return Err(DashboardError::Config(
                "HEALTH_LOAD_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let timeout_secs =
            parse_var(&lookup, "HEALTH_LOAD_TIMEOUT_SECS", DEFAULT_LOAD_TIMEOUT_SECS)?;
        let backoff_ms = parse_var(&lookup, "HEALTH_LOAD_BACKOFF_MS", DEFAULT_LOAD_BACKOFF_MS)?;
        let insert_batch: usize =
            parse_var(&lookup, "HEALTH_INSERT_BATCH", DEFAULT_INSERT_BATCH)?;
        if insert_batch == 0 {
            return Err(DashboardError::Config(
                "HEALTH_INSERT_BATCH must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            load: LoadPolicy {
                attempts,
                timeout: Duration::from_secs(timeout_secs),
                backoff: Duration::from_millis(backoff_ms),
            },
            insert_batch,
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            let reason = "DATABASE_URL must be set to reach the document store";
            DashboardError::Config(reason.to_string())
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DashboardError::Config(format!("{key} is not a valid number: {raw:?}"))),
    }
}

/// One file to ingest and the collection it lands in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    pub sources: Vec<SourceFile>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("failed to read manifest {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DashboardError::Config(format!("invalid manifest: {e}")))
    }
}

impl Default for Manifest {
    fn default() -> Self {
        let source = |path: &str, collection: &str| SourceFile {
            path: PathBuf::from(path),
            collection: collection.to_string(),
        };
        Self {
            sources: vec![
                source("data/peoples_data/daily_activity_1.csv", "daily_activity"),
                source("data/peoples_data/daily_activity_2.csv", "daily_activity"),
                source("data/peoples_data/sleep_day.csv", "sleep_day"),
                source("data/rafi_data/physiologicals_rafi.csv", "physiologicals_rafi"),
                source("data/rafi_data/sleeps_rafi.csv", "sleeps_rafi"),
                source("data/rafi_data/workouts_rafi.csv", "workouts_rafi"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.load, LoadPolicy::default());
        assert_eq!(settings.insert_batch, 500);
        assert!(settings.require_database_url().is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/health"),
            ("HEALTH_LOAD_ATTEMPTS", "5"),
            ("HEALTH_LOAD_TIMEOUT_SECS", "2"),
            ("HEALTH_INSERT_BATCH", "50"),
        ]))
        .unwrap();

        assert_eq!(settings.load.attempts, 5);
        assert_eq!(settings.load.timeout, Duration::from_secs(2));
        assert_eq!(settings.insert_batch, 50);
        assert_eq!(settings.require_database_url().unwrap(), "postgres://localhost/health");
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let err = Settings::from_lookup(lookup(&[("HEALTH_LOAD_ATTEMPTS", "many")])).unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));

        let err = Settings::from_lookup(lookup(&[("HEALTH_LOAD_ATTEMPTS", "0")])).unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
    }

    #[test]
    fn manifest_parses_sources() {
        let manifest = Manifest::parse(
            r#"
            [[sources]]
            path = "data/sleep_day.csv"
            collection = "sleep_day"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.sources.len(), 1);
        assert_eq!(manifest.sources[0].collection, "sleep_day");
    }

    #[test]
    fn default_manifest_appends_both_activity_files() {
        let manifest = Manifest::default();
        let activity = manifest
            .sources
            .iter()
            .filter(|source| source.collection == "daily_activity")
            .count();
        assert_eq!(activity, 2);
        assert_eq!(manifest.sources.len(), 6);
    }
}
