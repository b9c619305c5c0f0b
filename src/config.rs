//! Process configuration, modeled on the teacher's `lwk_app::Config`
//! (a struct of defaults, overridable per-field) but env-driven rather
//! than CLI-flag-driven since this crate exposes no CLI of its own.

use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "SCREENER_";

/// Every field enumerated in the external interfaces' configuration list,
/// each overridable via a `SCREENER_`-prefixed environment variable.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub data_dir: PathBuf,
    pub sanctions_dir: PathBuf,
    pub risk_assessments_dir: PathBuf,
    pub audit_logs_dir: PathBuf,
    pub config_dir: PathBuf,
    pub api_rate_limit: u32,
    pub default_max_hops: u8,
    pub risk_cache_ttl_hours: u64,
    pub indexer_base_url: String,
    pub sanctions_feed_url: Option<String>,
}

impl Config {
    pub fn defaults(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Config {
            port: 8080,
            log_level: "info".to_string(),
            sanctions_dir: data_dir.join("sanctions"),
            risk_assessments_dir: data_dir.join("risk-assessments"),
            audit_logs_dir: data_dir.join("audit-logs"),
            config_dir: data_dir.join("config"),
            data_dir,
            api_rate_limit: 60,
            default_max_hops: 5,
            risk_cache_ttl_hours: 1,
            indexer_base_url: "https://blockstream.info/api".to_string(),
            sanctions_feed_url: None,
        }
    }

    /// Builds a [`Config`] from defaults rooted at `data_dir`, overridden
    /// field-by-field by any matching `SCREENER_*` environment variable.
    pub fn from_env(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::defaults(data_dir);

        if let Some(v) = env_var("PORT") {
            if let Ok(port) = v.parse() {
                config.port = port;
            }
        }
        if let Some(v) = env_var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = env_var("SANCTIONS_DIR") {
            config.sanctions_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("RISK_ASSESSMENTS_DIR") {
            config.risk_assessments_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("AUDIT_LOGS_DIR") {
            config.audit_logs_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("CONFIG_DIR") {
            config.config_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("API_RATE_LIMIT") {
            if let Ok(limit) = v.parse() {
                config.api_rate_limit = limit;
            }
        }
        if let Some(v) = env_var("DEFAULT_MAX_HOPS") {
            if let Ok(hops) = v.parse() {
                config.default_max_hops = hops;
            }
        }
        if let Some(v) = env_var("RISK_CACHE_TTL_HOURS") {
            if let Ok(hours) = v.parse() {
                config.risk_cache_ttl_hours = hours;
            }
        }
        if let Some(v) = env_var("INDEXER_BASE_URL") {
            config.indexer_base_url = v;
        }
        if let Some(v) = env_var("SANCTIONS_FEED_URL") {
            config.sanctions_feed_url = Some(v);
        }

        config
    }

    pub fn sanctions_file_path(&self) -> PathBuf {
        self.sanctions_dir.join("sdn_crypto.json")
    }

    pub fn risk_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.risk_cache_ttl_hours * 3600)
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_well_formed() {
        let cfg = Config::defaults("/tmp/screener-data");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.api_rate_limit, 60);
        assert_eq!(cfg.default_max_hops, 5);
        assert_eq!(cfg.sanctions_file_path(), PathBuf::from("/tmp/screener-data/sanctions/sdn_crypto.json"));
    }
}
