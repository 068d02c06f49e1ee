use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paginate::PageOptions;
use crate::retry::{Backoff, RetryPolicy};

/// Retry policy parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub retry_count: u32,
    /// Base backoff delay in milliseconds (doubles per retry).
    pub retry_delay_ms: u64,
    /// Maximum single backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_ms: 200,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_count,
            Backoff::new(Duration::from_millis(self.retry_delay_ms))
                .with_max_delay(Duration::from_millis(self.max_delay_ms)),
        )
    }
}

/// Starting position for listings (optional `[pagination]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size requested from the fetch function.
    pub limit: u32,
    pub offset: u64,
    /// Opaque cursor to resume from; takes precedence over `offset`.
    #[serde(default)]
    pub cursor: Option<String>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            cursor: None,
        }
    }
}

impl PaginationConfig {
    pub fn options(&self) -> PageOptions {
        PageOptions {
            limit: self.limit,
            offset: self.offset,
            cursor: self.cursor.clone(),
        }
    }
}

/// Engine configuration, loaded from `~/.config/fanout/config.toml` or built
/// by the caller and passed explicitly to each executor/paginator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum items in flight per bounded run (clamped to >= 1).
    pub concurrency: usize,
    /// Submissions larger than this are split into concurrent sub-batches.
    pub max_batch_size: usize,
    /// Stop admitting items after the first failure (default: continue).
    pub stop_on_error: bool,
    /// Prefix of generated idempotency keys.
    pub idempotency_key_prefix: String,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
    /// Optional listing defaults; if missing, built-in defaults are used.
    pub pagination: Option<PaginationConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            max_batch_size: 100,
            stop_on_error: false,
            idempotency_key_prefix: "batch".to_string(),
            retry: None,
            pagination: None,
        }
    }
}

impl EngineConfig {
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().policy()
    }

    pub fn page_options(&self) -> PageOptions {
        self.pagination.clone().unwrap_or_default().options()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fanout")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from a specific file.
pub fn load_from_path(path: &Path) -> Result<EngineConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<EngineConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.concurrency, 10);
        assert_eq!(cfg.max_batch_size, 100);
        assert!(!cfg.stop_on_error);
        assert_eq!(cfg.idempotency_key_prefix, "batch");
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff.base, Duration::from_millis(200));
        let page = cfg.page_options();
        assert_eq!(page.limit, 10);
        assert_eq!(page.offset, 0);
        assert!(page.cursor.is_none());
    }

    #[test]
    fn concurrency_is_clamped() {
        let cfg = EngineConfig {
            concurrency: 0,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.effective_concurrency(), 1);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = EngineConfig {
            retry: Some(RetryConfig::default()),
            pagination: Some(PaginationConfig {
                cursor: Some("abc".into()),
                ..PaginationConfig::default()
            }),
            ..EngineConfig::default()
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_partial_uses_defaults() {
        let toml = r#"
            concurrency = 4
            stop_on_error = true
        "#;
        let cfg: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.concurrency, 4);
        assert!(cfg.stop_on_error);
        assert_eq!(cfg.max_batch_size, 100);
        assert!(cfg.retry.is_none());
        assert!(cfg.pagination.is_none());
    }

    #[test]
    fn config_toml_sections() {
        let toml = r#"
            concurrency = 8
            max_batch_size = 50
            idempotency_key_prefix = "tx"

            [retry]
            retry_count = 5
            retry_delay_ms = 500
            max_delay_ms = 10000

            [pagination]
            limit = 25
            offset = 50
        "#;
        let cfg: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.idempotency_key_prefix, "tx");
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff.wait(1), Duration::from_millis(500));
        assert_eq!(policy.backoff.max_delay, Some(Duration::from_secs(10)));
        let page = cfg.page_options();
        assert_eq!(page.limit, 25);
        assert_eq!(page.offset, 50);
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_batch_size = 7\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.max_batch_size, 7);
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency = \"many\"\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("parse config"));
    }
}
