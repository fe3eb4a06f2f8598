// ============================================================================
// src/config.rs – strict config loader
// ============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sqlock.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreCfg {
    /// Persisted lockout counters (TOML, rewritten atomically).
    #[serde(default = "default_state_path")]
    pub state_path: String,
    /// Account rows with secret digests.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
    /// Upper bound on any single store access.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_state_path() -> String {
    "/var/lib/sqlock/security.toml".to_string()
}

fn default_credentials_path() -> String {
    "/etc/sqlock/users.toml".to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            credentials_path: default_credentials_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreCfg {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditCfg {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_audit_path")]
    pub log_path: String,
    /// Upper bound on waiting for the audit writer before a block record is
    /// reported as unwritten.
    #[serde(default = "default_audit_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_audit_path() -> String {
    "/var/log/sqlock/audit.log".to_string()
}

fn default_audit_timeout_ms() -> u64 {
    500
}

impl Default for AuditCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: default_audit_path(),
            timeout_ms: default_audit_timeout_ms(),
        }
    }
}

impl AuditCfg {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingCfg {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "sqlock=info,warn".to_string()
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreCfg,
    #[serde(default)]
    pub audit: AuditCfg,
    #[serde(default)]
    pub logging: LoggingCfg,
}

impl Config {
    pub fn load<P: AsRef<Path>>(p: P) -> Result<Self> {
        let s = fs::read_to_string(&p)
            .with_context(|| format!("read config: {}", p.as_ref().display()))?;
        let cfg: Self = if p.as_ref().extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&s).context("toml parse")?
        } else {
            serde_yaml::from_str(&s).context("yaml parse")?
        };
        Ok(cfg)
    }

    /// Load `explicit` if given (must exist), else the default path if it
    /// exists, else built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }
}
