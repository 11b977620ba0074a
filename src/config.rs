use crate::error::{PortalError, Result};
use crate::import::DuplicatePolicy;
use crate::store::Store;
use serde::Serialize;
use serde_json::json;
use std::str::FromStr;

pub const ENV_PREFIX: &str = "MEMBERPORTAL_";
pub const IMPORT_SETTINGS_KEY: &str = "setup.import";

/// Process-level settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub log_level: String,
    pub log_json: bool,
    /// Request lines longer than this are refused with a 413.
    pub max_payload_bytes: usize,
    pub import_chunk_size: usize,
    pub lookup_batch_size: usize,
    pub member_list_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            max_payload_bytes: 8 * 1024 * 1024,
            import_chunk_size: 100,
            lookup_batch_size: 100,
            member_list_limit: 50_000,
        }
    }
}

/// `MEMBERPORTAL_{key}` first, then the bare `{key}`.
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
        .or_else(|_| std::env::var(key))
        .ok()
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    get_env_with_prefix(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let d = Config::default();
        Self {
            log_level: std::env::var(format!("{ENV_PREFIX}LOG"))
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or(d.log_level),
            log_json: parse_env("LOG_JSON", d.log_json),
            max_payload_bytes: parse_env("MAX_PAYLOAD_BYTES", d.max_payload_bytes),
            import_chunk_size: parse_env("IMPORT_CHUNK_SIZE", d.import_chunk_size).max(1),
            lookup_batch_size: parse_env("LOOKUP_BATCH_SIZE", d.lookup_batch_size).max(1),
            member_list_limit: parse_env("MEMBER_LIST_LIMIT", d.member_list_limit),
        }
    }
}

/// Per-workspace import defaults stored in the settings table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDefaults {
    pub default_duplicate_handling: DuplicatePolicy,
    pub chunk_size: usize,
}

impl ImportDefaults {
    /// Stored values that fail to parse fall back to the process defaults.
    pub fn load(store: &dyn Store, config: &Config) -> Result<Self> {
        let section = store.setting(IMPORT_SETTINGS_KEY)?.unwrap_or_else(|| json!({}));
        let default_duplicate_handling = section
            .get("defaultDuplicateHandling")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let chunk_size = section
            .get("chunkSize")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .filter(|n| *n > 0)
            .unwrap_or(config.import_chunk_size);
        Ok(Self {
            default_duplicate_handling,
            chunk_size,
        })
    }

    pub fn save(&self, store: &mut dyn Store) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PortalError::validation("chunkSize must be positive"));
        }
        let value = serde_json::to_value(self).map_err(crate::store::StoreError::from)?;
        store.set_setting(IMPORT_SETTINGS_KEY, &value)?;
        Ok(())
    }
}
