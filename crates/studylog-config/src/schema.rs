//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub service: RawServiceConfig,

    #[serde(default)]
    pub timer: RawTimerConfig,

    #[serde(default)]
    pub advice: RawAdviceConfig,

    /// Profile context sent with advice requests
    #[serde(default)]
    pub profile: RawProfile,

    /// Preset subject catalog, seeded into the store on startup
    #[serde(default)]
    pub subjects: Vec<RawSubject>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Owner of all records (default: "local")
    pub user_id: Option<String>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// "local" or an IANA timezone name such as "Asia/Tokyo"
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTimerConfig {
    /// Display refresh interval (default: 100)
    pub tick_interval_ms: Option<u64>,
}

/// Advice generator settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAdviceConfig {
    /// Chat-completions endpoint
    pub endpoint: Option<String>,

    pub model: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,

    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawProfile {
    pub grade: Option<String>,
    pub target_school: Option<String>,
}

/// Raw subject definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSubject {
    /// Unique stable ID
    pub id: String,

    /// Display name
    pub name: String,

    /// `#RRGGBB` display color
    pub color: String,
}
