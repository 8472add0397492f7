//! Validated settings structures

use crate::schema::{RawAdviceConfig, RawConfig, RawServiceConfig, RawSubject};
use crate::validation::parse_timezone;
use chrono_tz::Tz;
use studylog_api::{Profile, Subject};
use studylog_util::{default_data_dir, SubjectId, UserId, DATABASE_FILENAME};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_ID: &str = "local";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_ADVICE_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_ADVICE_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_ADVICE_TIMEOUT_SECS: u64 = 30;

/// Validated settings ready for use by the tracker and the CLI
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceSettings,
    pub timer: TimerSettings,
    pub advice: AdviceSettings,
    pub profile: Profile,
    /// Preset subjects; a built-in catalog when the file defines none
    pub subjects: Vec<Subject>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let subjects = if raw.subjects.is_empty() {
            default_subjects()
        } else {
            raw.subjects.into_iter().map(convert_subject).collect()
        };

        Self {
            service: ServiceSettings::from_raw(raw.service),
            timer: TimerSettings {
                tick_interval: Duration::from_millis(
                    raw.timer.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS),
                ),
            },
            advice: AdviceSettings::from_raw(raw.advice),
            profile: Profile {
                grade: raw.profile.grade,
                target_school: raw.profile.target_school,
            },
            subjects,
        }
    }

    /// Get a preset subject by ID
    pub fn get_subject(&self, id: &SubjectId) -> Option<&Subject> {
        self.subjects.iter().find(|s| &s.id == id)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            timer: TimerSettings::default(),
            advice: AdviceSettings::default(),
            profile: Profile::default(),
            subjects: default_subjects(),
        }
    }
}

/// Which timezone calendar days, weeks and months are computed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimezonePolicy {
    /// The system timezone at read time
    #[default]
    Local,
    Named(Tz),
}

impl TimezonePolicy {
    pub fn label(&self) -> String {
        match self {
            TimezonePolicy::Local => "local".to_string(),
            TimezonePolicy::Named(tz) => tz.name().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub user_id: UserId,
    pub data_dir: PathBuf,
    pub timezone: TimezonePolicy,
}

impl ServiceSettings {
    fn from_raw(raw: RawServiceConfig) -> Self {
        // Validation has already rejected unknown names
        let timezone = raw
            .timezone
            .as_deref()
            .and_then(|tz| parse_timezone(tz).ok().flatten())
            .map(TimezonePolicy::Named)
            .unwrap_or_default();

        Self {
            user_id: UserId::new(raw.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string())),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
            timezone,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILENAME)
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            user_id: UserId::new(DEFAULT_USER_ID),
            data_dir: default_data_dir(),
            timezone: TimezonePolicy::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimerSettings {
    pub tick_interval: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdviceSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl AdviceSettings {
    fn from_raw(raw: RawAdviceConfig) -> Self {
        Self {
            endpoint: raw
                .endpoint
                .unwrap_or_else(|| DEFAULT_ADVICE_ENDPOINT.to_string()),
            model: raw.model.unwrap_or_else(|| DEFAULT_ADVICE_MODEL.to_string()),
            api_key_env: raw
                .api_key_env
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            temperature: raw.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: raw.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout: Duration::from_secs(raw.timeout_secs.unwrap_or(DEFAULT_ADVICE_TIMEOUT_SECS)),
        }
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for AdviceSettings {
    fn default() -> Self {
        Self::from_raw(RawAdviceConfig::default())
    }
}

fn convert_subject(raw: RawSubject) -> Subject {
    Subject {
        id: SubjectId::new(raw.id),
        name: raw.name,
        color: raw.color.to_ascii_uppercase(),
        is_preset: true,
    }
}

/// Built-in preset catalog
pub fn default_subjects() -> Vec<Subject> {
    [
        ("math", "Math", "#3B82F6"),
        ("english", "English", "#EF4444"),
        ("language", "Language Arts", "#F59E0B"),
        ("science", "Science", "#10B981"),
        ("social", "Social Studies", "#8B5CF6"),
    ]
    .into_iter()
    .map(|(id, name, color)| Subject {
        id: SubjectId::new(id),
        name: name.to_string(),
        color: color.to_string(),
        is_preset: true,
    })
    .collect()
}
