//! Configuration validation

use crate::schema::{RawAdviceConfig, RawConfig, RawSubject};
use chrono_tz::Tz;
use std::collections::HashSet;
use thiserror::Error;

/// Accepted range for `timer.tick_interval_ms`
pub const TICK_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 10..=1000;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Subject '{subject_id}': {message}")]
    SubjectError { subject_id: String, message: String },

    #[error("Duplicate subject ID: {0}")]
    DuplicateSubjectId(String),

    #[error("Unknown timezone '{0}' (expected \"local\" or an IANA name)")]
    InvalidTimezone(String),

    #[error("Tick interval {0}ms outside 10..=1000")]
    InvalidTickInterval(u64),

    #[error("Advice config error: {0}")]
    AdviceError(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(user_id) = &config.service.user_id
        && user_id.trim().is_empty()
    {
        errors.push(ValidationError::GlobalError(
            "service.user_id cannot be empty".into(),
        ));
    }

    if let Some(tz) = &config.service.timezone
        && parse_timezone(tz).is_err()
    {
        errors.push(ValidationError::InvalidTimezone(tz.clone()));
    }

    if let Some(ms) = config.timer.tick_interval_ms
        && !TICK_INTERVAL_RANGE_MS.contains(&ms)
    {
        errors.push(ValidationError::InvalidTickInterval(ms));
    }

    errors.extend(validate_advice(&config.advice));

    let mut seen_ids = HashSet::new();
    for subject in &config.subjects {
        if !seen_ids.insert(&subject.id) {
            errors.push(ValidationError::DuplicateSubjectId(subject.id.clone()));
        }
    }

    for subject in &config.subjects {
        errors.extend(validate_subject(subject));
    }

    errors
}

fn validate_advice(advice: &RawAdviceConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(endpoint) = &advice.endpoint
        && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
    {
        errors.push(ValidationError::AdviceError(format!(
            "endpoint must be an http(s) URL, got '{}'",
            endpoint
        )));
    }

    if let Some(model) = &advice.model
        && model.trim().is_empty()
    {
        errors.push(ValidationError::AdviceError("model cannot be empty".into()));
    }

    if let Some(var) = &advice.api_key_env
        && var.trim().is_empty()
    {
        errors.push(ValidationError::AdviceError(
            "api_key_env cannot be empty".into(),
        ));
    }

    if let Some(temp) = advice.temperature
        && !(0.0..=2.0).contains(&temp)
    {
        errors.push(ValidationError::AdviceError(format!(
            "temperature {} outside 0.0..=2.0",
            temp
        )));
    }

    if advice.max_tokens == Some(0) {
        errors.push(ValidationError::AdviceError(
            "max_tokens must be positive".into(),
        ));
    }

    if advice.timeout_secs == Some(0) {
        errors.push(ValidationError::AdviceError(
            "timeout_secs must be positive".into(),
        ));
    }

    errors
}

fn validate_subject(subject: &RawSubject) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if subject.id.trim().is_empty() {
        errors.push(ValidationError::SubjectError {
            subject_id: subject.id.clone(),
            message: "id cannot be empty".into(),
        });
    }

    if subject.name.trim().is_empty() {
        errors.push(ValidationError::SubjectError {
            subject_id: subject.id.clone(),
            message: "name cannot be empty".into(),
        });
    }

    if let Err(e) = parse_hex_color(&subject.color) {
        errors.push(ValidationError::SubjectError {
            subject_id: subject.id.clone(),
            message: e,
        });
    }

    errors
}

/// Parse `#RRGGBB` into its components
pub fn parse_hex_color(s: &str) -> Result<(u8, u8, u8), String> {
    let hex = s
        .strip_prefix('#')
        .ok_or_else(|| format!("Color '{}' must start with '#'", s))?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("Color '{}' must be #RRGGBB", s));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|e| e.to_string())
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Parse a timezone setting. `Ok(None)` means the system local timezone.
pub fn parse_timezone(s: &str) -> Result<Option<Tz>, String> {
    if s.eq_ignore_ascii_case("local") {
        return Ok(None);
    }
    s.parse::<Tz>().map(Some).map_err(|e| e.to_string())
}
