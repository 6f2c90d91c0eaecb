// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::TutorConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates a deserialized configuration.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_config(config: &TutorConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.tutor.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "tutor.log_level `{}` must be one of {}",
            config.tutor.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if let Some(session_id) = &config.tutor.session_id
        && session_id.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "tutor.session_id must not be empty when set",
        ));
    }

    let base_url = config.backend.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "backend.base_url `{base_url}` must start with http:// or https://"
        )));
    }

    if !config.backend.chat_path.starts_with('/') {
        errors.push(ConfigError::validation(format!(
            "backend.chat_path `{}` must start with `/`",
            config.backend.chat_path
        )));
    }

    if !config.backend.chat_path.contains("{session_id}") {
        errors.push(ConfigError::validation(
            "backend.chat_path must contain the `{session_id}` placeholder",
        ));
    }

    if config.backend.session_header.trim().is_empty() {
        errors.push(ConfigError::validation(
            "backend.session_header must not be empty",
        ));
    }

    if config.backend.request_timeout_secs == Some(0) {
        errors.push(ConfigError::validation(
            "backend.request_timeout_secs must be positive when set",
        ));
    }

    let decoder = &config.decoder;
    if decoder.short_recovery_threshold >= decoder.long_recovery_threshold {
        errors.push(ConfigError::validation(format!(
            "decoder.short_recovery_threshold ({}) must be below decoder.long_recovery_threshold ({})",
            decoder.short_recovery_threshold, decoder.long_recovery_threshold
        )));
    }

    if decoder.max_frame_bytes < decoder.long_recovery_threshold {
        errors.push(ConfigError::validation(format!(
            "decoder.max_frame_bytes ({}) must be at least decoder.long_recovery_threshold ({})",
            decoder.max_frame_bytes, decoder.long_recovery_threshold
        )));
    }

    let persistence = &config.persistence;
    if persistence.enabled
        && persistence
            .save_url
            .as_deref()
            .is_none_or(|url| url.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "persistence.save_url is required when persistence.enabled = true",
        ));
    }

    if persistence.title_max_chars == 0 {
        errors.push(ConfigError::validation(
            "persistence.title_max_chars must be positive",
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
