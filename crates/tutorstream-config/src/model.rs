// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level tutorstream configuration.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TutorConfig {
    /// Identity and logging settings for this client.
    #[serde(default)]
    pub tutor: TutorSection,

    /// Streaming backend endpoint settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Frame decoder recovery knobs.
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Conversation persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Identity and logging for the local client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TutorSection {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Authenticated user id handed over by the identity provider.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Initial session id. Exchanges fail fast when this is unset.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Default for TutorSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            user_id: None,
            session_id: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Streaming backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Scheme and host of the tutoring backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Session-scoped chat path. `{session_id}` is substituted per exchange.
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Response header carrying the authoritative session id.
    #[serde(default = "default_session_header")]
    pub session_header: String,

    /// Bearer token sent with every request. `None` sends no authorization header.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Whole-request timeout in seconds. `None` leaves long streams unbounded.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// TCP/TLS connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Retries on 429/500/503/529 before any body byte is read.
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_path: default_chat_path(),
            session_header: default_session_header(),
            api_token: None,
            request_timeout_secs: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: 0,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_chat_path() -> String {
    "/api/chat/{session_id}/stream".to_string()
}

fn default_session_header() -> String {
    "x-session-id".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Frame decoder recovery thresholds.
///
/// These are tuning knobs observed against real base64 payload sizes, not
/// protocol guarantees.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DecoderConfig {
    /// Brace-terminated payloads longer than this are re-buffered when they
    /// look like the start of a JSON object.
    #[serde(default = "default_short_recovery_threshold")]
    pub short_recovery_threshold: usize,

    /// Brace-terminated payloads longer than this are always re-buffered.
    #[serde(default = "default_long_recovery_threshold")]
    pub long_recovery_threshold: usize,

    /// Upper bound on a re-buffered candidate; larger ones are discarded.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            short_recovery_threshold: default_short_recovery_threshold(),
            long_recovery_threshold: default_long_recovery_threshold(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_short_recovery_threshold() -> usize {
    100
}

fn default_long_recovery_threshold() -> usize {
    10_000
}

fn default_max_frame_bytes() -> usize {
    16 * 1024 * 1024
}

/// Conversation persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Whether conversations are upserted to the store at all.
    #[serde(default)]
    pub enabled: bool,

    /// Endpoint of the conversation store. Required when `enabled`.
    #[serde(default)]
    pub save_url: Option<String>,

    /// Maximum length, in characters, of the title derived from the first user message.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            save_url: None,
            title_max_chars: default_title_max_chars(),
        }
    }
}

fn default_title_max_chars() -> usize {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = TutorConfig::default();
        assert_eq!(config.tutor.log_level, "info");
        assert_eq!(config.backend.session_header, "x-session-id");
        assert!(config.backend.chat_path.contains("{session_id}"));
        assert_eq!(config.decoder.short_recovery_threshold, 100);
        assert_eq!(config.decoder.long_recovery_threshold, 10_000);
        assert!(!config.persistence.enabled);
        assert_eq!(config.persistence.title_max_chars, 60);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: TutorConfig = toml::from_str(
            r#"
[decoder]
long_recovery_threshold = 20000
"#,
        )
        .unwrap();
        assert_eq!(config.decoder.long_recovery_threshold, 20_000);
        assert_eq!(config.decoder.short_recovery_threshold, 100);
    }

    #[test]
    fn unknown_backend_key_is_rejected() {
        let result = toml::from_str::<TutorConfig>(
            r#"
[backend]
base_ur = "http://x"
"#,
        );
        assert!(result.is_err());
    }
}
