// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading.

use std::io::Write;

use tutorstream_config::diagnostic::ConfigError;
use tutorstream_config::{
    load_and_validate, load_and_validate_path, load_and_validate_str, load_config_from_str,
};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[tutor]
log_level = "debug"
user_id = "student-42"
session_id = "s1"

[backend]
base_url = "https://tutor.example.com"
chat_path = "/v2/sessions/{session_id}/chat"
session_header = "x-tutor-session"
api_token = "tok"
request_timeout_secs = 120
connect_timeout_secs = 5
max_retries = 1

[decoder]
short_recovery_threshold = 200
long_recovery_threshold = 50000
max_frame_bytes = 1048576

[persistence]
enabled = true
save_url = "https://store.example.com/conversations"
title_max_chars = 40
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.tutor.user_id.as_deref(), Some("student-42"));
    assert_eq!(config.tutor.session_id.as_deref(), Some("s1"));
    assert_eq!(config.backend.session_header, "x-tutor-session");
    assert_eq!(config.backend.request_timeout_secs, Some(120));
    assert_eq!(config.backend.max_retries, 1);
    assert_eq!(config.decoder.long_recovery_threshold, 50_000);
    assert!(config.persistence.enabled);
    assert_eq!(config.persistence.title_max_chars, 40);
}

#[test]
fn unknown_key_gets_suggestion() {
    let errors = load_and_validate_str("[persistence]\nsave_ulr = \"http://x\"\n")
        .expect_err("unknown key must be rejected");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { key, suggestion, .. } if key == "save_ulr" => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("save_url"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[decoder]\nmax_frame_bytes = \"big\"\n")
        .expect_err("string for usize must be rejected");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("max_frame_bytes")))
    );
}

#[test]
fn validation_runs_after_successful_parse() {
    let errors = load_and_validate_str("[backend]\nchat_path = \"/chat\"\n")
        .expect_err("placeholder-less path must fail validation");
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn explicit_path_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[tutor]\nsession_id = \"from-file\"").unwrap();
    let config = load_and_validate_path(file.path()).unwrap();
    assert_eq!(config.tutor.session_id.as_deref(), Some("from-file"));
}

#[test]
fn env_overrides_local_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "tutorstream.toml",
            "[backend]\nbase_url = \"http://file.example\"\n",
        )?;
        jail.set_env("TUTORSTREAM_BACKEND_SESSION_HEADER", "x-from-env");
        jail.set_env("TUTORSTREAM_TUTOR_USER_ID", "env-user");

        let config = load_and_validate().expect("layered config should load");
        assert_eq!(config.backend.base_url, "http://file.example");
        assert_eq!(config.backend.session_header, "x-from-env");
        assert_eq!(config.tutor.user_id.as_deref(), Some("env-user"));
        Ok(())
    });
}
