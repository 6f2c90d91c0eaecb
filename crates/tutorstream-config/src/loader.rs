// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/tutorstream/tutorstream.toml`,
//! `$XDG_CONFIG/tutorstream/tutorstream.toml`, `./tutorstream.toml`, then
//! `TUTORSTREAM_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TutorConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tutorstream/tutorstream.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "tutorstream.toml";

/// Sections that environment variables can address.
const ENV_SECTIONS: [&str; 4] = ["tutor", "backend", "decoder", "persistence"];

/// Path of the per-user configuration file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tutorstream").join(LOCAL_CONFIG_FILE))
}

/// Builds the full layered Figment without extracting it.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(TutorConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG_FILE)).merge(env_provider())
}

/// Loads configuration from the standard hierarchy.
pub fn load_config() -> Result<TutorConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from an inline TOML string over the defaults.
///
/// No files and no environment variables are consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<TutorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TutorConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads configuration from one explicit file, with environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<TutorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TutorConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Maps `TUTORSTREAM_<SECTION>_<KEY>` onto `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `TUTORSTREAM_BACKEND_SESSION_HEADER` lands on `backend.session_header`.
fn env_provider() -> Env {
    Env::prefixed("TUTORSTREAM_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key
}
