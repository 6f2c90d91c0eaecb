// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tutorstream - command-line client for the streaming tutor backend.
//!
//! This is the binary entry point.

mod ask;
mod output;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tutorstream_config::TutorConfig;

/// Tutorstream - chat with the streaming tutor backend.
#[derive(Parser, Debug)]
#[command(name = "tutorstream", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session id to start with (overrides `tutor.session_id`).
    #[arg(long, global = true)]
    session: Option<String>,

    /// Authenticated user id (overrides `tutor.user_id`).
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one message and stream the reply to stdout.
    Ask {
        message: String,
        /// Extra request field, repeatable. VALUE is parsed as JSON when possible.
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = ask::parse_field)]
        fields: Vec<(String, serde_json::Value)>,
    },
    /// Launch an interactive session. Ctrl-C cancels the reply in flight.
    Shell,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and print the effective values.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tutorstream_config::load_and_validate_path(path),
        None => tutorstream_config::load_and_validate(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tutorstream_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    apply_overrides(&mut config, cli.session, cli.user);
    init_tracing(&config.tutor.log_level);

    let result = match cli.command {
        Some(Commands::Ask { message, fields }) => ask::run_ask(&config, message, fields).await,
        Some(Commands::Shell) => shell::run_shell(&config).await,
        Some(Commands::Config {
            action: ConfigCommand::Check,
        }) => print_config(&config),
        None => {
            println!("tutorstream: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

fn apply_overrides(config: &mut TutorConfig, session: Option<String>, user: Option<String>) {
    if session.is_some() {
        config.tutor.session_id = session;
    }
    if user.is_some() {
        config.tutor.user_id = user;
    }
}

fn print_config(config: &TutorConfig) -> Result<(), tutorstream_core::TutorError> {
    let mut shown = config.clone();
    if shown.backend.api_token.is_some() {
        shown.backend.api_token = Some("********".to_string());
    }
    let rendered = toml::to_string_pretty(&shown)
        .map_err(|e| tutorstream_core::TutorError::Internal(format!("failed to render config: {e}")))?;
    println!("{} configuration is valid\n", "ok:".green());
    print!("{rendered}");
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tutorstream={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_ask_with_fields() {
        let cli = Cli::try_parse_from([
            "tutorstream",
            "--session",
            "s1",
            "ask",
            "What is photosynthesis?",
            "--field",
            "subject=biology",
            "--field",
            "grade=7",
        ])
        .unwrap();
        assert_eq!(cli.session.as_deref(), Some("s1"));
        let Some(Commands::Ask { message, fields }) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(message, "What is photosynthesis?");
        assert_eq!(fields[0], ("subject".to_string(), serde_json::json!("biology")));
        assert_eq!(fields[1], ("grade".to_string(), serde_json::json!(7)));
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let mut config = TutorConfig::default();
        config.tutor.user_id = Some("from-file".into());
        apply_overrides(&mut config, Some("s2".into()), None);
        assert_eq!(config.tutor.session_id.as_deref(), Some("s2"));
        assert_eq!(config.tutor.user_id.as_deref(), Some("from-file"));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = tutorstream_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.tutor.log_level, "info");
    }
}
