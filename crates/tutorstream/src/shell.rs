// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tutorstream shell` command implementation.
//!
//! Launches an interactive REPL with colored prompt, streaming output,
//! and readline history. One conversation per invocation; `/new` starts a
//! fresh thread on a new session id.

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::info;
use tutorstream_config::TutorConfig;
use tutorstream_core::{ExchangeContext, TutorError};
use tutorstream_session::StreamSession;

use crate::output::stream_reply;

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    NewThread,
    Help,
    Empty,
    Message(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "/quit" | "/exit" => Input::Quit,
        "/new" => Input::NewThread,
        "/help" => Input::Help,
        "" => Input::Empty,
        text => Input::Message(text),
    }
}

/// Runs the `tutorstream shell` interactive REPL.
pub async fn run_shell(config: &TutorConfig) -> Result<(), TutorError> {
    let session = StreamSession::connect(config)?;

    let mut rl = DefaultEditor::new()
        .map_err(|e| TutorError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "tutorstream shell".bold().green());
    println!(
        "Type {} to exit, {} for a new thread. Ctrl-C cancels a reply.\n",
        "/quit".yellow(),
        "/new".yellow()
    );

    let prompt = format!("{}> ", "you".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let text = match classify(&line) {
                    Input::Quit => break,
                    Input::Empty => continue,
                    Input::Help => {
                        println!("/new   start a new thread\n/quit  leave the shell");
                        continue;
                    }
                    Input::NewThread => {
                        let session_id = uuid::Uuid::new_v4().to_string();
                        match session.reset(Some(session_id)) {
                            Ok(()) => println!("{}", "new thread".dimmed()),
                            Err(e) => eprintln!("{}: {e}", "error".red()),
                        }
                        continue;
                    }
                    Input::Message(text) => text.to_string(),
                };

                let _ = rl.add_history_entry(&line);
                print!("{} ", "tutor>".cyan());
                if let Err(e) = stream_reply(&session, text, ExchangeContext::new()).await {
                    eprintln!("{}: {e}", "error".red());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at the prompt
                break;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D
                break;
            }
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    if let Some(id) = session.conversation_id() {
        println!("{}", format!("saved as conversation {id}").dimmed());
    }
    info!(session_id = ?session.session_id(), "shell session ended");
    Ok(())
}
