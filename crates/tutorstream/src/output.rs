// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of a streaming reply.

use std::io::Write;

use colored::Colorize;
use tutorstream_core::{ExchangeContext, Message, Role, TutorError};
use tutorstream_session::{ExchangeOutcome, StreamSession};

/// What to write for the next version of the reply.
#[derive(Debug, PartialEq, Eq)]
enum Update<'a> {
    /// The reply grew; write the new tail.
    Append(&'a str),
    /// The reply was replaced; start over on a new line.
    Rewrite(&'a str),
    Unchanged,
}

fn next_update<'a>(printed: &str, content: &'a str) -> Update<'a> {
    match content.strip_prefix(printed) {
        Some("") => Update::Unchanged,
        Some(tail) => Update::Append(tail),
        None => Update::Rewrite(content),
    }
}

/// Writes the in-flight assistant message to stdout as it changes.
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    printed: String,
}

impl ReplyPrinter {
    pub fn render(&mut self, messages: &[Message]) {
        let Some(reply) = messages.last().filter(|m| m.role == Role::Assistant) else {
            return;
        };
        let mut stdout = std::io::stdout().lock();
        match next_update(&self.printed, &reply.content) {
            Update::Append(tail) => {
                let _ = write!(stdout, "{tail}");
            }
            Update::Rewrite(content) => {
                let _ = write!(stdout, "\n{content}");
            }
            Update::Unchanged => return,
        }
        let _ = stdout.flush();
        self.printed = reply.content.clone();
    }

    /// Prints attachments of the finalized reply and ends the line.
    pub fn finish(&mut self, outcome: &ExchangeOutcome) {
        match outcome {
            ExchangeOutcome::Completed(message) => {
                match next_update(&self.printed, &message.content) {
                    Update::Append(tail) => print!("{tail}"),
                    Update::Rewrite(content) => print!("\n{content}"),
                    Update::Unchanged => {}
                }
                println!();
                for url in message.image_urls.iter().flatten() {
                    println!("{} {url}", "image:".dimmed());
                }
                for url in message.video_urls.iter().flatten() {
                    println!("{} {url}", "video:".dimmed());
                }
            }
            ExchangeOutcome::Cancelled => {
                println!("\n{}", "(cancelled)".yellow());
            }
        }
        self.printed.clear();
    }
}

/// Runs one exchange, rendering the reply as it streams.
///
/// Ctrl-C cancels the exchange instead of terminating the process.
pub async fn stream_reply(
    session: &StreamSession,
    text: String,
    context: ExchangeContext,
) -> Result<ExchangeOutcome, TutorError> {
    let mut updates = session.subscribe();
    updates.mark_unchanged();
    let mut printer = ReplyPrinter::default();

    let send = session.send(text, context);
    tokio::pin!(send);

    loop {
        tokio::select! {
            result = &mut send => {
                match &result {
                    Ok(outcome) => printer.finish(outcome),
                    Err(_) => println!(),
                }
                return result;
            }
            Ok(()) = updates.changed() => {
                printer.render(&updates.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_appends_tail() {
        assert_eq!(next_update("Photo", "Photosynthesis"), Update::Append("synthesis"));
        assert_eq!(next_update("", "Hi"), Update::Append("Hi"));
    }

    #[test]
    fn replacement_rewrites() {
        assert_eq!(next_update("Hello", "Goodbye"), Update::Rewrite("Goodbye"));
    }

    #[test]
    fn same_content_is_unchanged() {
        assert_eq!(next_update("Hi", "Hi"), Update::Unchanged);
    }

    #[test]
    fn printer_ignores_non_assistant_tail() {
        let mut printer = ReplyPrinter::default();
        printer.render(&[Message::user("hi")]);
        assert!(printer.printed.is_empty());

        let mut reply = Message::assistant_placeholder();
        reply.content = "Hel".into();
        printer.render(&[Message::user("hi"), reply]);
        assert_eq!(printer.printed, "Hel");
    }
}
