// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tutorstream ask` command implementation.

use tracing::debug;
use tutorstream_config::TutorConfig;
use tutorstream_core::{ExchangeContext, TutorError};
use tutorstream_session::StreamSession;

use crate::output::stream_reply;

/// Parses a `KEY=VALUE` request field. VALUE is JSON when it parses, a string otherwise.
pub fn parse_field(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Runs the `tutorstream ask` command: one exchange, streamed to stdout.
pub async fn run_ask(
    config: &TutorConfig,
    message: String,
    fields: Vec<(String, serde_json::Value)>,
) -> Result<(), TutorError> {
    let session = StreamSession::connect(config)?;
    let context = fields
        .into_iter()
        .fold(ExchangeContext::new(), |ctx, (key, value)| ctx.with_field(key, value));

    let outcome = stream_reply(&session, message, context).await?;
    debug!(
        ?outcome,
        conversation_id = ?session.conversation_id(),
        "ask finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_values_prefer_json() {
        assert_eq!(
            parse_field("grade=7").unwrap(),
            ("grade".to_string(), serde_json::json!(7))
        );
        assert_eq!(
            parse_field("flags=[\"a\"]").unwrap(),
            ("flags".to_string(), serde_json::json!(["a"]))
        );
        assert_eq!(
            parse_field("subject=biology").unwrap(),
            ("subject".to_string(), serde_json::json!("biology"))
        );
        assert_eq!(
            parse_field("note=a=b").unwrap(),
            ("note".to_string(), serde_json::json!("a=b"))
        );
    }

    #[test]
    fn malformed_fields_are_rejected() {
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }
}
