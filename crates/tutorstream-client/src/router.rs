// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps decoded frames to effects on the in-flight assistant message.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use tutorstream_core::TokenUsage;

use crate::types::{ContentData, DoneData, ErrorData, Frame, KIND_CONTENT, KIND_DONE, KIND_ERROR};

/// Message used when an `error` frame carries no text.
pub const DEFAULT_ERROR_MESSAGE: &str = "The tutor backend reported an error";

/// Markdown image whose target is an inline data URL.
static DATA_IMAGE_MARKDOWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[[^\]]*\]\(\s*data:image/[^)]*\)").expect("valid regex")
});

/// Bare base64 image data URL.
static DATA_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:image/[A-Za-z0-9.+-]+;base64,[A-Za-z0-9+/=]*").expect("valid regex")
});

/// Status marker some backends prepend when an image tool succeeds.
static IMAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)image generated successfully:?[ \t]*").expect("valid regex")
});

/// How a content frame changes the message text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TextDelta {
    #[default]
    None,
    Append(String),
    Replace(String),
}

/// Everything one content frame contributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentDelta {
    pub text: TextDelta,
    /// From `image_result`. Replaces the image list.
    pub images: Option<Vec<String>>,
    /// From `img_urls`. Appended after `images`.
    pub appended_images: Option<Vec<String>>,
    pub videos: Option<Vec<String>>,
    pub token_usage: Option<TokenUsage>,
}

/// Result of routing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Content(ContentDelta),
    /// Generation finished. Carries the backend's session id when it sent one.
    Done { session_id: Option<String> },
    Fail { message: String },
    Ignore,
}

/// Routes a frame to its effect. Pure apart from logging.
pub fn route(frame: Frame) -> Effect {
    match frame.kind.as_str() {
        KIND_CONTENT => match serde_json::from_value::<ContentData>(frame.data) {
            Ok(data) => Effect::Content(content_delta(data)),
            Err(e) => {
                warn!(error = %e, "ignoring content frame with unexpected shape");
                Effect::Ignore
            }
        },
        KIND_DONE => {
            let data: DoneData = serde_json::from_value(frame.data).unwrap_or_default();
            Effect::Done {
                session_id: data.session_id.filter(|id| !id.trim().is_empty()),
            }
        }
        KIND_ERROR => {
            let data: ErrorData = serde_json::from_value(frame.data).unwrap_or_default();
            Effect::Fail {
                message: data
                    .error
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            }
        }
        other => {
            debug!(kind = other, "ignoring unknown frame type");
            Effect::Ignore
        }
    }
}

fn content_delta(data: ContentData) -> ContentDelta {
    // An incremental chunk takes precedence over a full response in the same frame.
    let text = match (data.chunk, data.full_response) {
        (Some(chunk), _) => TextDelta::Append(strip_noise(&chunk).into_owned()),
        (None, Some(full)) => TextDelta::Replace(strip_noise(&full).trim().to_string()),
        (None, None) => TextDelta::None,
    };

    ContentDelta {
        text,
        images: data.image_result.map(|r| r.into_vec()).and_then(non_blank),
        appended_images: data.img_urls.and_then(non_blank),
        videos: data.video_urls,
        token_usage: data.token_usage.map(TokenUsage::from),
    }
}

fn non_blank(mut urls: Vec<String>) -> Option<Vec<String>> {
    urls.retain(|url| !url.trim().is_empty());
    (!urls.is_empty()).then_some(urls)
}

/// Removes inline image data and image-tool status markers from text.
pub fn strip_noise(text: &str) -> Cow<'_, str> {
    let mut out = Cow::Borrowed(text);
    for pattern in [&*DATA_IMAGE_MARKDOWN, &*DATA_IMAGE_URL, &*IMAGE_MARKER] {
        let replaced = match pattern.replace_all(&out, "") {
            Cow::Owned(s) => Some(s),
            Cow::Borrowed(_) => None,
        };
        if let Some(s) = replaced {
            out = Cow::Owned(s);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(kind: &str, data: serde_json::Value) -> Frame {
        Frame {
            kind: kind.to_string(),
            data,
        }
    }

    fn content(data: serde_json::Value) -> ContentDelta {
        match route(frame("content", data)) {
            Effect::Content(delta) => delta,
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn chunk_appends_without_trimming() {
        let delta = content(json!({"chunk": " a process."}));
        assert_eq!(delta.text, TextDelta::Append(" a process.".into()));
    }

    #[test]
    fn full_response_replaces_trimmed() {
        let delta = content(json!({"full_response": "  Goodbye \n"}));
        assert_eq!(delta.text, TextDelta::Replace("Goodbye".into()));
    }

    #[test]
    fn full_response_of_only_noise_is_empty_replace() {
        let delta = content(json!({"full_response": "Image generated successfully: "}));
        assert_eq!(delta.text, TextDelta::Replace(String::new()));
    }

    #[test]
    fn inline_images_are_stripped_from_text() {
        let delta = content(json!({
            "chunk": "Here it is ![diagram](data:image/png;base64,iVBORw0KGgo=) done"
        }));
        assert_eq!(delta.text, TextDelta::Append("Here it is  done".into()));

        let delta = content(json!({"chunk": "raw data:image/jpeg;base64,/9j/4AAQ== tail"}));
        assert_eq!(delta.text, TextDelta::Append("raw  tail".into()));
    }

    #[test]
    fn image_result_sets_and_img_urls_append() {
        let delta = content(json!({
            "image_result": "https://cdn/a.png",
            "img_urls": ["https://cdn/b.png", " "]
        }));
        assert_eq!(delta.images, Some(vec!["https://cdn/a.png".into()]));
        assert_eq!(delta.appended_images, Some(vec!["https://cdn/b.png".into()]));
        assert_eq!(delta.text, TextDelta::None);

        let delta = content(json!({"image_result": ["https://cdn/c.png", "https://cdn/d.png"]}));
        assert_eq!(
            delta.images,
            Some(vec!["https://cdn/c.png".into(), "https://cdn/d.png".into()])
        );
        assert_eq!(delta.appended_images, None);
    }

    #[test]
    fn chunk_wins_over_full_response_in_one_frame() {
        let delta = content(json!({"chunk": "A", "full_response": "B"}));
        assert_eq!(delta.text, TextDelta::Append("A".into()));
    }

    #[test]
    fn malformed_attachment_keeps_the_text() {
        let delta = content(json!({
            "full_response": "Answer",
            "token_usage": {"input_tokens": null, "output_tokens": 3},
            "image_result": ["https://cdn/a.png", null],
            "video_urls": ["https://cdn/v.mp4"]
        }));
        assert_eq!(delta.text, TextDelta::Replace("Answer".into()));
        assert_eq!(delta.token_usage, None);
        assert_eq!(delta.images, None);
        assert_eq!(delta.videos, Some(vec!["https://cdn/v.mp4".into()]));

        let delta = content(json!({"chunk": "ok", "token_usage": {"input_tokens": 1.5}}));
        assert_eq!(delta.text, TextDelta::Append("ok".into()));
        assert_eq!(delta.token_usage, None);
    }

    #[test]
    fn attachments_and_usage_ride_along_with_text() {
        let delta = content(json!({
            "chunk": "see video",
            "video_urls": ["https://cdn/v.mp4"],
            "token_usage": {"input_tokens": 3, "output_tokens": 4, "total_tokens": 7}
        }));
        assert_eq!(delta.videos, Some(vec!["https://cdn/v.mp4".into()]));
        assert_eq!(
            delta.token_usage,
            Some(TokenUsage {
                input: 3,
                output: 4,
                total: 7
            })
        );
    }

    #[test]
    fn done_carries_session_id() {
        assert_eq!(
            route(frame("done", json!({"session_id": "s-2"}))),
            Effect::Done {
                session_id: Some("s-2".into())
            }
        );
        assert_eq!(
            route(frame("done", serde_json::Value::Null)),
            Effect::Done { session_id: None }
        );
    }

    #[test]
    fn error_uses_message_or_default() {
        assert_eq!(
            route(frame("error", json!({"error": "rate limited"}))),
            Effect::Fail {
                message: "rate limited".into()
            }
        );
        assert_eq!(
            route(frame("error", json!({}))),
            Effect::Fail {
                message: DEFAULT_ERROR_MESSAGE.into()
            }
        );
    }

    #[test]
    fn unknown_kind_is_ignored() {
        assert_eq!(route(frame("heartbeat", json!({}))), Effect::Ignore);
        assert_eq!(
            route(frame("content", json!({"chunk": 42}))),
            Effect::Ignore
        );
    }

    #[test]
    fn clean_text_is_borrowed() {
        assert!(matches!(strip_noise("plain text"), Cow::Borrowed(_)));
    }
}
