// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folds content deltas into the in-flight assistant message.
//!
//! There is exactly one accumulator per exchange and the orchestrator hands
//! it every delta by `&mut`, so interleaved chunk and full-response frames
//! always see the latest text.

use tutorstream_client::{ContentDelta, TextDelta};
use tutorstream_core::{Message, MessageId, TokenUsage};

/// Running state of the assistant message for one exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentAccumulator {
    content: String,
    image_urls: Option<Vec<String>>,
    video_urls: Option<Vec<String>>,
    token_usage: Option<TokenUsage>,
}

impl ContentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn image_urls(&self) -> Option<&[String]> {
        self.image_urls.as_deref()
    }

    pub fn video_urls(&self) -> Option<&[String]> {
        self.video_urls.as_deref()
    }

    pub fn token_usage(&self) -> Option<TokenUsage> {
        self.token_usage
    }

    /// Applies one delta. Returns true if anything changed.
    ///
    /// Text: chunks append, a full response overwrites. An `image_result`
    /// replaces the image list and `img_urls` append to it. Videos and token
    /// usage are replaced by the latest frame that carries them.
    pub fn apply(&mut self, delta: ContentDelta) -> bool {
        let mut changed = false;

        match delta.text {
            TextDelta::None => {}
            TextDelta::Append(text) => {
                if !text.is_empty() {
                    self.content.push_str(&text);
                    changed = true;
                }
            }
            TextDelta::Replace(text) => {
                if self.content != text {
                    self.content = text;
                    changed = true;
                }
            }
        }

        if let Some(images) = delta.images
            && self.image_urls.as_ref() != Some(&images)
        {
            self.image_urls = Some(images);
            changed = true;
        }

        if let Some(more) = delta.appended_images
            && !more.is_empty()
        {
            self.image_urls.get_or_insert_with(Vec::new).extend(more);
            changed = true;
        }

        if let Some(videos) = delta.videos
            && self.video_urls.as_ref() != Some(&videos)
        {
            self.video_urls = Some(videos);
            changed = true;
        }

        if let Some(usage) = delta.token_usage
            && self.token_usage != Some(usage)
        {
            self.token_usage = Some(usage);
            changed = true;
        }

        changed
    }

    /// Writes the accumulated state onto `message`.
    ///
    /// Attachment fields are only overwritten when this exchange produced
    /// them, so a reconcile pass never erases data with `None`.
    pub fn write_to(&self, message: &mut Message) {
        message.content.clone_from(&self.content);
        if let Some(images) = &self.image_urls {
            message.image_urls = Some(images.clone());
        }
        if let Some(videos) = &self.video_urls {
            message.video_urls = Some(videos.clone());
        }
        if let Some(usage) = self.token_usage {
            message.token_usage = Some(usage);
        }
    }

    /// Updates the message with `id` in place. Order of the list is untouched.
    ///
    /// Returns false if no message has that id.
    pub fn apply_to(&self, messages: &mut [Message], id: &MessageId) -> bool {
        match messages.iter_mut().find(|m| &m.id == id) {
            Some(message) => {
                self.write_to(message);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorstream_client::{Effect, Frame, route};

    fn append(text: &str) -> ContentDelta {
        ContentDelta {
            text: TextDelta::Append(text.into()),
            ..ContentDelta::default()
        }
    }

    fn replace(text: &str) -> ContentDelta {
        ContentDelta {
            text: TextDelta::Replace(text.into()),
            ..ContentDelta::default()
        }
    }

    #[test]
    fn chunks_concatenate_in_order() {
        let mut acc = ContentAccumulator::new();
        for chunk in ["Photo", "synthesis is", " a process."] {
            acc.apply(append(chunk));
        }
        assert_eq!(acc.content(), "Photosynthesis is a process.");
    }

    #[test]
    fn full_response_overwrites_accumulated_chunks() {
        let mut acc = ContentAccumulator::new();
        acc.apply(append("Hel"));
        acc.apply(append("lo"));
        acc.apply(replace("Goodbye"));
        assert_eq!(acc.content(), "Goodbye");

        acc.apply(append("!"));
        assert_eq!(acc.content(), "Goodbye!");
    }

    #[test]
    fn unchanged_delta_reports_no_change() {
        let mut acc = ContentAccumulator::new();
        assert!(acc.apply(replace("same")));
        assert!(!acc.apply(replace("same")));
        assert!(!acc.apply(append("")));
        assert!(!acc.apply(ContentDelta::default()));
    }

    #[test]
    fn image_result_replaces_and_img_urls_append() {
        let mut acc = ContentAccumulator::new();
        acc.apply(ContentDelta {
            images: Some(vec!["old.png".into()]),
            appended_images: Some(vec!["extra.png".into()]),
            ..ContentDelta::default()
        });
        assert_eq!(
            acc.image_urls(),
            Some(&["old.png".to_string(), "extra.png".to_string()][..])
        );

        acc.apply(ContentDelta {
            images: Some(vec!["new.png".into()]),
            ..ContentDelta::default()
        });
        assert_eq!(acc.image_urls(), Some(&["new.png".to_string()][..]));

        acc.apply(ContentDelta {
            appended_images: Some(vec!["new.png".into()]),
            ..ContentDelta::default()
        });
        assert_eq!(
            acc.image_urls(),
            Some(&["new.png".to_string(), "new.png".to_string()][..])
        );
    }

    #[test]
    fn routed_frame_with_chunk_and_full_response_appends() {
        let mut acc = ContentAccumulator::new();
        acc.apply(append("X"));
        let frame = Frame {
            kind: "content".into(),
            data: serde_json::json!({"chunk": "A", "full_response": "B"}),
        };
        let Effect::Content(delta) = route(frame) else {
            panic!("expected content");
        };
        acc.apply(delta);
        assert_eq!(acc.content(), "XA");
    }

    #[test]
    fn corrective_image_result_drops_stale_images() {
        let mut acc = ContentAccumulator::new();
        for (text, image) in [("Draft", "https://cdn/old.png"), ("Final", "https://cdn/new.png")] {
            let frame = Frame {
                kind: "content".into(),
                data: serde_json::json!({"full_response": text, "image_result": image}),
            };
            let Effect::Content(delta) = route(frame) else {
                panic!("expected content");
            };
            acc.apply(delta);
        }
        assert_eq!(acc.content(), "Final");
        assert_eq!(acc.image_urls(), Some(&["https://cdn/new.png".to_string()][..]));
    }

    #[test]
    fn videos_and_usage_take_latest() {
        let mut acc = ContentAccumulator::new();
        acc.apply(ContentDelta {
            videos: Some(vec!["v1.mp4".into()]),
            token_usage: Some(TokenUsage {
                input: 1,
                output: 1,
                total: 2,
            }),
            ..ContentDelta::default()
        });
        acc.apply(ContentDelta {
            videos: Some(vec!["v2.mp4".into()]),
            token_usage: Some(TokenUsage {
                input: 5,
                output: 9,
                total: 14,
            }),
            ..ContentDelta::default()
        });
        assert_eq!(acc.video_urls(), Some(&["v2.mp4".to_string()][..]));
        assert_eq!(acc.token_usage().map(|u| u.total), Some(14));
    }

    #[test]
    fn apply_to_targets_message_by_id() {
        let user = Message::user("What is photosynthesis?");
        let placeholder = Message::assistant_placeholder();
        let id = placeholder.id.clone();
        let mut messages = vec![user.clone(), placeholder];

        let mut acc = ContentAccumulator::new();
        acc.apply(append("Plants make sugar."));
        assert!(acc.apply_to(&mut messages, &id));

        assert_eq!(messages[0], user);
        assert_eq!(messages[1].content, "Plants make sugar.");
        assert!(!acc.apply_to(&mut messages, &MessageId::assistant()));
    }
}
