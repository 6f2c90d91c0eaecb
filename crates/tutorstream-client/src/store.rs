// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP implementation of [`ConversationStore`].

use async_trait::async_trait;
use tracing::debug;
use tutorstream_config::{BackendConfig, PersistenceConfig};
use tutorstream_core::{ConversationStore, SaveOutcome, SaveRequest, TutorError};

use crate::transport::{build_http_client, error_message};

/// Upserts serialized conversations with a JSON POST to `save_url`.
#[derive(Debug, Clone)]
pub struct HttpConversationStore {
    client: reqwest::Client,
    save_url: String,
}

impl HttpConversationStore {
    /// Reuses the backend's token and timeouts.
    pub fn new(
        persistence: &PersistenceConfig,
        backend: &BackendConfig,
    ) -> Result<Self, TutorError> {
        let save_url = persistence
            .save_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| TutorError::Config("persistence.save_url is not set".into()))?;

        Ok(Self {
            client: build_http_client(backend)?,
            save_url,
        })
    }
}

#[async_trait]
impl ConversationStore for HttpConversationStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn save_conversation(&self, request: SaveRequest) -> Result<SaveOutcome, TutorError> {
        let response = self
            .client
            .post(&self.save_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TutorError::Storage {
                message: format!("save request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, "save response received");

        let body = response.text().await.map_err(|e| TutorError::Storage {
            message: format!("failed to read save response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(TutorError::Storage {
                message: error_message(status, &body),
                source: None,
            });
        }

        serde_json::from_str(&body).map_err(|e| TutorError::Storage {
            message: format!("failed to parse save response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}
