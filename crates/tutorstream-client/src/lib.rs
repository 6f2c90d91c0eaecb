// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming protocol support for the tutorstream chat engine.
//!
//! [`FrameDecoder`] turns raw network reads into [`Frame`]s, [`route`] maps
//! each frame to an [`Effect`] on the in-flight message, and
//! [`HttpTransport`] / [`HttpConversationStore`] are the HTTP collaborators.

pub mod decoder;
pub mod router;
pub mod store;
pub mod transport;
pub mod types;

pub use decoder::{FrameDecoder, Recovery, RecoveryThresholds, try_recover_or_buffer};
pub use router::{ContentDelta, Effect, TextDelta, route, strip_noise};
pub use store::HttpConversationStore;
pub use transport::HttpTransport;
pub use types::Frame;
