// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits the engine depends on.
//!
//! Both use `#[async_trait]` so they can be held as `Arc<dyn ...>`.

pub mod store;
pub mod transport;

pub use store::ConversationStore;
pub use transport::ChatTransport;
