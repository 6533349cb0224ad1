//! Thin client for the Jarvis backend.
//!
//! - `events` - SSE decoding into typed [`StreamEvent`]s
//! - `client` - HTTP calls, behind the [`ChatBackend`] seam used by chat sessions
//! - `notify` - injected handler for user-facing notices
mod client;
mod events;
mod notify;

pub use client::{ChatBackend, JarvisClient};
pub use events::{SseDecoder, StreamEvent, parse_event_data};
pub use notify::{FnNotifier, NoticeLevel, Notifier, TracingNotifier, default_notifier};
