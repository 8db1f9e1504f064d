//! Completion notification fan-out.
//!
//! [`CompletionNotifier`] is the server-side publish/subscribe registry that
//! pushes [`CompletionEvent`]s to every connection an owner currently has
//! open. It is constructed once and injected wherever events are published
//! or connections are registered.

pub mod notifier;

pub use medassist_core::job_events::CompletionEvent;
pub use notifier::{CompletionNotifier, EventReceiver, EventSender};
