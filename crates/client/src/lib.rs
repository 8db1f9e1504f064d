//! Client-side watcher for analysis completion.
//!
//! [`StatusGate`] resolves exactly once to "ready" or "failed" from two
//! redundant signals: a fixed-interval poll of the analysis read endpoint
//! ([`StatusSource`]) and a best-effort push subscription scoped to the
//! owning doctor ([`PushSource`]). Whichever reports a terminal state first
//! wins; the other is torn down.

pub mod config;
pub mod error;
pub mod gate;
pub mod push;
pub mod reconnect;
pub mod source;

pub use config::GateConfig;
pub use error::{GateError, SourceError};
pub use gate::{GateOutcome, GateState, StatusGate};
pub use push::{PushSource, PushSubscription, WsPushSource};
pub use source::{HttpStatusSource, StatusSource};
