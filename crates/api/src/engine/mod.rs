//! Analysis execution engine.
//!
//! Contains the background dispatcher that claims pending analyses, the
//! analyzer seam it calls, and the glue that writes terminal states to the
//! job store before pushing completion events.

pub mod analyzer;
pub mod dispatcher;

pub use analyzer::{AnalysisRequest, Analyzer, AnalyzerError, HttpAnalyzer, StubAnalyzer};
pub use dispatcher::AnalysisDispatcher;
