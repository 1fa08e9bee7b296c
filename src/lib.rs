//! Customer screening pipeline for a synthetic-DNA provider
//!
//! Takes free-text information about a prospective customer, researches it
//! through web search, denied-party screening, publication search, and
//! researcher-profile lookups driven by an LLM tool-calling loop, then
//! extracts structured findings and emits a PASS / FLAG / REVIEW verdict
//! with cited evidence as an ordered event stream.

pub mod model;
pub mod service;
pub mod tools;

pub use model::{Config, ScreeningEvent};
pub use service::{RigProvider, ScreeningPipeline};
pub use tools::ToolRegistry;
