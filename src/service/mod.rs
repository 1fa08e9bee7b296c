pub mod citations;
pub mod decision;
pub mod llm;
pub mod pipeline;

pub use llm::{CompletionClient, CompletionProvider, RigProvider};
pub use pipeline::ScreeningPipeline;
