//! Error types for the screening pipeline

use thiserror::Error;

use crate::service::llm::LlmError;

/// Fatal-to-run pipeline failures. The underlying message is forwarded to
/// the caller verbatim in the terminal `error` event.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Verification(LlmError),

    #[error("{0}")]
    Extraction(LlmError),
}
