//! Pipeline error taxonomy.
//!
//! Every failure that can escape a pipeline run is one of these variants.
//! The orchestrator catches all internal failures and reports them upward
//! as a `PipelineError`; nothing else crosses the boundary. Each variant
//! carries a stable machine-readable kind string, which is what the HTTP
//! surface and the CLI use to distinguish outcomes without matching on
//! human-readable messages.

use thiserror::Error;

/// Convenience alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// All failure modes of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required provider credential is absent. Surfaced before any
    /// partial execution happens.
    #[error("missing credentials: {0} is not configured")]
    MissingCredentials(&'static str),

    /// The event id does not resolve to a stored record, or the record
    /// has no query to research.
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// The event id contains characters that are not safe as a store key.
    #[error("invalid event id: {0:?}")]
    InvalidEventId(String),

    /// Not a single fetched article cleared the minimum-content
    /// threshold. Synthesis without source text would hallucinate, so the
    /// run stops here and nothing is persisted.
    #[error("no article cleared the minimum-content threshold")]
    NoContentExtracted,

    /// The model's output contained no parseable JSON object.
    #[error("model output was not parseable JSON: {0}")]
    SynthesisFormat(String),

    /// The search provider failed in a way that cannot be recovered by
    /// skipping a page.
    #[error("search provider error: {0}")]
    Search(String),

    /// The chat-model request failed after any configured retries.
    #[error("model request failed: {0}")]
    Model(String),

    /// Reading from or writing to the event store failed.
    #[error("store error: {0}")]
    Store(String),

    /// Failure outside the other categories, such as an HTTP client that
    /// could not be constructed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable, machine-readable kind for this error.
    ///
    /// These strings are part of the external contract: the HTTP surface
    /// selects status codes from them and clients may branch on them.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingCredentials(_) => "missing_credentials",
            PipelineError::EventNotFound(_) => "event_not_found",
            PipelineError::InvalidEventId(_) => "invalid_event_id",
            PipelineError::NoContentExtracted => "no_content_extracted",
            PipelineError::SynthesisFormat(_) => "synthesis_format",
            PipelineError::Search(_) => "search_error",
            PipelineError::Model(_) => "model_error",
            PipelineError::Store(_) => "store_error",
            PipelineError::Internal(_) => "internal_error",
        }
    }
}
