use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the EPV core.
///
/// Missing files are never silently defaulted: every pipeline stage depends on
/// the previous stage's output, so a `NotFound` carries both the path it
/// expected and the step the operator has to run to produce it.
#[derive(Debug, Error)]
pub enum FlowstateError {
    /// A required input file (raw log, feature table, model artifact) is absent.
    #[error("{} not found. {hint}", path.display())]
    NotFound { path: PathBuf, hint: String },

    /// The training data cannot support a multiclass fit (fewer than 2 distinct
    /// label classes, or an empty feature table). Surfaced, never recovered.
    #[error("degenerate training data: {0}")]
    DegenerateData(String),

    /// A model tag other than "baseline" or "sequence" reached the EPV layer.
    #[error("unknown model tag '{0}'; expected 'baseline' or 'sequence'")]
    UnknownTag(String),

    /// A feature matrix and the artifact it is scored against disagree in a way
    /// the schema-reindex contract cannot absorb (e.g. row/weight length
    /// mismatch inside the artifact itself).
    #[error("model artifact invalid: {0}")]
    InvalidArtifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, FlowstateError>;

impl FlowstateError {
    pub fn not_found(path: impl Into<PathBuf>, hint: impl Into<String>) -> Self {
        FlowstateError::NotFound {
            path: path.into(),
            hint: hint.into(),
        }
    }

    /// True when the error should surface as a 404 at the dashboard boundary.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FlowstateError::NotFound { .. })
    }
}
