use advgrid_core::host::HostError;
use advgrid_core::CoreError;

/// Errors that end a grid run early.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The grid manifest could not be written.
    #[error("Failed to write grid manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    /// An artifact could not be decoded or stored.
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Host options could not be read before the run.
    #[error("Cannot snapshot host settings: {0}")]
    Host(#[from] HostError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
