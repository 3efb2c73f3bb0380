/// Errors raised while building and applying grid axes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// A raw axis value string could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A parsed value is outside its declared type, bounds or choices.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An axis value could not be written onto a job configuration.
    #[error("Application failed: {0}")]
    Application(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
