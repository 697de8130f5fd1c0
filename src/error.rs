/// Errors surfaced by [`compute_persistence`](crate::compute_persistence) and the stages it drives.
///
/// A collapse request on a matrix with a non-zero diagonal is not an error: the
/// option is dropped with a warning and the computation proceeds.
#[derive(Debug, thiserror::Error)]
pub enum RipsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    #[error("Engine failure: {0}")]
    EngineFailure(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RipsError>;

impl RipsError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        RipsError::InvalidInput(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        RipsError::UnsupportedCombination(message.into())
    }
}
