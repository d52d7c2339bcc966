use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("Shape '{shape}' is invalid: {reason}")]
    InvalidShape { shape: String, reason: String },

    #[error("Shape '{shape}': no conversion to {target} for field '{field}' ({request})")]
    UnsupportedConversion {
        shape: String,
        field: String,
        target: String,
        request: String,
    },

    #[error("Shape '{shape}': failed to map column '{column}' into '{binding}': {reason}")]
    CastFailure {
        shape: String,
        binding: String,
        column: String,
        reason: String,
        trace: String,
    },

    #[error("Shape '{shape}': row has no column '{column}' for '{binding}'")]
    MissingColumn {
        shape: String,
        binding: String,
        column: String,
    },

    #[error("Shape '{shape}' has not been configured")]
    NotConfigured { shape: String },

    #[error("Row source failure: {0}")]
    Source(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl MapError {
    /// Compile-time trace attached to a cast failure.
    pub fn trace(&self) -> Option<&str> {
        match self {
            MapError::CastFailure { trace, .. } => Some(trace.as_str()),
            _ => None,
        }
    }

    pub fn is_cast_failure(&self) -> bool {
        matches!(self, MapError::CastFailure { .. })
    }
}
