use thiserror::Error;

/// Advice shown to the caller when no allocation satisfies the request.
pub const INFEASIBILITY_GUIDANCE: &str = "Try relaxing the constraints: lower the target return, \
raise the maximum weight per asset, lower the category minimums or the minimum asset weight.";

#[derive(Debug, Error)]
pub enum MarkowitzError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Empty universe: no assets left to optimize")]
    EmptyUniverse,

    #[error("No feasible allocation: {status}")]
    InfeasibleConstraints { status: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Numerical error: {0}")]
    NumericalError(String),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl MarkowitzError {
    /// Whether the caller should be shown [`INFEASIBILITY_GUIDANCE`].
    pub fn suggests_relaxation(&self) -> bool {
        matches!(self, MarkowitzError::InfeasibleConstraints { .. })
    }
}

impl From<serde_json::Error> for MarkowitzError {
    fn from(e: serde_json::Error) -> Self {
        MarkowitzError::SerializationError(e.to_string())
    }
}
