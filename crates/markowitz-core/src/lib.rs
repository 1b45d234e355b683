pub mod error;
pub mod optimization;
pub mod types;
pub mod universe;

#[cfg(feature = "statistics")]
pub mod statistics;

#[cfg(feature = "market_data")]
pub mod market_data;

pub use error::{MarkowitzError, INFEASIBILITY_GUIDANCE};
pub use types::*;
pub use universe::{Asset, AssetCategory, Universe};

/// Standard result type for all markowitz operations
pub type MarkowitzResult<T> = Result<T, MarkowitzError>;
