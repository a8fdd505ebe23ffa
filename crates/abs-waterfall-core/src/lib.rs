pub mod aggregation;
pub mod collateral;
pub mod deal;
pub mod error;
pub mod simulation;
pub mod time_value;
pub mod types;
pub mod waterfall;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use deal::{DealParameters, DealType, LossAssumption};
pub use error::WaterfallError;
pub use simulation::{simulate, simulate_clo, simulate_cmbs, SimulationOutput, Tranche};
pub use types::*;

/// Standard result type for all waterfall operations
pub type WaterfallResult<T> = Result<T, WaterfallError>;
