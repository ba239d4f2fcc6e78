mod aggregate;
mod assumptions;
mod engine;
mod error;
mod types;

pub use aggregate::{aggregate, break_even_month, monthly_unit_economics};
pub use assumptions::{Assumptions, MAX_HORIZON_MONTHS, validate_horizon};
pub use engine::{MonthState, simulate, step_month};
pub use error::{ModelError, ModelResult};
pub use types::{
    AdsPhase, ChannelBreakdown, MarketingSpend, MonthRecord, MonthlyUnitEconomics, YearSummary,
};
