//! kc-core: stable foundation for kettle-control.
//!
//! Contains:
//! - numeric (Real + float helpers)
//! - units (temperature unit system backed by uom)
//! - timing (per-loop cycle statistics)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod timing;
pub mod units;

pub use error::{KcError, KcResult};
pub use numeric::*;
pub use timing::CycleStats;
pub use units::*;
