//! kc-runtime: running control loops.
//!
//! Provides:
//! - [`ControlLoop`], the periodic driver that owns a cascade and its
//!   collaborators and guarantees a safe actuator on every exit
//! - [`Supervisor`] and [`LoopHandle`] for one thread per loop
//! - [`Clock`] and [`StopSignal`] for cancellable, testable timing
//! - [`Reporter`] for operator-facing notifications
//! - Compilation of plant configuration into loops
//! - A two-node thermal model for offline runs

pub mod clock;
pub mod compile;
pub mod driver;
pub mod error;
pub mod plant;
pub mod report;
pub mod stop;
pub mod supervisor;

pub use clock::{Clock, SystemClock, Wake};
pub use compile::{compile_cascade, compile_loop, compile_settings};
pub use driver::{
    ControlLoop, CycleRecord, LoopIo, LoopSettings, LoopState, LoopSummary, OverrunPolicy,
};
pub use error::{RuntimeError, RuntimeResult};
pub use plant::{SimClock, SimNode, SimulatedPlant, ThermalParams, ThermalPlant};
pub use report::{CollectingReporter, Reporter, Severity, TracingReporter};
pub use stop::{StopHandle, StopSignal, stop_channel};
pub use supervisor::{LoopHandle, Supervisor, spawn_loop};
