/// Probe execution and scheduling
///
/// This module is responsible for:
/// - Executing one HTTP probe per endpoint definition
/// - Driving one recurring timer per active schedule
/// - Applying probe outcomes to the engine state
pub mod driver;
pub mod probe;
pub mod recorder;

pub use driver::{DriverRegistry, ScheduleRunner, TickOutcome};
pub use probe::{HttpProber, ProbeOutcome, Prober};
