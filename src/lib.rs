pub mod arch;
pub mod simulator;
pub mod workload;

pub use arch::pim::{PimError, PimUnit};
pub use simulator::sim::mode::{SimConfig, StepMode};
pub use simulator::utils::log;
