pub mod config;
pub mod direct;
pub mod sim;
pub mod simulator;
pub mod utils;

pub use direct::DirectHost;
pub use simulator::Simulator;
pub use utils::log;
