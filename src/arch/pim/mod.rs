pub mod backend;
pub mod decoder;
pub mod dram;
pub mod error;
pub mod func_ctrl;
pub mod functions;
pub mod main;
pub mod mem_port;
pub mod seq;
pub mod sram;
pub mod unit;

pub use decoder::{AccessKind, AddressDecoder, DecodeInfo, MemorySegment};
pub use error::PimError;
pub use func_ctrl::{FuncCmd, FuncState};
pub use functions::{FuncKind, NUM_FUNC_PARAMS};
pub use main::create_simulation;
pub use mem_port::{DramPort, DramRequest, DramResponse};
pub use unit::PimUnit;
