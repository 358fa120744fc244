use thiserror::Error;

use super::decoder::AccessKind;
use super::func_ctrl::FuncState;
use super::mem_port::ReqId;

/// Fatal conditions raised by the PIM unit and its host harnesses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PimError {
  #[error("{kind} segment base={base:#x} size={size:#x} is not 8-byte aligned")]
  MisalignedSegment { kind: AccessKind, base: u64, size: u64 },

  #[error("{kind} segment at {base:#x} overlaps or precedes the previous segment ending at {prev_top:#x}")]
  OverlappingSegment { kind: AccessKind, base: u64, prev_top: u64 },

  #[error("missing {0} segment")]
  MissingSegment(AccessKind),

  #[error("configuration: {0}")]
  Config(String),

  #[error("address {addr:#x} is not mapped")]
  Unmapped { addr: u64 },

  #[error("address {addr:#x} decodes to {kind}, not to a PIM register")]
  NotMmio { addr: u64, kind: AccessKind },

  #[error("function register access at {addr:#x} must be an aligned 8-byte access, got {num_bytes} bytes")]
  BadFuncAccess { addr: u64, num_bytes: usize },

  #[error("function slot {0} does not exist")]
  NoSuchFunction(usize),

  #[error("function {fnum}: write {value:#x} not allowed in state {state}")]
  Protocol { fnum: usize, state: FuncState, value: u64 },

  #[error("function {fnum} cannot start while function {running} is running")]
  Busy { fnum: usize, running: usize },

  #[error("{region} access [{addr:#x}, +{num_bytes}) out of bounds")]
  OutOfBounds { region: AccessKind, addr: u64, num_bytes: usize },

  #[error("{func}: invalid {what} = {value:#x}")]
  BadOperand { func: &'static str, what: &'static str, value: u64 },

  #[error("completion for unknown request id {0}")]
  UnknownRequest(ReqId),

  #[error("SRAM self-check failed: read {got:#x}, expected {expected:#x}")]
  SelfCheck { got: u64, expected: u64 },

  #[error("host: {0}")]
  Host(String),
}

impl From<PimError> for std::io::Error {
  fn from(e: PimError) -> Self {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
  }
}
