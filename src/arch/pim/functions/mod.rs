pub mod astar;
pub mod lfsr;
pub mod mem_copy;
pub mod sym_dist_matrix;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use astar::AStar;
pub use lfsr::Lfsr;
pub use mem_copy::MemCopy;
pub use sym_dist_matrix::SymDistMatrix;

use super::error::PimError;
use super::mem_port::{ReqId, StepCtx};

/// Words written by every INIT sequence.
pub const NUM_FUNC_PARAMS: usize = 8;
/// Largest single DRAM transfer, in 64-bit words.
pub const MAX_BURST_WORDS: usize = 64;

pub type Params = [u64; NUM_FUNC_PARAMS];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuncKind {
  MemCopy,
  Lfsr,
  SymmetricDistanceMatrix,
  #[serde(rename = "astar")]
  AStar,
}

impl FuncKind {
  pub fn name(&self) -> &'static str {
    match self {
      FuncKind::MemCopy => "MemCopy",
      FuncKind::Lfsr => "LFSR",
      FuncKind::SymmetricDistanceMatrix => "SymmetricDistanceMatrix",
      FuncKind::AStar => "AStar",
    }
  }
}

impl fmt::Display for FuncKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Outstanding DRAM request of one FSM and where to resume once it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Awaiting<S> {
  pub id: ReqId,
  pub resume: S,
}

pub(crate) fn park<S: fmt::Debug>(slot: &mut Option<Awaiting<S>>, id: ReqId, resume: S) {
  assert!(slot.is_none(), "second request {} issued while {:?} is outstanding", id, slot);
  *slot = Some(Awaiting { id, resume });
}

pub(crate) fn resume<S>(slot: &mut Option<Awaiting<S>>, id: ReqId) -> Result<S, PimError> {
  match slot.take() {
    Some(waiting) if waiting.id == id => Ok(waiting.resume),
    other => {
      *slot = other;
      Err(PimError::UnknownRequest(id))
    },
  }
}

/// Algorithm bound to a function slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PimFunction {
  MemCopy(MemCopy),
  Lfsr(Lfsr),
  SymmetricDistanceMatrix(SymDistMatrix),
  AStar(AStar),
}

impl PimFunction {
  pub fn new(kind: FuncKind) -> Self {
    match kind {
      FuncKind::MemCopy => PimFunction::MemCopy(MemCopy::new()),
      FuncKind::Lfsr => PimFunction::Lfsr(Lfsr::new()),
      FuncKind::SymmetricDistanceMatrix => PimFunction::SymmetricDistanceMatrix(SymDistMatrix::new()),
      FuncKind::AStar => PimFunction::AStar(AStar::new()),
    }
  }

  pub fn kind(&self) -> FuncKind {
    match self {
      PimFunction::MemCopy(_) => FuncKind::MemCopy,
      PimFunction::Lfsr(_) => FuncKind::Lfsr,
      PimFunction::SymmetricDistanceMatrix(_) => FuncKind::SymmetricDistanceMatrix,
      PimFunction::AStar(_) => FuncKind::AStar,
    }
  }

  /// Capture operands and arm the FSM. Operand errors are fatal.
  pub fn start(&mut self, params: &Params, ctx: &mut StepCtx) -> Result<(), PimError> {
    match self {
      PimFunction::MemCopy(f) => f.start(params, ctx),
      PimFunction::Lfsr(f) => f.start(params, ctx),
      PimFunction::SymmetricDistanceMatrix(f) => f.start(params, ctx),
      PimFunction::AStar(f) => f.start(params, ctx),
    }
  }

  /// Advance one step; `true` exactly once, when the algorithm has finished.
  pub fn step(&mut self, ctx: &mut StepCtx) -> Result<bool, PimError> {
    match self {
      PimFunction::MemCopy(f) => f.step(ctx),
      PimFunction::Lfsr(f) => f.step(ctx),
      PimFunction::SymmetricDistanceMatrix(f) => f.step(ctx),
      PimFunction::AStar(f) => f.step(ctx),
    }
  }

  /// Completion of the request `id` this FSM issued.
  pub fn complete(&mut self, id: ReqId, data: &[u8]) -> Result<(), PimError> {
    match self {
      PimFunction::MemCopy(f) => f.complete(id, data),
      PimFunction::Lfsr(f) => f.complete(id, data),
      PimFunction::SymmetricDistanceMatrix(f) => f.complete(id, data),
      PimFunction::AStar(f) => f.complete(id, data),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resume_checks_id() {
    let mut slot: Option<Awaiting<u8>> = None;
    park(&mut slot, 7, 3);
    assert_eq!(resume(&mut slot, 8), Err(PimError::UnknownRequest(8)));
    assert!(slot.is_some());
    assert_eq!(resume(&mut slot, 7), Ok(3));
    assert!(slot.is_none());
  }

  #[test]
  #[should_panic(expected = "outstanding")]
  fn test_park_twice_panics() {
    let mut slot: Option<Awaiting<u8>> = None;
    park(&mut slot, 1, 0);
    park(&mut slot, 2, 0);
  }

  #[test]
  fn test_kind_roundtrip() {
    for kind in [FuncKind::MemCopy, FuncKind::Lfsr, FuncKind::SymmetricDistanceMatrix, FuncKind::AStar] {
      assert_eq!(PimFunction::new(kind).kind(), kind);
    }
  }
}
