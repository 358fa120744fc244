use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::PimError;
use super::functions::{FuncKind, Params, PimFunction, NUM_FUNC_PARAMS};
use super::mem_port::{ReqId, StepCtx};

/// Lifecycle of a function slot; the discriminant is the value read back
/// from the slot's control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u64)]
pub enum FuncState {
  Invalid = 0,
  Initializing = 1,
  Ready = 2,
  Running = 3,
  Done = 4,
}

impl FuncState {
  pub fn code(self) -> u64 {
    self as u64
  }

  pub fn from_code(code: u64) -> Option<Self> {
    match code {
      0 => Some(FuncState::Invalid),
      1 => Some(FuncState::Initializing),
      2 => Some(FuncState::Ready),
      3 => Some(FuncState::Running),
      4 => Some(FuncState::Done),
      _ => None,
    }
  }
}

impl fmt::Display for FuncState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      FuncState::Invalid => "Invalid",
      FuncState::Initializing => "Initializing",
      FuncState::Ready => "Ready",
      FuncState::Running => "Running",
      FuncState::Done => "Done",
    };
    f.write_str(name)
  }
}

/// Command words written to a control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum FuncCmd {
  Init = 0,
  Run = 1,
}

impl FuncCmd {
  pub fn code(self) -> u64 {
    self as u64
  }
}

/// One addressable function: its control register and the FSM bound to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncSlot {
  fnum: usize,
  state: FuncState,
  params: Params,
  counter: usize,
  func: PimFunction,
}

impl FuncSlot {
  pub fn new(fnum: usize, kind: FuncKind) -> Self {
    Self {
      fnum,
      state: FuncState::Invalid,
      params: [0; NUM_FUNC_PARAMS],
      counter: 0,
      func: PimFunction::new(kind),
    }
  }

  pub fn state(&self) -> FuncState {
    self.state
  }

  pub fn kind(&self) -> FuncKind {
    self.func.kind()
  }

  /// Control register read; no side effect.
  pub fn read(&self) -> u64 {
    self.state.code()
  }

  pub fn write(&mut self, value: u64, ctx: &mut StepCtx) -> Result<(), PimError> {
    let violation = PimError::Protocol {
      fnum: self.fnum,
      state: self.state,
      value,
    };
    match self.state {
      FuncState::Invalid | FuncState::Done => {
        if value != FuncCmd::Init.code() {
          return Err(violation);
        }
        self.counter = 0;
        self.state = FuncState::Initializing;
      },
      FuncState::Initializing => {
        self.params[self.counter] = value;
        self.counter += 1;
        if self.counter == NUM_FUNC_PARAMS {
          self.state = FuncState::Ready;
        }
      },
      FuncState::Ready => {
        if value != FuncCmd::Run.code() {
          return Err(violation);
        }
        self.func.start(&self.params, ctx)?;
        self.counter = 0;
        self.state = FuncState::Running;
        info!("func[{}] {} running, params={:x?}", self.fnum, self.kind(), self.params);
      },
      FuncState::Running => return Err(violation),
    }
    debug!("func[{}] write {:#x} -> {}", self.fnum, value, self.state);
    Ok(())
  }

  /// Advance the bound FSM one step if running; `true` on the step it finishes.
  pub fn clock(&mut self, ctx: &mut StepCtx) -> Result<bool, PimError> {
    if self.state != FuncState::Running {
      return Ok(false);
    }
    if self.func.step(ctx)? {
      self.state = FuncState::Done;
      return Ok(true);
    }
    Ok(false)
  }

  pub fn complete(&mut self, id: ReqId, data: &[u8]) -> Result<(), PimError> {
    self.func.complete(id, data)
  }
}
