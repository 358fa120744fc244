use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{park, resume, Awaiting, Params, MAX_BURST_WORDS};
use crate::arch::pim::decoder::AccessKind;
use crate::arch::pim::error::PimError;
use crate::arch::pim::mem_port::{ReqId, StepCtx};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum CopyState {
  Idle,
  Read,
  Write,
  Waiting,
  Done,
}

/// Block copy between SRAM and DRAM in bursts of up to `MAX_BURST_WORDS`.
///
/// Params: `p0` destination, `p1` source, `p2` byte count (multiple of 8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemCopy {
  state: CopyState,
  awaiting: Option<Awaiting<CopyState>>,
  dst: u64,
  src: u64,
  words_left: u64,
  dst_is_sram: bool,
  src_is_sram: bool,
  buffer: Vec<u8>,
}

impl MemCopy {
  pub fn new() -> Self {
    Self {
      state: CopyState::Idle,
      awaiting: None,
      dst: 0,
      src: 0,
      words_left: 0,
      dst_is_sram: false,
      src_is_sram: false,
      buffer: Vec::new(),
    }
  }

  fn endpoint_is_sram(ctx: &StepCtx, addr: u64, what: &'static str) -> Result<bool, PimError> {
    match ctx.kind_of(addr) {
      AccessKind::Func => Err(PimError::BadOperand {
        func: "MemCopy",
        what,
        value: addr,
      }),
      kind => Ok(kind == AccessKind::Sram),
    }
  }

  pub fn start(&mut self, params: &Params, ctx: &mut StepCtx) -> Result<(), PimError> {
    let (dst, src, num_bytes) = (params[0], params[1], params[2]);
    if num_bytes % 8 != 0 {
      return Err(PimError::BadOperand {
        func: "MemCopy",
        what: "byte count",
        value: num_bytes,
      });
    }
    self.dst_is_sram = Self::endpoint_is_sram(ctx, dst, "destination")?;
    self.src_is_sram = Self::endpoint_is_sram(ctx, src, "source")?;
    if num_bytes > 0 && src < dst.saturating_add(num_bytes) && dst < src.saturating_add(num_bytes) {
      warn!("MemCopy ranges overlap: dst={:#x} src={:#x} len={:#x}", dst, src, num_bytes);
    }

    self.dst = dst;
    self.src = src;
    self.words_left = num_bytes / 8;
    self.awaiting = None;
    self.buffer.clear();
    self.state = if self.words_left == 0 { CopyState::Done } else { CopyState::Read };
    info!("MemCopy start dst={:#x} src={:#x} words={}", dst, src, self.words_left);
    Ok(())
  }

  fn burst_bytes(&self) -> usize {
    (self.words_left as usize).min(MAX_BURST_WORDS) * 8
  }

  pub fn step(&mut self, ctx: &mut StepCtx) -> Result<bool, PimError> {
    match self.state {
      CopyState::Idle | CopyState::Waiting => Ok(false),
      CopyState::Read => {
        let len = self.burst_bytes();
        self.buffer.clear();
        self.buffer.resize(len, 0);
        if self.src_is_sram {
          ctx.sram.read(self.src, &mut self.buffer)?;
          self.state = CopyState::Write;
        } else {
          let id = ctx.issue_read(self.src, len);
          park(&mut self.awaiting, id, CopyState::Write);
          self.state = CopyState::Waiting;
        }
        self.src += len as u64;
        Ok(false)
      },
      CopyState::Write => {
        let len = self.buffer.len();
        assert_eq!(len, self.burst_bytes(), "copy buffer does not match burst");
        self.words_left -= (len / 8) as u64;
        let next = if self.words_left > 0 { CopyState::Read } else { CopyState::Done };
        if self.dst_is_sram {
          ctx.sram.write(self.dst, &self.buffer)?;
          self.state = next;
        } else {
          let id = ctx.issue_write(self.dst, self.buffer.clone());
          park(&mut self.awaiting, id, next);
          self.state = CopyState::Waiting;
        }
        self.dst += len as u64;
        Ok(false)
      },
      CopyState::Done => {
        debug!("MemCopy done");
        self.state = CopyState::Idle;
        Ok(true)
      },
    }
  }

  pub fn complete(&mut self, id: ReqId, data: &[u8]) -> Result<(), PimError> {
    let next = resume(&mut self.awaiting, id)?;
    if next == CopyState::Write {
      assert_eq!(data.len(), self.buffer.len(), "short read completion");
      self.buffer.copy_from_slice(data);
    }
    self.state = next;
    Ok(())
  }
}

impl Default for MemCopy {
  fn default() -> Self {
    Self::new()
  }
}
