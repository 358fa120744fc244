use log::{info, trace};
use serde::{Deserialize, Serialize};

use super::{park, resume, Awaiting, Params, MAX_BURST_WORDS};
use crate::arch::pim::decoder::AccessKind;
use crate::arch::pim::error::PimError;
use crate::arch::pim::mem_port::{ReqId, StepCtx};
use crate::arch::pim::seq::SeqReg;
use crate::arch::pim::sram::words_to_bytes;
use crate::commit_regs;

/// Cell value for a pair without an edge.
pub const NO_EDGE: u64 = u64::MAX;

/// Mask an edge's high half must fully cover. Larger graphs get sparser.
pub fn prob_mask(vertices: u32) -> u32 {
  let shift = 29u32.saturating_sub(vertices.leading_zeros());
  ((1u64 << shift) - 1) as u32
}

/// Distance between two vertices given their random seeds.
pub fn distance_cell(rand_r: u64, rand_c: u64, prob_mask: u32, dist_mask: u64) -> u64 {
  let x = rand_r ^ rand_c;
  let high = (x >> 32) as u32;
  let low = x as u32 as u64;
  if high & prob_mask == prob_mask {
    low & dist_mask
  } else {
    NO_EDGE
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum LoopState {
  Idle,
  InitRow,
  Cycle,
  Cleanup,
  Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum DmaState {
  Idle,
  Wait,
}

/// Builds an n*n symmetric distance matrix in DRAM from n seeds in SRAM.
///
/// Params: `p0` matrix base, `p1` seed array base, `p2` distance mask,
/// `p3` vertex count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymDistMatrix {
  matrix_base: u64,
  rand_base: u64,
  dist_mask: u64,
  vertices: u64,
  prob_mask: u32,
  awaiting: Option<Awaiting<()>>,
  buffer: Vec<u64>,

  loop_state: SeqReg<LoopState>,
  dma_state: SeqReg<DmaState>,
  curr_row: SeqReg<u64>,
  curr_col: SeqReg<u64>,
  row_rand: SeqReg<u64>,
  buffer_head: SeqReg<usize>,
  matrix_head: SeqReg<u64>,
}

impl SymDistMatrix {
  pub fn new() -> Self {
    Self {
      matrix_base: 0,
      rand_base: 0,
      dist_mask: 0,
      vertices: 0,
      prob_mask: 0,
      awaiting: None,
      buffer: vec![0; MAX_BURST_WORDS],
      loop_state: SeqReg::new(LoopState::Idle),
      dma_state: SeqReg::new(DmaState::Idle),
      curr_row: SeqReg::new(0),
      curr_col: SeqReg::new(0),
      row_rand: SeqReg::new(0),
      buffer_head: SeqReg::new(0),
      matrix_head: SeqReg::new(0),
    }
  }

  fn bad(what: &'static str, value: u64) -> PimError {
    PimError::BadOperand {
      func: "SymmetricDistanceMatrix",
      what,
      value,
    }
  }

  pub fn start(&mut self, params: &Params, ctx: &mut StepCtx) -> Result<(), PimError> {
    let (matrix_base, rand_base, dist_mask, vertices) = (params[0], params[1], params[2], params[3]);
    if vertices == 0 || vertices > u32::MAX as u64 {
      return Err(Self::bad("vertex count", vertices));
    }
    if dist_mask > u32::MAX as u64 {
      return Err(Self::bad("distance mask", dist_mask));
    }
    let rand_bytes = vertices * 8;
    let sram = ctx.decoder.segment(AccessKind::Sram).ok_or(PimError::MissingSegment(AccessKind::Sram))?;
    if !sram.contains_range(rand_base, rand_bytes) {
      return Err(Self::bad("seed array", rand_base));
    }
    let dram = ctx.decoder.segment(AccessKind::Dram).ok_or(PimError::MissingSegment(AccessKind::Dram))?;
    let matrix_bytes = vertices.checked_mul(rand_bytes).ok_or_else(|| Self::bad("vertex count", vertices))?;
    if !dram.contains_range(matrix_base, matrix_bytes) {
      return Err(Self::bad("matrix", matrix_base));
    }

    self.matrix_base = matrix_base;
    self.rand_base = rand_base;
    self.dist_mask = dist_mask;
    self.vertices = vertices;
    self.prob_mask = prob_mask(vertices as u32);
    self.awaiting = None;
    self.buffer.iter_mut().for_each(|w| *w = 0);

    self.loop_state.latch(LoopState::InitRow);
    self.dma_state.latch(DmaState::Idle);
    self.curr_row.latch(0);
    self.curr_col.latch(0);
    self.row_rand.latch(0);
    self.buffer_head.latch(0);
    self.matrix_head.latch(matrix_base);
    info!(
      "SymmetricDistanceMatrix start n={} prob_mask={:#x} dist_mask={:#x}",
      vertices, self.prob_mask, dist_mask
    );
    Ok(())
  }

  fn flush(&mut self, ctx: &mut StepCtx) {
    let head = self.buffer_head.get();
    let bytes = words_to_bytes(&self.buffer[..head]);
    let addr = self.matrix_head.get();
    trace!("SymmetricDistanceMatrix flush {} words to {:#x}", head, addr);
    let id = ctx.issue_write(addr, bytes);
    park(&mut self.awaiting, id, ());
    self.dma_state.set(DmaState::Wait);
    self.matrix_head.set(addr + head as u64 * 8);
    self.buffer_head.set(0);
  }

  fn step_cycle(&mut self, ctx: &mut StepCtx) -> Result<(), PimError> {
    if self.dma_state.get() == DmaState::Wait {
      return Ok(());
    }
    let head = self.buffer_head.get();
    if head == self.buffer.len() {
      self.flush(ctx);
      return Ok(());
    }

    let (row, col) = (self.curr_row.get(), self.curr_col.get());
    let cell = if row == col {
      0
    } else {
      let col_rand = ctx.sram.read_u64(self.rand_base + col * 8)?;
      distance_cell(self.row_rand.get(), col_rand, self.prob_mask, self.dist_mask)
    };
    self.buffer[head] = cell;
    self.buffer_head.set(head + 1);

    if col + 1 < self.vertices {
      self.curr_col.set(col + 1);
    } else if row + 1 < self.vertices {
      self.curr_row.set(row + 1);
      self.loop_state.set(LoopState::InitRow);
    } else {
      self.loop_state.set(LoopState::Cleanup);
    }
    Ok(())
  }

  pub fn step(&mut self, ctx: &mut StepCtx) -> Result<bool, PimError> {
    let mut finished = false;
    match self.loop_state.get() {
      LoopState::Idle | LoopState::Done => {},
      LoopState::InitRow => {
        let seed = ctx.sram.read_u64(self.rand_base + self.curr_row.get() * 8)?;
        self.row_rand.set(seed);
        self.curr_col.set(0);
        self.loop_state.set(LoopState::Cycle);
      },
      LoopState::Cycle => self.step_cycle(ctx)?,
      LoopState::Cleanup => match (self.dma_state.get(), self.buffer_head.get()) {
        (DmaState::Wait, _) => {},
        (DmaState::Idle, 0) => {
          self.loop_state.set(LoopState::Done);
          finished = true;
        },
        (DmaState::Idle, _) => self.flush(ctx),
      },
    }
    commit_regs!(
      self.loop_state,
      self.dma_state,
      self.curr_row,
      self.curr_col,
      self.row_rand,
      self.buffer_head,
      self.matrix_head,
    );
    Ok(finished)
  }

  pub fn complete(&mut self, id: ReqId, _data: &[u8]) -> Result<(), PimError> {
    resume(&mut self.awaiting, id)?;
    self.dma_state.latch(DmaState::Idle);
    Ok(())
  }
}

impl Default for SymDistMatrix {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::pim::decoder::{AddressDecoder, MemorySegment};
  use crate::arch::pim::mem_port::RequestIssuer;
  use crate::arch::pim::sram::Sram;

  #[test]
  fn test_prob_mask() {
    assert_eq!(prob_mask(1), 0);
    assert_eq!(prob_mask(3), 0);
    assert_eq!(prob_mask(4), 0);
    assert_eq!(prob_mask(7), 0);
    assert_eq!(prob_mask(8), 1);
    assert_eq!(prob_mask(16), 0b11);
    assert_eq!(prob_mask(1 << 20), (1 << 18) - 1);
    assert_eq!(prob_mask(u32::MAX), (1 << 29) - 1);
  }

  #[test]
  fn test_distance_cell() {
    let a = 0x0000_0007_0000_1234u64;
    let b = 0x0000_0000_0000_0034u64;
    assert_eq!(distance_cell(a, b, 0b111, 0xffff), 0x1200);
    assert_eq!(distance_cell(a, b, 0b111, 0xf), 0);
    assert_eq!(distance_cell(a, b, 0b1111, 0xffff), NO_EDGE);
    assert_eq!(distance_cell(a, b, 0, 0xff), 0);
    assert_eq!(distance_cell(a, b, 0b11, 0xffff), distance_cell(b, a, 0b11, 0xffff));
  }

  struct Fixture {
    decoder: AddressDecoder,
    sram: Sram,
    issuer: RequestIssuer,
  }

  impl Fixture {
    fn new() -> Self {
      Self {
        decoder: AddressDecoder::new(vec![
          MemorySegment::new(AccessKind::Sram, 0x2000, 0x1000),
          MemorySegment::new(AccessKind::Dram, 0x8000, 0x8000),
        ])
        .unwrap(),
        sram: Sram::new(0x2000, 0x1000),
        issuer: RequestIssuer::new(),
      }
    }

    fn ctx(&mut self) -> StepCtx<'_> {
      StepCtx::new(&self.decoder, &mut self.sram, &mut self.issuer, 0)
    }
  }

  fn started(fx: &mut Fixture, vertices: u64) -> SymDistMatrix {
    let mut f = SymDistMatrix::new();
    f.start(&[0x8000, 0x2000, 0xF, vertices, 0, 0, 0, 0], &mut fx.ctx()).unwrap();
    f
  }

  #[test]
  fn test_completion_must_match_flush() {
    let mut fx = Fixture::new();
    let mut f = started(&mut fx, 2);
    let mut steps = 0;
    while fx.issuer.in_flight() == 0 {
      assert!(!f.step(&mut fx.ctx()).unwrap());
      steps += 1;
      assert!(steps < 20);
    }
    let req = fx.issuer.drain().remove(0);
    assert_eq!(req.num_bytes, 4 * 8);

    assert_eq!(f.complete(req.id + 1, &[]), Err(PimError::UnknownRequest(req.id + 1)));
    // still stalled on the real write
    assert!(!f.step(&mut fx.ctx()).unwrap());
    f.complete(req.id, &[]).unwrap();
    assert!(f.step(&mut fx.ctx()).unwrap());
  }

  #[test]
  #[should_panic(expected = "outstanding")]
  fn test_second_flush_while_waiting_panics() {
    let mut fx = Fixture::new();
    let mut f = started(&mut fx, 2);
    f.buffer_head.latch(1);
    f.flush(&mut fx.ctx());
    commit_regs!(f.dma_state, f.matrix_head, f.buffer_head);
    f.buffer_head.latch(1);
    f.flush(&mut fx.ctx());
  }
}
