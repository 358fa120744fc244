use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{park, resume, Awaiting, Params, MAX_BURST_WORDS};
use crate::arch::pim::decoder::AccessKind;
use crate::arch::pim::error::PimError;
use crate::arch::pim::mem_port::{ReqId, StepCtx};
use crate::arch::pim::sram::words_to_bytes;

/// Feedback taps of the 64-bit Fibonacci register.
pub const LFSR_TAPS: [u32; 11] = [5, 8, 10, 20, 27, 28, 34, 39, 54, 56, 59];
/// Shifts between two captured samples.
pub const SAMPLE_INTERVAL: u32 = 13;

pub fn lfsr_shift(state: u64) -> u64 {
  let bit = LFSR_TAPS.iter().fold(0, |acc, &tap| acc ^ (state >> tap)) & 1;
  (state >> 1) | (bit << 63)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum LoopState {
  Idle,
  Init,
  Cycling,
  Done,
}

/// Pseudo-random sample generator.
///
/// Params: `p0` destination, `p1` seed, `p2` number of samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lfsr {
  loop_state: LoopState,
  awaiting: Option<Awaiting<()>>,
  dst: u64,
  dst_is_sram: bool,
  seed: u64,
  len: u64,
  state: u64,
  samples: u64,
  cycles: u32,
  capacity: usize,
  buffer: Vec<u64>,
}

impl Lfsr {
  pub fn new() -> Self {
    Self::with_buffer_words(MAX_BURST_WORDS)
  }

  pub fn with_buffer_words(capacity: usize) -> Self {
    assert!(capacity > 0, "LFSR buffer needs at least one word");
    Self {
      loop_state: LoopState::Idle,
      awaiting: None,
      dst: 0,
      dst_is_sram: false,
      seed: 0,
      len: 0,
      state: 0,
      samples: 0,
      cycles: 0,
      capacity,
      buffer: Vec::with_capacity(capacity),
    }
  }

  pub fn start(&mut self, params: &Params, ctx: &mut StepCtx) -> Result<(), PimError> {
    let (dst, seed, len) = (params[0], params[1], params[2]);
    self.dst_is_sram = match ctx.kind_of(dst) {
      AccessKind::Func => {
        return Err(PimError::BadOperand {
          func: "LFSR",
          what: "destination",
          value: dst,
        })
      },
      kind => kind == AccessKind::Sram,
    };
    self.dst = dst;
    self.seed = seed;
    self.len = len;
    self.awaiting = None;
    self.loop_state = LoopState::Init;
    info!("LFSR start dst={:#x} seed={:#x} len={}", dst, seed, len);
    Ok(())
  }

  fn flush(&mut self, ctx: &mut StepCtx) -> Result<(), PimError> {
    let bytes = words_to_bytes(&self.buffer);
    let addr = self.dst;
    self.dst += bytes.len() as u64;
    if self.dst_is_sram {
      ctx.sram.write(addr, &bytes)?;
      self.buffer.clear();
    } else {
      let id = ctx.issue_write(addr, bytes);
      park(&mut self.awaiting, id, ());
    }
    Ok(())
  }

  pub fn step(&mut self, ctx: &mut StepCtx) -> Result<bool, PimError> {
    match self.loop_state {
      LoopState::Idle | LoopState::Done => Ok(false),
      LoopState::Init => {
        if self.seed == 0 || self.len == 0 {
          debug!("LFSR degenerate input, nothing to emit");
          self.loop_state = LoopState::Done;
          return Ok(true);
        }
        self.state = self.seed;
        self.samples = 0;
        self.cycles = 0;
        self.buffer.clear();
        self.loop_state = LoopState::Cycling;
        Ok(false)
      },
      LoopState::Cycling => {
        // buffer is owned by the in-flight write
        if self.awaiting.is_some() {
          return Ok(false);
        }
        let produced_all = self.samples == self.len;
        if self.buffer.len() == self.capacity || (produced_all && !self.buffer.is_empty()) {
          self.flush(ctx)?;
          return Ok(false);
        }
        if produced_all {
          debug!("LFSR done, {} samples", self.samples);
          self.loop_state = LoopState::Done;
          return Ok(true);
        }

        self.state = lfsr_shift(self.state);
        if self.cycles == SAMPLE_INTERVAL - 1 {
          self.buffer.push(self.state);
          self.samples += 1;
          self.cycles = 0;
        } else {
          self.cycles += 1;
        }
        Ok(false)
      },
    }
  }

  pub fn complete(&mut self, id: ReqId, _data: &[u8]) -> Result<(), PimError> {
    resume(&mut self.awaiting, id)?;
    self.buffer.clear();
    Ok(())
  }
}

impl Default for Lfsr {
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
  use crate::workload::golden::lfsr_fib;

  /// Run to completion with an SRAM destination; returns (output, steps).
  fn run_to_sram(capacity: usize, seed: u64, len: u64) -> (Vec<u64>, u64) {
    let dec = AddressDecoder::new(vec![
      MemorySegment::new(AccessKind::Func, 0x1000, 0x80),
      MemorySegment::new(AccessKind::Sram, 0x2000, 0x2000),
    ])
    .unwrap();
    let mut sram = Sram::new(0x2000, 0x2000);
    let mut issuer = RequestIssuer::new();
    let mut ctx = StepCtx::new(&dec, &mut sram, &mut issuer, 0);
    let mut f = Lfsr::with_buffer_words(capacity);
    f.start(&[0x2000, seed, len, 0, 0, 0, 0, 0], &mut ctx).unwrap();
    let mut steps = 1;
    while !f.step(&mut ctx).unwrap() {
      steps += 1;
      assert!(steps < 100_000);
    }
    let out = ctx.sram.read_words(0x2000, len as usize).unwrap();
    assert!(issuer.drain().is_empty());
    (out, steps)
  }

  #[test]
  fn test_output_independent_of_buffer_size() {
    let expected = lfsr_fib(0x1010_1010_1010_1010, 50);
    for capacity in [1, 7, 50, 64] {
      let (out, _) = run_to_sram(capacity, 0x1010_1010_1010_1010, 50);
      assert_eq!(out, expected, "buffer of {} words", capacity);
    }
  }

  #[test]
  fn test_degenerate_input_finishes_at_once() {
    let (out, steps) = run_to_sram(64, 0, 4);
    assert_eq!(steps, 1);
    assert_eq!(out, vec![0; 4]);
    let (_, steps) = run_to_sram(64, 99, 0);
    assert_eq!(steps, 1);
  }

  #[test]
  fn test_known_samples() {
    let (out, _) = run_to_sram(64, 0x1010_1010_1010_1010, 4);
    assert_eq!(
      out,
      vec![0x7700_8080_8080_8080, 0x1183_b804_0404_0404, 0xed08_8c1d_c020_2020, 0x84a7_6844_60ee_0101]
    );
    let (out, _) = run_to_sram(5, 0xdead_beef_cafe_f00d, 3);
    assert_eq!(out, vec![0x97fe_f56d_f77e_57f7, 0xa804_bff7_ab6f_bbf2, 0xfd65_4025_ffbd_5b7d]);
  }

  #[test]
  fn test_every_tap_feeds_back() {
    let taps = [5u32, 8, 10, 20, 27, 28, 34, 39, 54, 56, 59];
    for bit in 1..64u32 {
      let expected: u64 = if taps.contains(&bit) { 1 } else { 0 };
      assert_eq!(lfsr_shift(1u64 << bit) >> 63, expected, "bit {}", bit);
    }
  }

  #[test]
  fn test_shift_feedback() {
    // only bit 5 set: feedback bit is 1
    assert_eq!(lfsr_shift(1 << 5), (1 << 4) | (1 << 63));
    // no tap set: plain shift
    assert_eq!(lfsr_shift(1 << 1), 1);
    // two taps cancel
    assert_eq!(lfsr_shift((1 << 5) | (1 << 8)), (1 << 4) | (1 << 7));
  }

  #[test]
  fn test_shift_not_stuck() {
    let mut s = 0xace1u64;
    let first = s;
    for _ in 0..1000 {
      s = lfsr_shift(s);
      assert_ne!(s, 0);
    }
    assert_ne!(s, first);
  }
}
