use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::{park, resume, Awaiting, Params, MAX_BURST_WORDS};
use crate::arch::pim::decoder::AccessKind;
use crate::arch::pim::error::PimError;
use crate::arch::pim::mem_port::{ReqId, StepCtx};
use crate::arch::pim::seq::SeqReg;
use crate::arch::pim::sram::bytes_to_words;
use crate::commit_regs;

/// Set in a score word while the vertex is in the open set.
pub const IN_OPEN_SET: u64 = 1 << 63;
pub const SCORE_MASK: u64 = 0xFFFF_FFFF;
pub const INF_SCORE: u64 = SCORE_MASK;
/// Matrix entry for "no edge".
pub const NO_EDGE: u64 = u64::MAX;
/// Return code location, relative to the SRAM base.
pub const RETURN_CODE_OFFSET: u64 = 0;
pub const PATH_FOUND: u64 = 0;
pub const PATH_NOT_FOUND: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum SearchState {
  Idle,
  Init,
  PopOpenSet,
  Cycle,
  Cleanup,
  Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum DmaState {
  Idle,
  Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Pending {
  CacheFill { base: u64, len: u64 },
  CameFrom,
}

/// Shortest path search over a dense distance matrix in DRAM.
///
/// Params: `p0` came_from array, `p1` distance matrix, `p2` source,
/// `p3` target, `p4` vertex count, `p5` score table in SRAM.
///
/// Every vertex owns one packed score word in the table. With a zero
/// heuristic the f-score equals the g-score, so one word holds both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AStar {
  came_from: u64,
  dist: u64,
  src: u64,
  target: u64,
  vertices: u64,
  score_base: u64,
  ret_addr: u64,
  awaiting: Option<Awaiting<Pending>>,
  cache: Vec<u64>,

  state: SeqReg<SearchState>,
  dma_state: SeqReg<DmaState>,
  curr: SeqReg<u64>,
  neighbor: SeqReg<u64>,
  cache_base: SeqReg<u64>,
  cache_len: SeqReg<u64>,
  ret_code: SeqReg<u64>,
}

impl AStar {
  pub fn new() -> Self {
    Self {
      came_from: 0,
      dist: 0,
      src: 0,
      target: 0,
      vertices: 0,
      score_base: 0,
      ret_addr: 0,
      awaiting: None,
      cache: Vec::with_capacity(MAX_BURST_WORDS),
      state: SeqReg::new(SearchState::Idle),
      dma_state: SeqReg::new(DmaState::Idle),
      curr: SeqReg::new(0),
      neighbor: SeqReg::new(0),
      cache_base: SeqReg::new(0),
      cache_len: SeqReg::new(0),
      ret_code: SeqReg::new(PATH_NOT_FOUND),
    }
  }

  fn bad(what: &'static str, value: u64) -> PimError {
    PimError::BadOperand {
      func: "AStar",
      what,
      value,
    }
  }

  pub fn start(&mut self, params: &Params, ctx: &mut StepCtx) -> Result<(), PimError> {
    let (came_from, dist, src, target, n, score_base) = (params[0], params[1], params[2], params[3], params[4], params[5]);
    if n == 0 || n > u32::MAX as u64 {
      return Err(Self::bad("vertex count", n));
    }
    if src >= n {
      return Err(Self::bad("source", src));
    }
    if target >= n {
      return Err(Self::bad("target", target));
    }

    let dram = ctx.decoder.segment(AccessKind::Dram).ok_or(PimError::MissingSegment(AccessKind::Dram))?;
    if !dram.contains_range(came_from, n * 8) {
      return Err(Self::bad("came_from", came_from));
    }
    if !dram.contains_range(dist, n * n * 8) {
      return Err(Self::bad("distance matrix", dist));
    }
    let sram = ctx.decoder.segment(AccessKind::Sram).ok_or(PimError::MissingSegment(AccessKind::Sram))?;
    let ret_addr = sram.base + RETURN_CODE_OFFSET;
    let ret_word_clear = score_base >= ret_addr + 8 || score_base + n * 8 <= ret_addr;
    if !sram.contains_range(score_base, n * 8) || !ret_word_clear {
      return Err(Self::bad("score table", score_base));
    }

    self.came_from = came_from;
    self.dist = dist;
    self.src = src;
    self.target = target;
    self.vertices = n;
    self.score_base = score_base;
    self.ret_addr = ret_addr;
    self.awaiting = None;
    self.cache.clear();

    self.state.latch(SearchState::Init);
    self.dma_state.latch(DmaState::Idle);
    self.curr.latch(src);
    self.neighbor.latch(0);
    self.cache_base.latch(0);
    self.cache_len.latch(0);
    self.ret_code.latch(PATH_NOT_FOUND);
    info!("AStar start n={} src={} target={}", n, src, target);
    Ok(())
  }

  fn score_addr(&self, v: u64) -> u64 {
    self.score_base + v * 8
  }

  fn write_came_from(&mut self, ctx: &mut StepCtx, v: u64, pred: u64) {
    let id = ctx.issue_write(self.came_from + v * 8, pred.to_le_bytes().to_vec());
    park(&mut self.awaiting, id, Pending::CameFrom);
    self.dma_state.set(DmaState::Wait);
  }

  fn init(&mut self, ctx: &mut StepCtx) -> Result<(), PimError> {
    let mut table = vec![pack_score(false, INF_SCORE); self.vertices as usize];
    table[self.src as usize] = pack_score(true, 0);
    ctx.sram.write_words(self.score_base, &table)?;
    let src = self.src;
    self.write_came_from(ctx, src, src);
    self.state.set(SearchState::PopOpenSet);
    Ok(())
  }

  fn pop_open_set(&mut self, ctx: &mut StepCtx) -> Result<(), PimError> {
    let table = ctx.sram.read_words(self.score_base, self.vertices as usize)?;
    let mut best: Option<(u64, u64)> = None;
    for (v, &word) in table.iter().enumerate() {
      if word & IN_OPEN_SET == 0 {
        continue;
      }
      let score = word & SCORE_MASK;
      if best.map_or(true, |(_, s)| score < s) {
        best = Some((v as u64, score));
      }
    }

    match best {
      None => {
        debug!("AStar open set empty");
        self.ret_code.set(PATH_NOT_FOUND);
        self.state.set(SearchState::Cleanup);
      },
      Some((v, score)) => {
        trace!("AStar pop vertex {} score {}", v, score);
        ctx.sram.write_u64(self.score_addr(v), table[v as usize] & !IN_OPEN_SET)?;
        if v == self.target {
          debug!("AStar reached target {}", v);
          self.ret_code.set(PATH_FOUND);
          self.state.set(SearchState::Cleanup);
        } else {
          self.curr.set(v);
          self.neighbor.set(0);
          self.state.set(SearchState::Cycle);
        }
      },
    }
    Ok(())
  }

  fn cycle(&mut self, ctx: &mut StepCtx) -> Result<(), PimError> {
    let (curr, nb, n) = (self.curr.get(), self.neighbor.get(), self.vertices);
    if nb == n {
      self.state.set(SearchState::PopOpenSet);
      return Ok(());
    }
    if nb == curr {
      self.neighbor.set(nb + 1);
      return Ok(());
    }

    let idx = curr * n + nb;
    let base = self.cache_base.get();
    if idx < base || idx >= base + self.cache_len.get() {
      let len = (n * n - idx).min(MAX_BURST_WORDS as u64);
      trace!("AStar refill cache at edge {} ({} words)", idx, len);
      let id = ctx.issue_read(self.dist + idx * 8, len as usize * 8);
      park(&mut self.awaiting, id, Pending::CacheFill { base: idx, len });
      self.dma_state.set(DmaState::Wait);
      return Ok(());
    }

    let edge = self.cache[(idx - base) as usize];
    if edge != NO_EDGE {
      let curr_score = ctx.sram.read_u64(self.score_addr(curr))? & SCORE_MASK;
      let nb_score = ctx.sram.read_u64(self.score_addr(nb))? & SCORE_MASK;
      let tentative = curr_score.saturating_add(edge);
      if tentative < nb_score {
        trace!("AStar improve {} via {}: {} -> {}", nb, curr, nb_score, tentative);
        ctx.sram.write_u64(self.score_addr(nb), IN_OPEN_SET | tentative)?;
        self.write_came_from(ctx, nb, curr);
      }
    }
    self.neighbor.set(nb + 1);
    Ok(())
  }

  pub fn step(&mut self, ctx: &mut StepCtx) -> Result<bool, PimError> {
    if self.dma_state.get() == DmaState::Wait {
      return Ok(false);
    }
    let mut finished = false;
    match self.state.get() {
      SearchState::Idle | SearchState::Done => {},
      SearchState::Init => self.init(ctx)?,
      SearchState::PopOpenSet => self.pop_open_set(ctx)?,
      SearchState::Cycle => self.cycle(ctx)?,
      SearchState::Cleanup => {
        ctx.sram.write_u64(self.ret_addr, self.ret_code.get())?;
        info!("AStar done, return code {}", self.ret_code.get());
        self.state.set(SearchState::Done);
        finished = true;
      },
    }
    commit_regs!(
      self.state,
      self.dma_state,
      self.curr,
      self.neighbor,
      self.cache_base,
      self.cache_len,
      self.ret_code,
    );
    Ok(finished)
  }

  pub fn complete(&mut self, id: ReqId, data: &[u8]) -> Result<(), PimError> {
    match resume(&mut self.awaiting, id)? {
      Pending::CacheFill { base, len } => {
        assert_eq!(data.len() as u64, len * 8, "short distance matrix read");
        self.cache = bytes_to_words(data);
        self.cache_base.latch(base);
        self.cache_len.latch(len);
      },
      Pending::CameFrom => {},
    }
    self.dma_state.latch(DmaState::Idle);
    Ok(())
  }
}

impl Default for AStar {
  fn default() -> Self {
    Self::new()
  }
}

/// Score table word.
pub fn pack_score(in_open_set: bool, score: u64) -> u64 {
  let flag = if in_open_set { IN_OPEN_SET } else { 0 };
  flag | (score & SCORE_MASK)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pack_score() {
    assert_eq!(pack_score(true, 0), IN_OPEN_SET);
    assert_eq!(pack_score(false, INF_SCORE), 0xFFFF_FFFF);
    assert_eq!(pack_score(true, 10) & SCORE_MASK, 10);
    assert_ne!(pack_score(true, 10) & IN_OPEN_SET, 0);
  }
}
