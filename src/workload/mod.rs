//! Synthetic host workloads: stage inputs, run a PIM function, check the
//! result against the host-side reference.

pub mod driver;
pub mod fixtures;
pub mod golden;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::arch::pim::error::PimError;
use crate::arch::pim::functions::astar::{PATH_FOUND, PATH_NOT_FOUND, RETURN_CODE_OFFSET};
use crate::arch::pim::functions::FuncKind;
pub use driver::{finish_function, init_function, invoke, run_function, PimHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
  MemCopy,
  Lfsr,
  DistanceMatrix,
  #[serde(rename = "astar")]
  AStar,
}

impl WorkloadKind {
  pub const ALL: [WorkloadKind; 4] = [
    WorkloadKind::MemCopy,
    WorkloadKind::Lfsr,
    WorkloadKind::DistanceMatrix,
    WorkloadKind::AStar,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      WorkloadKind::MemCopy => "mem_copy",
      WorkloadKind::Lfsr => "lfsr",
      WorkloadKind::DistanceMatrix => "distance_matrix",
      WorkloadKind::AStar => "astar",
    }
  }

  pub fn func_kind(&self) -> FuncKind {
    match self {
      WorkloadKind::MemCopy => FuncKind::MemCopy,
      WorkloadKind::Lfsr => FuncKind::Lfsr,
      WorkloadKind::DistanceMatrix => FuncKind::SymmetricDistanceMatrix,
      WorkloadKind::AStar => FuncKind::AStar,
    }
  }
}

impl fmt::Display for WorkloadKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for WorkloadKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    WorkloadKind::ALL
      .iter()
      .copied()
      .find(|k| k.name() == s.to_lowercase())
      .ok_or_else(|| format!("unknown workload '{}'", s))
  }
}

#[derive(Debug, Clone)]
pub struct WorkloadReport {
  pub kind: WorkloadKind,
  pub fnum: usize,
  pub cycles: u64,
  pub mismatches: Vec<String>,
}

impl WorkloadReport {
  pub fn passed(&self) -> bool {
    self.mismatches.is_empty()
  }
}

fn compare(what: &str, expected: &[u64], got: &[u64]) -> Vec<String> {
  let mut out = Vec::new();
  if expected.len() != got.len() {
    out.push(format!("{}: length {} != {}", what, got.len(), expected.len()));
  }
  for (i, (e, g)) in expected.iter().zip(got).enumerate() {
    if e != g {
      out.push(format!("{}[{}] = {:#x}, expected {:#x}", what, i, g, e));
    }
  }
  out
}

fn slot<H: PimHost + ?Sized>(host: &H, kind: FuncKind) -> Result<usize, PimError> {
  host
    .layout()
    .slot_of(kind)
    .ok_or_else(|| PimError::Host(format!("no slot bound to {}", kind)))
}

pub const MEM_COPY_WORDS: usize = 100;
pub const LFSR_SEED: u64 = 0x1010_1010_1010_1010;
pub const LFSR_SAMPLES: usize = 100;
pub const MATRIX_VERTICES: usize = 16;
pub const MATRIX_DIST_MASK: u64 = 0xF;

/// Round trip SRAM -> DRAM -> DRAM -> SRAM of a word pattern, more than
/// one burst long.
pub fn mem_copy<H: PimHost + ?Sized>(host: &mut H) -> Result<WorkloadReport, PimError> {
  let fnum = slot(host, FuncKind::MemCopy)?;
  let (sram, dram) = (host.layout().sram_base, host.layout().dram_base);
  let bytes = (MEM_COPY_WORDS * 8) as u64;
  let pattern: Vec<u64> = (0..MEM_COPY_WORDS as u64).map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ i).collect();

  let src = sram + 0x1000;
  let dram_a = dram + 0x1000;
  let dram_b = dram + 0x4000;
  let dst = sram + 0x4000;
  host.write_words(src, &pattern)?;

  let mut cycles = 0;
  for (to, from) in [(dram_a, src), (dram_b, dram_a), (dst, dram_b)] {
    cycles += invoke(host, fnum, &[to, from, bytes])?;
  }

  let mut mismatches = compare("dram", &pattern, &host.read_words(dram_b, MEM_COPY_WORDS)?);
  mismatches.extend(compare("sram", &pattern, &host.read_words(dst, MEM_COPY_WORDS)?));
  Ok(WorkloadReport {
    kind: WorkloadKind::MemCopy,
    fnum,
    cycles,
    mismatches,
  })
}

pub fn lfsr<H: PimHost + ?Sized>(host: &mut H) -> Result<WorkloadReport, PimError> {
  let fnum = slot(host, FuncKind::Lfsr)?;
  let out = host.layout().dram_base + 0x8000;
  let cycles = invoke(host, fnum, &[out, LFSR_SEED, LFSR_SAMPLES as u64])?;
  let expected = golden::lfsr_fib(LFSR_SEED, LFSR_SAMPLES);
  let mismatches = compare("lfsr_out", &expected, &host.read_words(out, LFSR_SAMPLES)?);
  Ok(WorkloadReport {
    kind: WorkloadKind::Lfsr,
    fnum,
    cycles,
    mismatches,
  })
}

pub fn distance_matrix<H: PimHost + ?Sized>(host: &mut H) -> Result<WorkloadReport, PimError> {
  let fnum = slot(host, FuncKind::SymmetricDistanceMatrix)?;
  let n = MATRIX_VERTICES;
  let rand_base = host.layout().sram_base + 0x800;
  let matrix = host.layout().dram_base + 0x10000;
  let rand = golden::lfsr_fib(LFSR_SEED, n);
  host.write_words(rand_base, &rand)?;

  let cycles = invoke(host, fnum, &[matrix, rand_base, MATRIX_DIST_MASK, n as u64])?;
  let expected = golden::symmetric_distance_matrix(&rand, MATRIX_DIST_MASK);
  let mismatches = compare("matrix", &expected, &host.read_words(matrix, n * n)?);
  Ok(WorkloadReport {
    kind: WorkloadKind::DistanceMatrix,
    fnum,
    cycles,
    mismatches,
  })
}

/// Device-side outcome of one shortest path search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AStarRun {
  pub return_code: u64,
  pub came_from: Vec<u64>,
  pub cycles: u64,
}

/// Stage `dist` in DRAM, search from `src` to `target` and collect results.
pub fn run_astar<H: PimHost + ?Sized>(
  host: &mut H,
  dist: &[u64],
  n: usize,
  src: u64,
  target: u64,
) -> Result<AStarRun, PimError> {
  let fnum = slot(host, FuncKind::AStar)?;
  let dram = host.layout().dram_base + 0x20000;
  let dist_base = dram;
  let came_from = dram + (n * n * 8) as u64;
  let score_base = host.layout().sram_base + 0x100;
  let ret_addr = host.layout().sram_base + RETURN_CODE_OFFSET;

  host.write_words(dist_base, dist)?;
  // sentinel so unwritten predecessors are recognisable
  host.write_words(came_from, &vec![u64::MAX; n])?;
  host.write_words(ret_addr, &[u64::MAX])?;

  let cycles = invoke(host, fnum, &[came_from, dist_base, src, target, n as u64, score_base])?;
  Ok(AStarRun {
    return_code: host.read_words(ret_addr, 1)?[0],
    came_from: host.read_words(came_from, n)?,
    cycles,
  })
}

pub fn astar<H: PimHost + ?Sized>(host: &mut H) -> Result<WorkloadReport, PimError> {
  let fnum = slot(host, FuncKind::AStar)?;
  let (src, target) = (0u64, 3u64);
  let run = run_astar(host, &fixtures::TWO_PATH_4, 4, src, target)?;
  let expected = golden::a_star(&fixtures::TWO_PATH_4, 4, src as usize, target as usize);

  let mut mismatches = Vec::new();
  let want_code = if expected.found { PATH_FOUND } else { PATH_NOT_FOUND };
  if run.return_code != want_code {
    mismatches.push(format!("return code {}, expected {}", run.return_code, want_code));
  }
  // only the path itself is guaranteed
  if let Some(path) = expected.path(src, target) {
    for pair in path.windows(2) {
      let got = run.came_from[pair[1] as usize];
      if got != pair[0] {
        mismatches.push(format!("came_from[{}] = {}, expected {}", pair[1], got, pair[0]));
      }
    }
  }
  Ok(WorkloadReport {
    kind: WorkloadKind::AStar,
    fnum,
    cycles: run.cycles,
    mismatches,
  })
}

pub fn run_workload<H: PimHost + ?Sized>(host: &mut H, kind: WorkloadKind) -> Result<WorkloadReport, PimError> {
  match kind {
    WorkloadKind::MemCopy => mem_copy(host),
    WorkloadKind::Lfsr => lfsr(host),
    WorkloadKind::DistanceMatrix => distance_matrix(host),
    WorkloadKind::AStar => astar(host),
  }
}
