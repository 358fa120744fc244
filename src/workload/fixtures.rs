//! 4-vertex distance matrices; `MAX` marks a missing edge.

const MAX: u64 = u64::MAX;

pub const NO_NEIGHBORS_4: [u64; 16] = [
  0, MAX, MAX, MAX, //
  MAX, 0, MAX, MAX, //
  MAX, MAX, 0, MAX, //
  MAX, MAX, MAX, 0,
];

pub const NO_PATH_4: [u64; 16] = [
  0, 10, MAX, MAX, //
  10, 0, 5, MAX, //
  MAX, 5, 0, MAX, //
  MAX, MAX, MAX, 0,
];

/// 0 -> 1 -> 2 -> 3
pub const ONE_PATH_4: [u64; 16] = [
  0, 10, MAX, MAX, //
  10, 0, 5, MAX, //
  MAX, 5, 0, 5, //
  MAX, MAX, 5, 0,
];

/// 0 -> 2 -> 3
pub const TWO_PATH_4: [u64; 16] = [
  0, 10, 5, MAX, //
  10, 0, 5, MAX, //
  5, 5, 0, 5, //
  MAX, MAX, 5, 0,
];
