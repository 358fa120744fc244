//! Host-side reference implementations the device output is checked against.

/// 64-bit Fibonacci LFSR, x^59 + x^56 + x^54 + x^39 + x^34 + x^28 + x^27 +
/// x^20 + x^10 + x^8 + x^5 + 1, state captured every 13th shift.
pub fn lfsr_fib(seed: u64, len: usize) -> Vec<u64> {
  let mut out = Vec::with_capacity(len);
  if seed == 0 {
    return out;
  }
  let mut lfsr = seed;
  let mut cycles = 0u32;
  while out.len() < len {
    let bit = ((lfsr >> 5)
      ^ (lfsr >> 8)
      ^ (lfsr >> 10)
      ^ (lfsr >> 20)
      ^ (lfsr >> 27)
      ^ (lfsr >> 28)
      ^ (lfsr >> 34)
      ^ (lfsr >> 39)
      ^ (lfsr >> 54)
      ^ (lfsr >> 56)
      ^ (lfsr >> 59))
      & 1;
    lfsr = (lfsr >> 1) | (bit << 63);

    let sample = cycles == 12;
    cycles += 1;
    if sample {
      out.push(lfsr);
      cycles = 0;
    }
  }
  out
}

/// Number of significant bits, counted by shifting.
fn bit_length(mut v: u32) -> u32 {
  let mut bits = 0;
  while v != 0 {
    v >>= 1;
    bits += 1;
  }
  bits
}

/// Row-major n*n matrix. Only the upper triangle is computed, then mirrored.
pub fn symmetric_distance_matrix(rand: &[u64], dist_mask: u64) -> Vec<u64> {
  let n = rand.len();
  // 29 - clz32(n) == bit_length(n) - 3
  let prob_mask: u64 = (1u64 << bit_length(n as u32).saturating_sub(3)) - 1;
  let mut out = vec![0; n * n];
  for r in 0..n {
    for c in r + 1..n {
      let x = rand[r] ^ rand[c];
      let (msb, lsb) = (x >> 32, x & 0xFFFF_FFFF);
      let cell = if msb & prob_mask == prob_mask { lsb & dist_mask } else { u64::MAX };
      out[r * n + c] = cell;
      out[c * n + r] = cell;
    }
  }
  out
}

/// Result of a shortest path search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
  pub found: bool,
  /// Predecessor of each vertex, `None` where never written.
  pub came_from: Vec<Option<u64>>,
}

impl PathResult {
  /// Vertices from `src` to `target`, if the predecessor chain reaches `src`.
  pub fn path(&self, src: u64, target: u64) -> Option<Vec<u64>> {
    let mut path = vec![target];
    let mut v = target;
    while v != src {
      v = self.came_from.get(v as usize).copied().flatten()?;
      if path.len() > self.came_from.len() {
        return None;
      }
      path.push(v);
    }
    path.reverse();
    Some(path)
  }
}

/// Dijkstra with lowest-index tie break, stopping when `target` is popped.
pub fn a_star(dist: &[u64], n: usize, src: usize, target: usize) -> PathResult {
  const INF: u64 = 0xFFFF_FFFF;
  let mut g = vec![INF; n];
  let mut open = vec![false; n];
  let mut came_from = vec![None; n];
  g[src] = 0;
  open[src] = true;
  came_from[src] = Some(src as u64);

  loop {
    let curr = (0..n).filter(|&v| open[v]).fold(None, |best: Option<usize>, v| match best {
      Some(b) if g[b] <= g[v] => Some(b),
      _ => Some(v),
    });
    let Some(curr) = curr else {
      return PathResult { found: false, came_from };
    };
    open[curr] = false;
    if curr == target {
      return PathResult { found: true, came_from };
    }
    for nb in 0..n {
      let edge = dist[curr * n + nb];
      if nb == curr || edge == u64::MAX {
        continue;
      }
      let tentative = g[curr].saturating_add(edge);
      if tentative < g[nb] {
        g[nb] = tentative;
        came_from[nb] = Some(curr as u64);
        open[nb] = true;
      }
    }
  }
}
