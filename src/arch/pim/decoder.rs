use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::PimError;

/// Region an address falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
  None,
  Sram,
  Dram,
  Func,
}

impl AccessKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      AccessKind::None => "none",
      AccessKind::Sram => "sram",
      AccessKind::Dram => "dram",
      AccessKind::Func => "func",
    }
  }
}

impl fmt::Display for AccessKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySegment {
  pub kind: AccessKind,
  pub base: u64,
  pub size: u64,
}

impl MemorySegment {
  pub fn new(kind: AccessKind, base: u64, size: u64) -> Self {
    Self { kind, base, size }
  }

  /// One past the last byte of the segment.
  pub fn top(&self) -> u64 {
    self.base.saturating_add(self.size)
  }

  pub fn contains(&self, addr: u64) -> bool {
    addr >= self.base && addr < self.top()
  }

  /// Whether `[addr, addr + num_bytes)` lies entirely inside the segment.
  pub fn contains_range(&self, addr: u64, num_bytes: u64) -> bool {
    match addr.checked_add(num_bytes) {
      Some(end) => addr >= self.base && end <= self.top(),
      None => false,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeInfo {
  pub is_io: bool,
  pub is_dram: bool,
  pub kind: AccessKind,
}

impl DecodeInfo {
  fn from_kind(kind: AccessKind) -> Self {
    Self {
      is_io: matches!(kind, AccessKind::Sram | AccessKind::Func),
      is_dram: kind == AccessKind::Dram,
      kind,
    }
  }
}

/// Ordered list of disjoint, 8-byte aligned segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressDecoder {
  segments: Vec<MemorySegment>,
}

impl AddressDecoder {
  pub fn new(segments: Vec<MemorySegment>) -> Result<Self, PimError> {
    let mut prev_top: Option<u64> = None;
    for seg in &segments {
      if seg.kind == AccessKind::None {
        return Err(PimError::Config(format!("segment at {:#x} has no kind", seg.base)));
      }
      if seg.base & 7 != 0 || seg.size & 7 != 0 {
        return Err(PimError::MisalignedSegment {
          kind: seg.kind,
          base: seg.base,
          size: seg.size,
        });
      }
      if seg.size == 0 || seg.base.checked_add(seg.size).is_none() {
        return Err(PimError::Config(format!(
          "{} segment at {:#x} has invalid size {:#x}",
          seg.kind, seg.base, seg.size
        )));
      }
      if let Some(top) = prev_top {
        if seg.base < top {
          return Err(PimError::OverlappingSegment {
            kind: seg.kind,
            base: seg.base,
            prev_top: top,
          });
        }
      }
      prev_top = Some(seg.top());
    }
    Ok(Self { segments })
  }

  pub fn decode(&self, addr: u64) -> DecodeInfo {
    let kind = self
      .segments
      .iter()
      .find(|seg| seg.contains(addr))
      .map(|seg| seg.kind)
      .unwrap_or(AccessKind::None);
    DecodeInfo::from_kind(kind)
  }

  pub fn segment(&self, kind: AccessKind) -> Option<&MemorySegment> {
    self.segments.iter().find(|seg| seg.kind == kind)
  }

  pub fn segments(&self) -> &[MemorySegment] {
    &self.segments
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn layout() -> AddressDecoder {
    AddressDecoder::new(vec![
      MemorySegment::new(AccessKind::Func, 0x1000, 0x80),
      MemorySegment::new(AccessKind::Sram, 0x2000, 0x1000),
      MemorySegment::new(AccessKind::Dram, 0x4000, 0x4000),
    ])
    .unwrap()
  }

  #[test]
  fn test_decode_regions() {
    let dec = layout();
    assert_eq!(dec.decode(0).kind, AccessKind::None);
    assert_eq!(dec.decode(0xfff).kind, AccessKind::None);
    assert_eq!(dec.decode(0x1000).kind, AccessKind::Func);
    assert_eq!(dec.decode(0x107f).kind, AccessKind::Func);
    assert_eq!(dec.decode(0x1080).kind, AccessKind::None);
    assert_eq!(dec.decode(0x2abc).kind, AccessKind::Sram);
    assert_eq!(dec.decode(0x7fff).kind, AccessKind::Dram);
    assert_eq!(dec.decode(0x8000).kind, AccessKind::None);
    assert_eq!(dec.decode(u64::MAX).kind, AccessKind::None);
  }

  #[test]
  fn test_decode_flags() {
    let dec = layout();
    let func = dec.decode(0x1008);
    assert!(func.is_io && !func.is_dram);
    let sram = dec.decode(0x2000);
    assert!(sram.is_io && !sram.is_dram);
    let dram = dec.decode(0x4000);
    assert!(!dram.is_io && dram.is_dram);
    let none = dec.decode(0x9000);
    assert!(!none.is_io && !none.is_dram);
  }

  #[test]
  fn test_every_address_has_one_kind() {
    let dec = layout();
    for addr in (0..0x9000u64).step_by(4) {
      let hits = dec.segments().iter().filter(|s| s.contains(addr)).count();
      assert!(hits <= 1);
      assert_eq!(hits == 0, dec.decode(addr).kind == AccessKind::None);
    }
  }

  #[test]
  fn test_misaligned_segment() {
    let err = AddressDecoder::new(vec![MemorySegment::new(AccessKind::Sram, 0x1004, 0x100)]).unwrap_err();
    assert!(matches!(err, PimError::MisalignedSegment { .. }));
    let err = AddressDecoder::new(vec![MemorySegment::new(AccessKind::Sram, 0x1000, 0x101)]).unwrap_err();
    assert!(matches!(err, PimError::MisalignedSegment { .. }));
  }

  #[test]
  fn test_overlapping_segment() {
    let err = AddressDecoder::new(vec![
      MemorySegment::new(AccessKind::Func, 0x1000, 0x100),
      MemorySegment::new(AccessKind::Sram, 0x1080, 0x100),
    ])
    .unwrap_err();
    assert!(matches!(err, PimError::OverlappingSegment { .. }));

    let err = AddressDecoder::new(vec![
      MemorySegment::new(AccessKind::Sram, 0x2000, 0x100),
      MemorySegment::new(AccessKind::Func, 0x1000, 0x100),
    ])
    .unwrap_err();
    assert!(matches!(err, PimError::OverlappingSegment { .. }));
  }

  #[test]
  fn test_adjacent_segments_allowed() {
    let dec = AddressDecoder::new(vec![
      MemorySegment::new(AccessKind::Func, 0x1000, 0x100),
      MemorySegment::new(AccessKind::Sram, 0x1100, 0x100),
    ])
    .unwrap();
    assert_eq!(dec.decode(0x10ff).kind, AccessKind::Func);
    assert_eq!(dec.decode(0x1100).kind, AccessKind::Sram);
  }
}
