use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::decoder::AccessKind;
use super::error::PimError;

/// Byte-addressable scratchpad mapped at `base`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sram {
  base: u64,
  data: Vec<u8>,
}

impl Sram {
  pub fn new(base: u64, size: u64) -> Self {
    Self {
      base,
      data: vec![0; size as usize],
    }
  }

  pub fn base(&self) -> u64 {
    self.base
  }

  pub fn size(&self) -> u64 {
    self.data.len() as u64
  }

  fn range(&self, addr: u64, num_bytes: usize) -> Result<Range<usize>, PimError> {
    let oob = PimError::OutOfBounds {
      region: AccessKind::Sram,
      addr,
      num_bytes,
    };
    let offset = addr.checked_sub(self.base).ok_or(oob.clone())? as usize;
    let end = offset.checked_add(num_bytes).ok_or(oob.clone())?;
    if end > self.data.len() {
      return Err(oob);
    }
    Ok(offset..end)
  }

  pub fn read(&self, addr: u64, out: &mut [u8]) -> Result<(), PimError> {
    let range = self.range(addr, out.len())?;
    out.copy_from_slice(&self.data[range]);
    Ok(())
  }

  pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), PimError> {
    let range = self.range(addr, data.len())?;
    self.data[range].copy_from_slice(data);
    Ok(())
  }

  pub fn read_u64(&self, addr: u64) -> Result<u64, PimError> {
    let mut buf = [0u8; 8];
    self.read(addr, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
  }

  pub fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), PimError> {
    self.write(addr, &value.to_le_bytes())
  }

  pub fn read_words(&self, addr: u64, count: usize) -> Result<Vec<u64>, PimError> {
    let range = self.range(addr, count * 8)?;
    Ok(bytes_to_words(&self.data[range]))
  }

  pub fn write_words(&mut self, addr: u64, words: &[u64]) -> Result<(), PimError> {
    self.write(addr, &words_to_bytes(words))
  }
}

/// Little-endian packing used for every word moved over the memory interface.
pub fn words_to_bytes(words: &[u64]) -> Vec<u8> {
  words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

pub fn bytes_to_words(bytes: &[u8]) -> Vec<u64> {
  bytes
    .chunks_exact(8)
    .map(|chunk| {
      let mut word = [0u8; 8];
      word.copy_from_slice(chunk);
      u64::from_le_bytes(word)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_byte_and_word_access() {
    let mut sram = Sram::new(0x1000, 64);
    sram.write_u64(0x1008, 0x1122_3344_5566_7788).unwrap();
    let mut byte = [0u8; 1];
    sram.read(0x1008, &mut byte).unwrap();
    assert_eq!(byte[0], 0x88);
    sram.write(0x100f, &[0xaa]).unwrap();
    assert_eq!(sram.read_u64(0x1008).unwrap(), 0xaa22_3344_5566_7788);
    sram.write_words(0x1010, &[1, 2, 3]).unwrap();
    assert_eq!(sram.read_words(0x1010, 3).unwrap(), vec![1, 2, 3]);
  }

  #[test]
  fn test_bounds() {
    let mut sram = Sram::new(0x1000, 64);
    assert!(sram.read_u64(0x0ff8).is_err());
    assert!(sram.read_u64(0x1038).is_ok());
    assert!(sram.read_u64(0x103c).is_err());
    assert!(sram.write(0x1040, &[0]).is_err());
    assert!(sram.write_words(0x1000, &[0; 9]).is_err());
  }
}
