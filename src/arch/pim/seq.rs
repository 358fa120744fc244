use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Clocked register: `get` returns the value committed at the last step
/// boundary, `set` stages the value for the next one.
///
/// A register may be staged at most once per step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeqReg<T: Copy> {
  q: T,
  d: T,
  driven: bool,
}

impl<T: Copy + Debug> SeqReg<T> {
  pub fn new(init: T) -> Self {
    Self {
      q: init,
      d: init,
      driven: false,
    }
  }

  pub fn get(&self) -> T {
    self.q
  }

  pub fn set(&mut self, value: T) {
    assert!(
      !self.driven,
      "register driven twice in one step ({:?} then {:?})",
      self.d,
      value
    );
    self.d = value;
    self.driven = true;
  }

  /// Step boundary.
  pub fn commit(&mut self) {
    if self.driven {
      self.q = self.d;
      self.driven = false;
    }
  }

  /// Load outside the step, as a memory completion does.
  pub fn latch(&mut self, value: T) {
    self.set(value);
    self.commit();
  }
}

/// Commit every listed register at the end of a step.
#[macro_export]
macro_rules! commit_regs {
  ($($reg:expr),+ $(,)?) => {
    $( $reg.commit(); )+
  };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_visible_after_commit() {
    let mut r = SeqReg::new(1u64);
    r.set(5);
    assert_eq!(r.get(), 1);
    assert!(r.driven);
    r.commit();
    assert_eq!(r.get(), 5);
    assert!(!r.driven);
    r.commit();
    assert_eq!(r.get(), 5);
  }

  #[test]
  fn test_latch() {
    let mut r = SeqReg::new(0u64);
    r.latch(9);
    assert_eq!(r.get(), 9);
    r.set(10);
    r.commit();
    assert_eq!(r.get(), 10);
  }

  #[test]
  #[should_panic(expected = "driven twice")]
  fn test_double_drive_panics() {
    let mut r = SeqReg::new(0u64);
    r.set(1);
    r.set(2);
  }
}
