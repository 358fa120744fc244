use log::debug;

use crate::arch::pim::error::PimError;
use crate::arch::pim::func_ctrl::{FuncCmd, FuncState};
use crate::arch::pim::functions::NUM_FUNC_PARAMS;
use crate::arch::pim::sram::{bytes_to_words, words_to_bytes};
use crate::simulator::config::config::PimSection;

/// What a workload needs from whatever sits between it and the PIM unit.
///
/// `mem_read`/`mem_write` route like the memory controller does: PIM
/// registers and the scratchpad go to the unit, everything else to DRAM.
pub trait PimHost {
  fn layout(&self) -> &PimSection;

  fn mem_write(&mut self, addr: u64, data: &[u8]) -> Result<(), PimError>;

  fn mem_read(&mut self, addr: u64, num_bytes: usize) -> Result<Vec<u8>, PimError>;

  /// Let one clock tick elapse.
  fn advance(&mut self) -> Result<(), PimError>;

  fn cycle(&self) -> u64;

  /// Tick budget for one function invocation.
  fn max_cycles(&self) -> u64;

  fn mmio_write(&mut self, addr: u64, value: u64) -> Result<(), PimError> {
    self.mem_write(addr, &value.to_le_bytes())
  }

  fn mmio_read(&mut self, addr: u64) -> Result<u64, PimError> {
    let bytes = self.mem_read(addr, 8)?;
    bytes_to_words(&bytes)
      .first()
      .copied()
      .ok_or_else(|| PimError::Host(format!("short read at {:#x}", addr)))
  }

  fn write_words(&mut self, addr: u64, words: &[u64]) -> Result<(), PimError> {
    self.mem_write(addr, &words_to_bytes(words))
  }

  fn read_words(&mut self, addr: u64, count: usize) -> Result<Vec<u64>, PimError> {
    Ok(bytes_to_words(&self.mem_read(addr, count * 8)?))
  }
}

/// INIT followed by the full parameter block, unused params zero.
pub fn init_function<H: PimHost + ?Sized>(host: &mut H, fnum: usize, params: &[u64]) -> Result<(), PimError> {
  if params.len() > NUM_FUNC_PARAMS {
    return Err(PimError::Host(format!(
      "{} params given, functions take {}",
      params.len(),
      NUM_FUNC_PARAMS
    )));
  }
  let addr = host.layout().func_addr(fnum);
  host.mmio_write(addr, FuncCmd::Init.code())?;
  for i in 0..NUM_FUNC_PARAMS {
    host.mmio_write(addr, params.get(i).copied().unwrap_or(0))?;
  }
  Ok(())
}

pub fn run_function<H: PimHost + ?Sized>(host: &mut H, fnum: usize) -> Result<(), PimError> {
  let addr = host.layout().func_addr(fnum);
  host.mmio_write(addr, FuncCmd::Run.code())
}

/// Poll the control register until Done; returns the ticks spent.
pub fn finish_function<H: PimHost + ?Sized>(host: &mut H, fnum: usize) -> Result<u64, PimError> {
  let addr = host.layout().func_addr(fnum);
  let start = host.cycle();
  loop {
    let code = host.mmio_read(addr)?;
    match FuncState::from_code(code) {
      Some(FuncState::Done) => {
        let cycles = host.cycle() - start;
        debug!("func[{}] finished after {} cycles", fnum, cycles);
        return Ok(cycles);
      },
      Some(FuncState::Running) => {
        if host.cycle() - start >= host.max_cycles() {
          return Err(PimError::Host(format!(
            "function {} still running after {} cycles",
            fnum,
            host.max_cycles()
          )));
        }
        host.advance()?;
      },
      other => {
        return Err(PimError::Host(format!(
          "function {} polled in state {:?} (code {})",
          fnum, other, code
        )))
      },
    }
  }
}

/// Full INIT / params / RUN / poll sequence.
pub fn invoke<H: PimHost + ?Sized>(host: &mut H, fnum: usize, params: &[u64]) -> Result<u64, PimError> {
  init_function(host, fnum, params)?;
  run_function(host, fnum)?;
  finish_function(host, fnum)
}
