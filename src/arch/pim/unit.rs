use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::decoder::{AccessKind, AddressDecoder};
use super::error::PimError;
use super::func_ctrl::{FuncCmd, FuncSlot, FuncState};
use super::mem_port::{DramPort, DramRequest, DramResponse, RequestIssuer, StepCtx};
use super::sram::Sram;
use crate::simulator::config::config::PimSection;

/// Pattern written and read back by `self_check`.
pub const SELF_CHECK_PATTERN: u64 = 0xfedc_ba98_7654_3210;
pub const SELF_CHECK_OFFSET: u64 = 64;

/// The accelerator as seen by the host: MMIO registers, a scratchpad and a
/// fixed table of function slots, advanced one step per `clock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PimUnit {
  node: u64,
  decoder: AddressDecoder,
  sram: Sram,
  table_len: usize,
  slots: Vec<FuncSlot>,
  issuer: RequestIssuer,
  cycle: u64,
}

impl PimUnit {
  pub fn new(config: &PimSection) -> Result<Self, PimError> {
    if config.node != 0 {
      return Err(PimError::Config(format!("only node 0 is supported, got {}", config.node)));
    }
    let table_len = config.func_table_len;
    if table_len == 0 || !table_len.is_power_of_two() {
      return Err(PimError::Config(format!("function table length {} is not a power of two", table_len)));
    }
    if config.functions.len() > table_len {
      return Err(PimError::Config(format!(
        "{} functions do not fit in a table of {}",
        config.functions.len(),
        table_len
      )));
    }
    if config.func_base % (table_len as u64 * 8) != 0 {
      return Err(PimError::Config(format!(
        "function base {:#x} is not aligned to the table span",
        config.func_base
      )));
    }

    let decoder = AddressDecoder::new(config.segments())?;
    for kind in [AccessKind::Func, AccessKind::Sram, AccessKind::Dram] {
      decoder.segment(kind).ok_or(PimError::MissingSegment(kind))?;
    }
    let slots = config
      .functions
      .iter()
      .enumerate()
      .map(|(fnum, &kind)| FuncSlot::new(fnum, kind))
      .collect::<Vec<_>>();

    info!(
      "PIM node {}: func={:#x} sram={:#x}+{:#x} dram={:#x}+{:#x}, functions {:?}",
      config.node, config.func_base, config.sram_base, config.sram_size, config.dram_base, config.dram_size, config.functions
    );
    Ok(Self {
      node: config.node,
      decoder,
      sram: Sram::new(config.sram_base, config.sram_size),
      table_len,
      slots,
      issuer: RequestIssuer::new(),
      cycle: 0,
    })
  }

  pub fn node(&self) -> u64 {
    self.node
  }

  pub fn decoder(&self) -> &AddressDecoder {
    &self.decoder
  }

  pub fn sram(&self) -> &Sram {
    &self.sram
  }

  pub fn is_mmio(&self, addr: u64) -> bool {
    self.decoder.decode(addr).is_io
  }

  fn func_index(&self, addr: u64, num_bytes: usize) -> Result<usize, PimError> {
    if addr & 7 != 0 || num_bytes != 8 {
      return Err(PimError::BadFuncAccess { addr, num_bytes });
    }
    let fnum = ((addr >> 3) as usize) & (self.table_len - 1);
    if fnum >= self.slots.len() {
      return Err(PimError::NoSuchFunction(fnum));
    }
    Ok(fnum)
  }

  pub fn read(&self, addr: u64, out: &mut [u8]) -> Result<(), PimError> {
    match self.decoder.decode(addr).kind {
      AccessKind::Sram => self.sram.read(addr, out),
      AccessKind::Func => {
        let fnum = self.func_index(addr, out.len())?;
        out.copy_from_slice(&self.slots[fnum].read().to_le_bytes());
        Ok(())
      },
      AccessKind::Dram => Err(PimError::NotMmio {
        addr,
        kind: AccessKind::Dram,
      }),
      AccessKind::None => Err(PimError::Unmapped { addr }),
    }
  }

  pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), PimError> {
    match self.decoder.decode(addr).kind {
      AccessKind::Sram => self.sram.write(addr, data),
      AccessKind::Func => {
        let fnum = self.func_index(addr, data.len())?;
        let mut word = [0u8; 8];
        word.copy_from_slice(data);
        let value = u64::from_le_bytes(word);
        debug!("mmio write func[{}] <- {:#x}", fnum, value);

        if self.slots[fnum].state() == FuncState::Ready && value == FuncCmd::Run.code() {
          if let Some(running) = self.running() {
            return Err(PimError::Busy { fnum, running });
          }
        }
        let mut ctx = StepCtx::new(&self.decoder, &mut self.sram, &mut self.issuer, fnum);
        self.slots[fnum].write(value, &mut ctx)
      },
      AccessKind::Dram => Err(PimError::NotMmio {
        addr,
        kind: AccessKind::Dram,
      }),
      AccessKind::None => Err(PimError::Unmapped { addr }),
    }
  }

  pub fn read_u64(&self, addr: u64) -> Result<u64, PimError> {
    let mut buf = [0u8; 8];
    self.read(addr, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
  }

  pub fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), PimError> {
    self.write(addr, &value.to_le_bytes())
  }

  /// One host clock tick: advances the running function by one step.
  pub fn clock(&mut self, cycle: u64) -> Result<(), PimError> {
    self.cycle = cycle;
    if let Some(fnum) = self.running() {
      let mut ctx = StepCtx::new(&self.decoder, &mut self.sram, &mut self.issuer, fnum);
      if self.slots[fnum].clock(&mut ctx)? {
        info!("func[{}] {} done at cycle {}", fnum, self.slots[fnum].kind(), cycle);
      }
    }
    Ok(())
  }

  /// Completion of an earlier `DramRequest`, routed back to its issuer.
  pub fn complete(&mut self, resp: DramResponse) -> Result<(), PimError> {
    let fnum = self.issuer.owner(resp.id)?;
    debug!("func[{}] dram completion id={} len={}", fnum, resp.id, resp.data.len());
    self.slots[fnum].complete(resp.id, &resp.data)?;
    self.issuer.retire(resp.id).map(|_| ())
  }

  pub fn take_requests(&mut self) -> Vec<DramRequest> {
    self.issuer.drain()
  }

  pub fn flush_requests(&mut self, port: &mut dyn DramPort) -> Result<(), PimError> {
    self.issuer.drain().into_iter().try_for_each(|req| port.issue(req))
  }

  pub fn func_state(&self, fnum: usize) -> Option<FuncState> {
    self.slots.get(fnum).map(|s| s.state())
  }

  pub fn running(&self) -> Option<usize> {
    self.slots.iter().position(|s| s.state() == FuncState::Running)
  }

  pub fn outstanding(&self) -> usize {
    self.issuer.in_flight()
  }

  pub fn is_busy(&self) -> bool {
    self.running().is_some() || self.outstanding() > 0
  }

  /// Scratchpad sanity check run at setup; leaves the SRAM unchanged.
  pub fn self_check(&mut self) -> Result<(), PimError> {
    let addr = self.sram.base() + SELF_CHECK_OFFSET;
    let saved = self.sram.read_u64(addr)?;
    self.write_u64(addr, SELF_CHECK_PATTERN)?;
    let got = self.read_u64(addr)?;
    self.sram.write_u64(addr, saved)?;
    if got != SELF_CHECK_PATTERN {
      return Err(PimError::SelfCheck {
        got,
        expected: SELF_CHECK_PATTERN,
      });
    }
    debug!("SRAM self-check passed at {:#x}", addr);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::pim::functions::FuncKind;

  fn unit() -> PimUnit {
    PimUnit::new(&PimSection::default()).unwrap()
  }

  fn func_addr(fnum: u64) -> u64 {
    PimSection::default().func_base + fnum * 8
  }

  #[test]
  fn test_func_register_access_rules() {
    let mut u = unit();
    assert_eq!(u.read_u64(func_addr(0)).unwrap(), 0);
    let mut four = [0u8; 4];
    assert!(matches!(u.read(func_addr(0), &mut four), Err(PimError::BadFuncAccess { .. })));
    assert!(matches!(u.write(func_addr(0) + 4, &[0; 8]), Err(PimError::BadFuncAccess { .. })));
    assert!(matches!(u.write_u64(func_addr(7), 0), Err(PimError::NoSuchFunction(7))));
  }

  #[test]
  fn test_sram_any_width() {
    let mut u = unit();
    let base = u.sram().base();
    u.write(base + 3, &[1, 2, 3]).unwrap();
    let mut out = [0u8; 5];
    u.read(base + 2, &mut out).unwrap();
    assert_eq!(out, [0, 1, 2, 3, 0]);
    let end = base + u.sram().size();
    assert!(u.write(end - 2, &[0; 4]).is_err());
  }

  #[test]
  fn test_non_mmio_rejected() {
    let mut u = unit();
    let dram = u.decoder().segment(AccessKind::Dram).unwrap().base;
    assert!(!u.is_mmio(dram));
    assert!(u.is_mmio(func_addr(0)));
    assert!(matches!(u.write_u64(dram, 1), Err(PimError::NotMmio { .. })));
    assert!(matches!(u.read_u64(0x10), Err(PimError::Unmapped { .. })));
  }

  #[test]
  fn test_second_start_refused() {
    let mut u = unit();
    let sram = u.sram().base();
    let dram = u.decoder().segment(AccessKind::Dram).unwrap().base;
    for (fnum, params) in [(0u64, [dram, sram + 0x100, 64]), (1, [sram + 0x800, 1, 4])] {
      u.write_u64(func_addr(fnum), FuncCmd::Init.code()).unwrap();
      for i in 0..8 {
        u.write_u64(func_addr(fnum), params.get(i).copied().unwrap_or(0)).unwrap();
      }
    }
    u.write_u64(func_addr(0), FuncCmd::Run.code()).unwrap();
    assert_eq!(u.running(), Some(0));
    assert_eq!(
      u.write_u64(func_addr(1), FuncCmd::Run.code()),
      Err(PimError::Busy { fnum: 1, running: 0 })
    );
    assert_eq!(u.func_state(1), Some(FuncState::Ready));
  }

  #[test]
  fn test_unknown_completion() {
    let mut u = unit();
    let resp = DramResponse { id: 42, data: vec![] };
    assert_eq!(u.complete(resp), Err(PimError::UnknownRequest(42)));
  }

  #[test]
  fn test_rejected_completion_stays_outstanding() {
    let mut u = unit();
    let sram = u.sram().base();
    let dram = u.decoder().segment(AccessKind::Dram).unwrap().base;
    u.write_u64(func_addr(0), FuncCmd::Init.code()).unwrap();
    for p in [sram + 0x100, dram, 8, 0, 0, 0, 0, 0] {
      u.write_u64(func_addr(0), p).unwrap();
    }
    u.write_u64(func_addr(0), FuncCmd::Run.code()).unwrap();
    u.clock(1).unwrap();
    let real = u.take_requests().remove(0);

    // known to the issuer, never awaited by the copy
    let stray = u.issuer.issue_read(0, dram, 8);
    assert_eq!(u.outstanding(), 2);
    let resp = DramResponse { id: stray, data: vec![0; 8] };
    assert_eq!(u.complete(resp), Err(PimError::UnknownRequest(stray)));
    assert_eq!(u.outstanding(), 2);

    u.complete(DramResponse { id: real.id, data: vec![5; 8] }).unwrap();
    assert_eq!(u.outstanding(), 1);
  }

  #[test]
  fn test_self_check_preserves_sram() {
    let mut u = unit();
    let addr = u.sram().base() + SELF_CHECK_OFFSET;
    u.write_u64(addr, 77).unwrap();
    u.self_check().unwrap();
    assert_eq!(u.read_u64(addr).unwrap(), 77);
  }

  #[test]
  fn test_config_errors() {
    let mut cfg = PimSection::default();
    cfg.func_table_len = 12;
    assert!(PimUnit::new(&cfg).is_err());

    let mut cfg = PimSection::default();
    cfg.functions = vec![FuncKind::MemCopy; 17];
    assert!(PimUnit::new(&cfg).is_err());

    let mut cfg = PimSection::default();
    cfg.sram_base = cfg.func_base + 8;
    assert!(matches!(PimUnit::new(&cfg), Err(PimError::OverlappingSegment { .. })));

    let mut cfg = PimSection::default();
    cfg.dram_base += 4;
    assert!(matches!(PimUnit::new(&cfg), Err(PimError::MisalignedSegment { .. })));
  }
}
