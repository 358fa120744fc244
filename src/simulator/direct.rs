use log::debug;
use std::collections::VecDeque;

use crate::arch::pim::decoder::AccessKind;
use crate::arch::pim::dram::DramStore;
use crate::arch::pim::error::PimError;
use crate::arch::pim::mem_port::{DramPort, DramRequest, DramResponse};
use crate::arch::pim::unit::PimUnit;
use crate::simulator::config::config::{AppConfig, PimSection};
use crate::workload::PimHost;

/// DRAM answering every request a fixed number of ticks after it was issued.
#[derive(Debug, Clone)]
pub struct LatencyMemory {
  store: DramStore,
  latency: u64,
  now: u64,
  in_flight: VecDeque<(u64, DramResponse)>,
}

impl LatencyMemory {
  pub fn new(base: u64, size: u64, latency: u64) -> Self {
    Self {
      store: DramStore::new(base, size),
      latency: latency.max(1),
      now: 0,
      in_flight: VecDeque::new(),
    }
  }

  pub fn store(&self) -> &DramStore {
    &self.store
  }

  /// Completions due at or before `now`, in issue order.
  fn due(&mut self, now: u64) -> Vec<DramResponse> {
    let mut out = Vec::new();
    while self.in_flight.front().map_or(false, |(ready, _)| *ready <= now) {
      if let Some((_, resp)) = self.in_flight.pop_front() {
        out.push(resp);
      }
    }
    out
  }
}

impl DramPort for LatencyMemory {
  fn issue(&mut self, req: DramRequest) -> Result<(), PimError> {
    let resp = self.store.serve(&req)?;
    self.in_flight.push_back((self.now + self.latency, resp));
    Ok(())
  }
}

/// Host harness that clocks a `PimUnit` directly, without the event kernel.
#[derive(Debug, Clone)]
pub struct DirectHost {
  layout: PimSection,
  unit: PimUnit,
  memory: LatencyMemory,
  cycle: u64,
  max_cycles: u64,
}

impl DirectHost {
  pub fn new(config: &AppConfig) -> Result<Self, PimError> {
    let mut unit = PimUnit::new(&config.pim)?;
    unit.self_check()?;
    Ok(Self {
      layout: config.pim.clone(),
      unit,
      memory: LatencyMemory::new(config.pim.dram_base, config.pim.dram_size, config.dram.latency),
      cycle: 0,
      max_cycles: config.simulation.max_cycles,
    })
  }

  pub fn unit(&self) -> &PimUnit {
    &self.unit
  }

  pub fn memory(&self) -> &LatencyMemory {
    &self.memory
  }

  /// One clock: step the unit, hand its requests to memory, deliver due completions.
  pub fn tick(&mut self) -> Result<(), PimError> {
    self.cycle += 1;
    self.unit.clock(self.cycle)?;
    self.memory.now = self.cycle;
    self.unit.flush_requests(&mut self.memory)?;
    for resp in self.memory.due(self.cycle) {
      self.unit.complete(resp)?;
    }
    Ok(())
  }

  /// Tick until no function runs and no request is in flight.
  pub fn run_until_idle(&mut self) -> Result<u64, PimError> {
    let start = self.cycle;
    while self.unit.is_busy() {
      if self.cycle - start >= self.max_cycles {
        return Err(PimError::Host(format!("unit still busy after {} cycles", self.max_cycles)));
      }
      self.tick()?;
    }
    debug!("unit idle after {} cycles", self.cycle - start);
    Ok(self.cycle - start)
  }
}

impl PimHost for DirectHost {
  fn layout(&self) -> &PimSection {
    &self.layout
  }

  fn mem_write(&mut self, addr: u64, data: &[u8]) -> Result<(), PimError> {
    match self.unit.decoder().decode(addr).kind {
      AccessKind::Sram | AccessKind::Func => self.unit.write(addr, data),
      AccessKind::Dram => self.memory.store.write(addr, data),
      AccessKind::None => Err(PimError::Unmapped { addr }),
    }
  }

  fn mem_read(&mut self, addr: u64, num_bytes: usize) -> Result<Vec<u8>, PimError> {
    match self.unit.decoder().decode(addr).kind {
      AccessKind::Sram | AccessKind::Func => {
        let mut out = vec![0u8; num_bytes];
        self.unit.read(addr, &mut out)?;
        Ok(out)
      },
      AccessKind::Dram => self.memory.store.read(addr, num_bytes),
      AccessKind::None => Err(PimError::Unmapped { addr }),
    }
  }

  fn advance(&mut self) -> Result<(), PimError> {
    self.tick()
  }

  fn cycle(&self) -> u64 {
    self.cycle
  }

  fn max_cycles(&self) -> u64 {
    self.max_cycles
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_latency_memory_delays_completion() {
    let mut mem = LatencyMemory::new(0x1000, 0x100, 3);
    mem.now = 10;
    mem.issue(DramRequest::write(1, 0x1000, vec![9; 8])).unwrap();
    mem.now = 11;
    mem.issue(DramRequest::read(2, 0x1000, 8)).unwrap();
    assert!(mem.due(12).is_empty());
    assert_eq!(mem.due(13).len(), 1);
    let reads = mem.due(20);
    assert_eq!(reads, vec![DramResponse { id: 2, data: vec![9; 8] }]);
  }

  #[test]
  fn test_host_routes_by_region() {
    let mut host = DirectHost::new(&AppConfig::default()).unwrap();
    let (sram, dram) = (host.layout().sram_base, host.layout().dram_base);
    host.write_words(sram + 8, &[11]).unwrap();
    host.write_words(dram + 8, &[22]).unwrap();
    assert_eq!(host.unit().sram().read_u64(sram + 8).unwrap(), 11);
    assert_eq!(host.memory().store().read(dram + 8, 8).unwrap(), 22u64.to_le_bytes().to_vec());
    assert!(host.mem_write(0x10, &[0]).is_err());
  }
}
