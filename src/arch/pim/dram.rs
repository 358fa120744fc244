use log::error;
use serde::{Deserialize, Serialize};
use sim::models::model_trait::{DevsModel, Reportable, ReportableModel, SerializableModel};
use sim::models::{ModelMessage, ModelRecord};
use sim::simulator::Services;
use sim::utils::errors::SimulationError;
use std::f64::INFINITY;

use super::decoder::AccessKind;
use super::error::PimError;
use super::mem_port::{DramRequest, DramResponse};
use crate::model_record;

/// Flat byte store covering the DRAM segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DramStore {
  base: u64,
  data: Vec<u8>,
}

impl DramStore {
  pub fn new(base: u64, size: u64) -> Self {
    Self {
      base,
      data: vec![0; size as usize],
    }
  }

  fn offset(&self, addr: u64, num_bytes: usize) -> Result<usize, PimError> {
    let oob = PimError::OutOfBounds {
      region: AccessKind::Dram,
      addr,
      num_bytes,
    };
    let offset = addr.checked_sub(self.base).ok_or(oob.clone())? as usize;
    match offset.checked_add(num_bytes) {
      Some(end) if end <= self.data.len() => Ok(offset),
      _ => Err(oob),
    }
  }

  pub fn read(&self, addr: u64, num_bytes: usize) -> Result<Vec<u8>, PimError> {
    let offset = self.offset(addr, num_bytes)?;
    Ok(self.data[offset..offset + num_bytes].to_vec())
  }

  pub fn write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), PimError> {
    let offset = self.offset(addr, bytes.len())?;
    self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    Ok(())
  }

  /// Perform `req` functionally and build its completion.
  pub fn serve(&mut self, req: &DramRequest) -> Result<DramResponse, PimError> {
    let data = if req.is_write {
      self.write(req.addr, &req.data)?;
      Vec::new()
    } else {
      self.read(req.addr, req.num_bytes)?
    };
    Ok(DramResponse { id: req.id, data })
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InFlight {
  remaining: f64,
  port_name: String,
  content: String,
}

/// DEVS memory model: data moves when a request arrives, the response
/// leaves `latency` time units later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dram {
  store: DramStore,
  dram_req_port: String,
  dram_resp_port: String,
  host_req_port: String,
  host_resp_port: String,
  latency: f64,
  in_flight: Vec<InFlight>,
  records: Vec<ModelRecord>,
}

impl Dram {
  pub fn new(
    base: u64,
    size: u64,
    latency: f64,
    dram_req_port: String,
    dram_resp_port: String,
    host_req_port: String,
    host_resp_port: String,
  ) -> Self {
    Self {
      store: DramStore::new(base, size),
      dram_req_port,
      dram_resp_port,
      host_req_port,
      host_resp_port,
      latency,
      in_flight: Vec::new(),
      records: Vec::new(),
    }
  }
}

impl DevsModel for Dram {
  fn events_ext(&mut self, incoming_message: &ModelMessage, services: &mut Services) -> Result<(), SimulationError> {
    let resp_port = if incoming_message.port_name == self.dram_req_port {
      self.dram_resp_port.clone()
    } else if incoming_message.port_name == self.host_req_port {
      self.host_resp_port.clone()
    } else {
      return Ok(());
    };

    let req = serde_json::from_str::<DramRequest>(&incoming_message.content).map_err(|e| {
      error!("bad DRAM request {:?}: {}", incoming_message.content, e);
      SimulationError::InvalidModelState
    })?;
    let resp = self.store.serve(&req).map_err(|e| {
      error!("DRAM fatal: {}", e);
      SimulationError::InvalidModelState
    })?;

    model_record!(
      self,
      services,
      if req.is_write { "write" } else { "read" },
      format!("from={}, id={}, addr={:#x}, len={}", incoming_message.port_name, req.id, req.addr, req.num_bytes)
    );

    self.in_flight.push(InFlight {
      remaining: self.latency,
      port_name: resp_port,
      content: serde_json::to_string(&resp).map_err(|_| SimulationError::InvalidModelState)?,
    });
    Ok(())
  }

  fn events_int(&mut self, _services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    let (ready, waiting): (Vec<InFlight>, Vec<InFlight>) = self.in_flight.drain(..).partition(|r| r.remaining <= 0.0);
    self.in_flight = waiting;

    Ok(
      ready
        .into_iter()
        .map(|r| ModelMessage {
          content: r.content,
          port_name: r.port_name,
        })
        .collect(),
    )
  }

  fn time_advance(&mut self, time_delta: f64) {
    for r in self.in_flight.iter_mut() {
      r.remaining -= time_delta;
    }
  }

  fn until_next_event(&self) -> f64 {
    self
      .in_flight
      .iter()
      .fold(INFINITY, |min, r| f64::min(min, r.remaining.max(0.0)))
  }
}

impl Reportable for Dram {
  fn status(&self) -> String {
    format!("in_flight={}", self.in_flight.len())
  }

  fn records(&self) -> &Vec<ModelRecord> {
    &self.records
  }
}

impl ReportableModel for Dram {}

impl SerializableModel for Dram {
  fn get_type(&self) -> &'static str {
    "Dram"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_store_serve() {
    let mut store = DramStore::new(0x1000, 0x100);
    let w = store.serve(&DramRequest::write(1, 0x1008, vec![1, 2, 3, 4])).unwrap();
    assert_eq!(w, DramResponse { id: 1, data: vec![] });
    let r = store.serve(&DramRequest::read(2, 0x1006, 6)).unwrap();
    assert_eq!(r.data, vec![0, 0, 1, 2, 3, 4]);
    assert!(store.serve(&DramRequest::read(3, 0x10fc, 8)).is_err());
    assert!(store.read(0x0ff8, 8).is_err());
  }
}
