use log::error;
use serde::{Deserialize, Serialize};
use sim::models::model_trait::{DevsModel, Reportable, ReportableModel, SerializableModel};
use sim::models::{ModelMessage, ModelRecord};
use sim::simulator::Services;
use sim::utils::errors::SimulationError;
use std::f64::INFINITY;

use super::error::PimError;
use super::mem_port::DramResponse;
use super::unit::PimUnit;
use crate::model_record;

/// Host MMIO access; `data` is the payload for writes and is zero-filled
/// to the access width for reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MmioRequest {
  pub addr: u64,
  pub is_write: bool,
  pub data: Vec<u8>,
}

/// Reply to an `MmioRequest`: read data, or empty for a write ack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MmioResponse {
  pub addr: u64,
  pub data: Vec<u8>,
}

fn fatal(e: PimError) -> SimulationError {
  error!("PIM fatal: {}", e);
  SimulationError::InvalidModelState
}

/// DEVS wrapper around `PimUnit`: answers MMIO at once and clocks the unit
/// every time unit while a function runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PimBackend {
  unit: PimUnit,
  mmio_req_port: String,
  mmio_resp_port: String,
  dram_req_port: String,
  dram_resp_port: String,
  mmio_responses: Vec<MmioResponse>,
  cycle: u64,
  next_tick: f64,
  records: Vec<ModelRecord>,
}

impl PimBackend {
  pub fn new(
    unit: PimUnit,
    mmio_req_port: String,
    mmio_resp_port: String,
    dram_req_port: String,
    dram_resp_port: String,
  ) -> Self {
    Self {
      unit,
      mmio_req_port,
      mmio_resp_port,
      dram_req_port,
      dram_resp_port,
      mmio_responses: Vec::new(),
      cycle: 0,
      next_tick: INFINITY,
      records: Vec::new(),
    }
  }

  fn arm_clock(&mut self) {
    if self.unit.running().is_some() && self.next_tick == INFINITY {
      self.next_tick = 1.0;
    }
  }

  fn handle_mmio(&mut self, req: MmioRequest, services: &mut Services) -> Result<(), SimulationError> {
    let data = if req.is_write {
      self.unit.write(req.addr, &req.data).map_err(fatal)?;
      model_record!(self, services, "mmio_write", format!("addr={:#x}, len={}", req.addr, req.data.len()));
      Vec::new()
    } else {
      let mut out = vec![0u8; req.data.len()];
      self.unit.read(req.addr, &mut out).map_err(fatal)?;
      out
    };
    self.mmio_responses.push(MmioResponse { addr: req.addr, data });
    self.arm_clock();
    Ok(())
  }
}

impl DevsModel for PimBackend {
  fn events_ext(&mut self, incoming_message: &ModelMessage, services: &mut Services) -> Result<(), SimulationError> {
    if incoming_message.port_name == self.mmio_req_port {
      let req = serde_json::from_str::<MmioRequest>(&incoming_message.content).map_err(|e| {
        error!("bad MMIO request {:?}: {}", incoming_message.content, e);
        SimulationError::InvalidModelState
      })?;
      return self.handle_mmio(req, services);
    }

    if incoming_message.port_name == self.dram_resp_port {
      let resp = serde_json::from_str::<DramResponse>(&incoming_message.content).map_err(|e| {
        error!("bad DRAM response {:?}: {}", incoming_message.content, e);
        SimulationError::InvalidModelState
      })?;
      model_record!(self, services, "dram_complete", format!("id={}", resp.id));
      self.unit.complete(resp).map_err(fatal)?;
    }

    Ok(())
  }

  fn events_int(&mut self, services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    let mut messages = Vec::new();

    for resp in self.mmio_responses.drain(..) {
      messages.push(ModelMessage {
        content: serde_json::to_string(&resp).map_err(|_| SimulationError::InvalidModelState)?,
        port_name: self.mmio_resp_port.clone(),
      });
    }

    if self.next_tick <= 0.0 {
      self.cycle += 1;
      let was_running = self.unit.running();
      self.unit.clock(self.cycle).map_err(fatal)?;
      if let (Some(fnum), None) = (was_running, self.unit.running()) {
        model_record!(self, services, "func_done", format!("fnum={}, cycle={}", fnum, self.cycle));
      }

      for req in self.unit.take_requests() {
        model_record!(
          self,
          services,
          if req.is_write { "dram_write" } else { "dram_read" },
          format!("id={}, addr={:#x}, len={}", req.id, req.addr, req.num_bytes)
        );
        messages.push(ModelMessage {
          content: serde_json::to_string(&req).map_err(|_| SimulationError::InvalidModelState)?,
          port_name: self.dram_req_port.clone(),
        });
      }

      self.next_tick = if self.unit.running().is_some() { 1.0 } else { INFINITY };
    }

    Ok(messages)
  }

  fn time_advance(&mut self, time_delta: f64) {
    self.next_tick -= time_delta;
  }

  fn until_next_event(&self) -> f64 {
    if !self.mmio_responses.is_empty() {
      return 0.0;
    }
    self.next_tick
  }
}

impl Reportable for PimBackend {
  fn status(&self) -> String {
    match self.unit.running() {
      Some(fnum) => format!("running func {} at cycle {}", fnum, self.cycle),
      None => format!("idle at cycle {}", self.cycle),
    }
  }

  fn records(&self) -> &Vec<ModelRecord> {
    &self.records
  }
}

impl ReportableModel for PimBackend {}

impl SerializableModel for PimBackend {
  fn get_type(&self) -> &'static str {
    "PimBackend"
  }
}
