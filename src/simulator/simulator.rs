use log::{info, warn};
use serde::Serialize;
use sim::simulator::Simulation;
use std::fs::File;
use std::io::{self, BufWriter, Result};

use super::config::config::{AppConfig, PimSection};
use super::sim::inject::inject_host_message;
use super::sim::mode::{SimConfig, StepMode};
use super::sim::model::{is_idle, model_step, HostMessage};
use super::sim::shell::{Command, Shell};
use super::utils::log::{is_log_enabled, set_log};
use super::utils::report::{print_simulation_records, print_workload_summary};
use crate::arch::pim::backend::{MmioRequest, MmioResponse};
use crate::arch::pim::decoder::{AccessKind, AddressDecoder};
use crate::arch::pim::error::PimError;
use crate::arch::pim::main::{
  create_simulation, DRAM_ID, HOST_REQ_PORT, HOST_RESP_PORT, MMIO_REQ_PORT, MMIO_RESP_PORT, PIM_ID,
};
use crate::arch::pim::mem_port::{DramRequest, DramResponse};
use crate::workload::{run_workload, PimHost, WorkloadKind, WorkloadReport};

/// Steps allowed for a host request to be answered.
const MAX_TRANSACTION_STEPS: usize = 10_000;

/// Drives the event simulation from the host side: every memory access is a
/// message into the model graph, every reply comes back as one.
pub struct Simulator {
  config: SimConfig,
  layout: PimSection,
  decoder: AddressDecoder,
  simulation: Simulation,
  trace_writer: Option<BufWriter<File>>,
  shell: Option<Shell>,
  steps_left: u32,
  next_req_id: u64,
}

fn sim_error(e: io::Error) -> PimError {
  PimError::Host(e.to_string())
}

impl Simulator {
  pub fn new(app: &AppConfig) -> Result<Self> {
    let config = SimConfig::from_app(app);
    let decoder = AddressDecoder::new(app.pim.segments())?;
    let simulation = create_simulation(app)?;

    let trace_writer = match &config.trace_file {
      Some(path) => Some(BufWriter::new(File::create(path)?)),
      None => None,
    };
    let shell = match config.step_mode {
      StepMode::Step => Some(Shell::new()?),
      StepMode::Continuous => None,
    };

    Ok(Self {
      config,
      layout: app.pim.clone(),
      decoder,
      simulation,
      trace_writer,
      shell,
      steps_left: 0,
      next_req_id: 0,
    })
  }

  pub fn simulation_mut(&mut self) -> &mut Simulation {
    &mut self.simulation
  }

  /// Run each workload in turn and print the summary.
  pub fn run(&mut self, workloads: &[WorkloadKind]) -> Result<Vec<WorkloadReport>> {
    if self.config.quiet {
      set_log(false);
    }
    if self.shell.is_some() {
      println!("Step mode - Enter to step, 'si N' to step N times, 'c' to continue, 'q' to quit");
    }

    let mut reports = Vec::new();
    for &kind in workloads {
      info!("workload {} start at t={:.1}", kind, self.simulation.get_global_time());
      let report = run_workload(self, kind)?;
      if !report.passed() {
        warn!("workload {} failed with {} mismatches", kind, report.mismatches.len());
      }
      reports.push(report);
    }

    print_workload_summary(&reports);
    if is_log_enabled() {
      print_simulation_records(&mut self.simulation);
    }
    Ok(reports)
  }

  /// Hold the step until the user lets it through.
  fn gate(&mut self) -> std::result::Result<(), PimError> {
    let Some(shell) = self.shell.as_mut() else {
      return Ok(());
    };
    if self.steps_left == 0 {
      match shell.read_command().map_err(sim_error)? {
        Command::Step(n) => self.steps_left = n,
        Command::Continue => {
          self.shell = None;
          return Ok(());
        },
        Command::Quit => return Err(PimError::Host("stopped by user".to_string())),
      }
    }
    self.steps_left -= 1;
    Ok(())
  }

  fn step(&mut self) -> std::result::Result<Vec<HostMessage>, PimError> {
    self.gate()?;
    model_step(&mut self.simulation, &mut self.trace_writer).map_err(sim_error)
  }

  /// Send `request` to `target:port` and step until the reply on `reply_port` arrives.
  fn transact<T: Serialize>(
    &mut self,
    target: &str,
    port: &str,
    reply_port: &str,
    request: &T,
  ) -> std::result::Result<String, PimError> {
    let content = serde_json::to_string(request).map_err(|e| PimError::Host(e.to_string()))?;
    inject_host_message(&mut self.simulation, target, port, content);
    for _ in 0..MAX_TRANSACTION_STEPS {
      let replies = self.step()?;
      if let Some(reply) = replies.into_iter().find(|m| m.source == target && m.port == reply_port) {
        return Ok(reply.content);
      }
    }
    Err(PimError::Host(format!("no reply from {} after {} steps", target, MAX_TRANSACTION_STEPS)))
  }

  fn mmio(&mut self, req: MmioRequest) -> std::result::Result<Vec<u8>, PimError> {
    let reply = self.transact(PIM_ID, MMIO_REQ_PORT, MMIO_RESP_PORT, &req)?;
    let resp: MmioResponse = serde_json::from_str(&reply).map_err(|e| PimError::Host(e.to_string()))?;
    Ok(resp.data)
  }

  fn dram(&mut self, req: DramRequest) -> std::result::Result<Vec<u8>, PimError> {
    let reply = self.transact(DRAM_ID, HOST_REQ_PORT, HOST_RESP_PORT, &req)?;
    let resp: DramResponse = serde_json::from_str(&reply).map_err(|e| PimError::Host(e.to_string()))?;
    Ok(resp.data)
  }

  fn alloc_id(&mut self) -> u64 {
    let id = self.next_req_id;
    self.next_req_id += 1;
    id
  }
}

impl PimHost for Simulator {
  fn layout(&self) -> &PimSection {
    &self.layout
  }

  fn mem_write(&mut self, addr: u64, data: &[u8]) -> std::result::Result<(), PimError> {
    match self.decoder.decode(addr).kind {
      AccessKind::Sram | AccessKind::Func => self
        .mmio(MmioRequest {
          addr,
          is_write: true,
          data: data.to_vec(),
        })
        .map(|_| ()),
      AccessKind::Dram => {
        let id = self.alloc_id();
        self.dram(DramRequest::write(id, addr, data.to_vec())).map(|_| ())
      },
      AccessKind::None => Err(PimError::Unmapped { addr }),
    }
  }

  fn mem_read(&mut self, addr: u64, num_bytes: usize) -> std::result::Result<Vec<u8>, PimError> {
    match self.decoder.decode(addr).kind {
      AccessKind::Sram | AccessKind::Func => self.mmio(MmioRequest {
        addr,
        is_write: false,
        data: vec![0; num_bytes],
      }),
      AccessKind::Dram => {
        let id = self.alloc_id();
        self.dram(DramRequest::read(id, addr, num_bytes))
      },
      AccessKind::None => Err(PimError::Unmapped { addr }),
    }
  }

  /// Step until simulated time moves forward.
  fn advance(&mut self) -> std::result::Result<(), PimError> {
    let t0 = self.simulation.get_global_time();
    for _ in 0..MAX_TRANSACTION_STEPS {
      if is_idle(&mut self.simulation) {
        return Err(PimError::Host(format!("simulation idle at t={:.1}", t0)));
      }
      self.step()?;
      if self.simulation.get_global_time() > t0 {
        return Ok(());
      }
    }
    Err(PimError::Host(format!("time stuck at t={:.1}", t0)))
  }

  fn cycle(&self) -> u64 {
    self.simulation.get_global_time() as u64
  }

  fn max_cycles(&self) -> u64 {
    self.config.max_cycles
  }
}
