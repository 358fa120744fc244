use log::info;
use sim::models::Model;
use sim::simulator::{Connector, Simulation};

use super::backend::PimBackend;
use super::dram::Dram;
use super::error::PimError;
use super::unit::PimUnit;
use crate::simulator::config::config::AppConfig;

/// Id the host uses as source and sink of its messages.
pub const HOST_ID: &str = "host";
pub const PIM_ID: &str = "pim";
pub const DRAM_ID: &str = "dram";

pub const MMIO_REQ_PORT: &str = "mmio_req";
pub const MMIO_RESP_PORT: &str = "mmio_resp";
pub const HOST_REQ_PORT: &str = "host_req";
pub const HOST_RESP_PORT: &str = "host_resp";

pub fn create_simulation(config: &AppConfig) -> Result<Simulation, PimError> {
  let mut unit = PimUnit::new(&config.pim)?;
  unit.self_check()?;
  info!(
    "node {} passed self check, dram latency {} cycles",
    unit.node(),
    config.dram.latency
  );

  let models = vec![
    Model::new(
      String::from(PIM_ID),
      Box::new(PimBackend::new(
        unit,
        String::from(MMIO_REQ_PORT),
        String::from(MMIO_RESP_PORT),
        String::from("dram_req"),
        String::from("dram_resp"),
      )),
    ),
    Model::new(
      String::from(DRAM_ID),
      Box::new(Dram::new(
        config.pim.dram_base,
        config.pim.dram_size,
        config.dram.latency as f64,
        String::from("pim_req"),
        String::from("pim_resp"),
        String::from(HOST_REQ_PORT),
        String::from(HOST_RESP_PORT),
      )),
    ),
  ];

  let connectors = vec![
    // pim <-> dram request/completion loop
    Connector::new(
      String::from("pim_dram_req"),
      String::from(PIM_ID),
      String::from(DRAM_ID),
      String::from("dram_req"),
      String::from("pim_req"),
    ),
    Connector::new(
      String::from("dram_pim_resp"),
      String::from(DRAM_ID),
      String::from(PIM_ID),
      String::from("pim_resp"),
      String::from("dram_resp"),
    ),
    // replies to the host
    Connector::new(
      String::from("pim_host_resp"),
      String::from(PIM_ID),
      String::from(HOST_ID),
      String::from(MMIO_RESP_PORT),
      String::from(MMIO_RESP_PORT),
    ),
    Connector::new(
      String::from("dram_host_resp"),
      String::from(DRAM_ID),
      String::from(HOST_ID),
      String::from(HOST_RESP_PORT),
      String::from(HOST_RESP_PORT),
    ),
  ];

  Ok(Simulation::post(models, connectors))
}
