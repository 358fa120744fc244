use sim::simulator::{Message, Simulation};

use crate::arch::pim::main::HOST_ID;

/// Deliver `content` from the host to `target_model:port` at the current time.
///
/// The host has no model of its own, so the source port mirrors the target
/// port; traces then show the same name on both ends.
pub fn inject_host_message(simulation: &mut Simulation, target_model: &str, port: &str, content: String) {
  let now = simulation.get_global_time();
  simulation.inject_input(Message::new(
    HOST_ID.to_string(),
    port.to_string(),
    target_model.to_string(),
    port.to_string(),
    now,
    content,
  ));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::pim::main::{create_simulation, DRAM_ID, HOST_REQ_PORT, HOST_RESP_PORT};
  use crate::arch::pim::mem_port::{DramRequest, DramResponse};
  use crate::simulator::config::config::AppConfig;

  #[test]
  fn test_host_read_reaches_dram() {
    let config = AppConfig::default();
    let mut simulation = create_simulation(&config).unwrap();
    let req = DramRequest::read(7, config.pim.dram_base, 8);
    inject_host_message(&mut simulation, DRAM_ID, HOST_REQ_PORT, serde_json::to_string(&req).unwrap());

    let mut reply = None;
    for _ in 0..20 {
      let messages = simulation.step().unwrap();
      if let Some(m) = messages.iter().find(|m| m.target_port() == HOST_RESP_PORT) {
        reply = Some(m.content().to_string());
        break;
      }
    }
    let resp: DramResponse = serde_json::from_str(&reply.unwrap()).unwrap();
    assert_eq!(resp.id, 7);
    assert_eq!(resp.data, vec![0; 8]);
  }
}
