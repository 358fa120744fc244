use log::{debug, log_enabled, Level};
use sim::models::model_trait::DevsModel;
use sim::simulator::Simulation;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::arch::pim::main::HOST_ID;

/// Message delivered to the host by the last step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMessage {
  pub source: String,
  pub port: String,
  pub content: String,
}

/// Smallest time until any model's next internal event.
pub fn until_next_event(simulation: &mut Simulation) -> f64 {
  simulation
    .models()
    .iter()
    .fold(f64::INFINITY, |min, model| f64::min(min, model.until_next_event()))
}

/// Nothing queued and every model passive.
pub fn is_idle(simulation: &mut Simulation) -> bool {
  simulation.get_messages().is_empty() && until_next_event(simulation) == f64::INFINITY
}

/// Run one simulation step, tracing the messages it routes, and return the
/// messages it produced for the host.
pub fn model_step(simulation: &mut Simulation, trace_writer: &mut Option<BufWriter<File>>) -> io::Result<Vec<HostMessage>> {
  let messages_to_process = simulation.get_messages();

  if log_enabled!(Level::Debug) {
    for msg in messages_to_process.iter() {
      debug!(
        "[MSG] t={:.1} {}:{} -> {}:{} | {}",
        msg.time(),
        msg.source_id(),
        msg.source_port(),
        msg.target_id(),
        msg.target_port(),
        msg.content()
      );
    }
  }

  if let Some(writer) = trace_writer {
    for msg in messages_to_process.iter() {
      let trace_entry = serde_json::json!({
        "time": msg.time(),
        "source": msg.source_id(),
        "source_port": msg.source_port(),
        "target": msg.target_id(),
        "target_port": msg.target_port(),
        "content": msg.content()
      });
      writeln!(writer, "{}", trace_entry)?;
    }
    writer.flush()?;
  }

  if let Err(e) = simulation.step() {
    return Err(io::Error::new(io::ErrorKind::Other, format!("Simulation error: {:?}", e)));
  }

  Ok(
    simulation
      .get_messages()
      .iter()
      .filter(|msg| msg.target_id() == HOST_ID)
      .map(|msg| HostMessage {
        source: msg.source_id().to_string(),
        port: msg.target_port().to_string(),
        content: msg.content().to_string(),
      })
      .collect(),
  )
}
