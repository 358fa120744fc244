use sim::models::{Model, Reportable};
use sim::simulator::Simulation;

use crate::workload::WorkloadReport;

pub fn print_simulation_records(simulation: &mut Simulation) {
  println!("\n--- Simulation Records ---");

  for model in simulation.models().iter() {
    print_model_records(model);
  }

  println!("--- End Records ---\n");
}

fn print_model_records(model: &Model) {
  let records = model.records();
  if records.is_empty() {
    return;
  }
  println!("\n[{}] {}", model.id(), model.status());
  for record in records {
    println!("  Time {:.1}: {} {}", record.time, record.action, record.subject);
  }
}

pub fn print_workload_summary(reports: &[WorkloadReport]) {
  println!("\n--- Workloads ---");
  println!("{:<18} {:>8} {:>10}  {}", "workload", "slot", "cycles", "result");
  for r in reports {
    let result = if r.passed() { "PASS".to_string() } else { format!("FAIL ({})", r.mismatches.len()) };
    println!("{:<18} {:>8} {:>10}  {}", r.kind.to_string(), r.fnum, r.cycles, result);
    for m in r.mismatches.iter().take(8) {
      println!("    {}", m);
    }
  }
  println!("--- End Workloads ---\n");
}
