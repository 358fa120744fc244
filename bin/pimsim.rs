use clap::Parser;
use pimsim::simulator::config::config::load_and_merge_configs;
use pimsim::simulator::utils::log::init_log;
use pimsim::simulator::Simulator;
use pimsim::workload::WorkloadKind;
use std::path::PathBuf;

/// pimsim - functional simulator of a memory-mapped PIM accelerator
#[derive(Parser, Debug)]
#[command(name = "pimsim")]
#[command(version = "0.1.0")]
#[command(about = "Runs PIM function workloads on a discrete-event model of the unit", long_about = None)]
struct Args {
  /// Config file merged over the built-in defaults
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Enable step mode (interactive stepping)
  #[arg(short, long)]
  step: bool,

  /// Quiet mode (warnings and errors only)
  #[arg(short, long)]
  quiet: bool,

  /// Output trace file path
  #[arg(long, value_name = "FILE")]
  trace_file: Option<String>,

  /// Workload to run, repeatable: mem_copy, lfsr, distance_matrix, astar
  #[arg(short, long, value_name = "NAME")]
  workload: Vec<WorkloadKind>,

  /// DRAM response latency in time units
  #[arg(long, value_name = "N")]
  latency: Option<u64>,

  /// Tick budget for one function invocation
  #[arg(long, value_name = "N")]
  max_cycles: Option<u64>,
}

fn main() -> std::io::Result<()> {
  init_log();

  let args = Args::parse();

  let config = load_and_merge_configs(
    args.config.as_deref(),
    args.quiet,
    args.step,
    args.trace_file.as_deref(),
    &args.workload,
    args.latency,
    args.max_cycles,
  )?;

  let mut simulator = Simulator::new(&config)?;
  let reports = simulator.run(&config.simulation.workloads)?;

  let failed = reports.iter().filter(|r| !r.passed()).count();
  if failed > 0 {
    return Err(std::io::Error::new(
      std::io::ErrorKind::Other,
      format!("{} of {} workloads failed", failed, reports.len()),
    ));
  }
  Ok(())
}
