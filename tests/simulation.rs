use pimsim::arch::pim::functions::astar::PATH_FOUND;
use pimsim::arch::pim::{FuncKind, FuncState};
use pimsim::simulator::config::config::{AppConfig, SimulationSection};
use pimsim::simulator::utils::log::init_log;
use pimsim::simulator::Simulator;
use pimsim::workload::fixtures::TWO_PATH_4;
use pimsim::workload::{golden, invoke, run_astar, PimHost, WorkloadKind};

fn get_app_config(latency: u64) -> AppConfig {
  let mut config = AppConfig::default();
  config.dram.latency = latency;
  config.simulation = SimulationSection {
    quiet: true,
    step_mode: false,
    trace_file: String::new(),
    max_cycles: 100_000,
    workloads: Vec::new(),
  };
  config
}

fn simulator(latency: u64) -> Simulator {
  init_log();
  Simulator::new(&get_app_config(latency)).unwrap()
}

macro_rules! test_case {
  ($name:ident, $workload:expr, $latency:expr) => {
    #[test]
    fn $name() {
      let mut sim = simulator($latency);
      let reports = sim.run(&[$workload]).unwrap();
      assert_eq!(reports.len(), 1);
      assert!(reports[0].passed(), "{:?}", reports[0].mismatches);
      assert!(reports[0].cycles > 0);
    }
  };
}

test_case!(test_mem_copy, WorkloadKind::MemCopy, 4);
test_case!(test_mem_copy_slow_dram, WorkloadKind::MemCopy, 40);
test_case!(test_lfsr, WorkloadKind::Lfsr, 4);
test_case!(test_distance_matrix, WorkloadKind::DistanceMatrix, 4);
test_case!(test_astar, WorkloadKind::AStar, 4);
test_case!(test_astar_single_cycle_dram, WorkloadKind::AStar, 1);

#[test]
fn test_astar_end_to_end() {
  let mut sim = simulator(4);
  let run = run_astar(&mut sim, &TWO_PATH_4, 4, 0, 3).unwrap();
  assert_eq!(run.return_code, PATH_FOUND);
  assert_eq!(run.came_from[3], 2);
  assert_eq!(run.came_from[2], 0);
  assert_eq!(run.came_from[0], 0);
  assert!(sim.simulation_mut().get_global_time() >= run.cycles as f64);
}

#[test]
fn test_slower_dram_costs_cycles() {
  let cycles = |latency| {
    let mut sim = simulator(latency);
    let fnum = sim.layout().slot_of(FuncKind::Lfsr).unwrap();
    let out = sim.layout().dram_base;
    invoke(&mut sim, fnum, &[out, 9, 130]).unwrap();
    assert_eq!(sim.read_words(out, 130).unwrap(), golden::lfsr_fib(9, 130));
    let addr = sim.layout().func_addr(fnum);
    assert_eq!(sim.mmio_read(addr).unwrap(), FuncState::Done.code());
    invoke(&mut sim, fnum, &[out, 9, 130]).unwrap()
  };
  assert!(cycles(50) > cycles(1));
}

#[test]
fn test_all_workloads() {
  let mut sim = simulator(4);
  let reports = sim.run(&WorkloadKind::ALL).unwrap();
  assert_eq!(reports.len(), WorkloadKind::ALL.len());
  assert!(reports.iter().all(|r| r.passed()));
}

#[test]
fn test_unmapped_access_is_rejected() {
  let mut sim = simulator(4);
  assert!(sim.mem_read(0x10, 8).is_err());
  assert!(sim.mem_write(0x10, &[0; 8]).is_err());
}
