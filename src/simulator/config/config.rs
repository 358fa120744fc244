use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::arch::pim::decoder::{AccessKind, MemorySegment};
use crate::arch::pim::functions::FuncKind;
use crate::workload::WorkloadKind;

/// PIM unit layout and function binding
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PimSection {
  #[serde(default)]
  pub node: u64,
  #[serde(default = "default_func_base")]
  pub func_base: u64,
  #[serde(default = "default_func_table_len")]
  pub func_table_len: usize,
  #[serde(default = "default_sram_base")]
  pub sram_base: u64,
  #[serde(default = "default_sram_size")]
  pub sram_size: u64,
  #[serde(default = "default_dram_base")]
  pub dram_base: u64,
  #[serde(default = "default_dram_size")]
  pub dram_size: u64,
  #[serde(default = "default_functions")]
  pub functions: Vec<FuncKind>,
}

fn default_func_base() -> u64 {
  0x0E00_0000
}

fn default_func_table_len() -> usize {
  16
}

fn default_sram_base() -> u64 {
  0x0F00_0000
}

fn default_sram_size() -> u64 {
  0x1_0000
}

fn default_dram_base() -> u64 {
  0x0F80_0000
}

fn default_dram_size() -> u64 {
  0x10_0000
}

fn default_functions() -> Vec<FuncKind> {
  vec![
    FuncKind::MemCopy,
    FuncKind::Lfsr,
    FuncKind::SymmetricDistanceMatrix,
    FuncKind::AStar,
  ]
}

impl Default for PimSection {
  fn default() -> Self {
    Self {
      node: 0,
      func_base: default_func_base(),
      func_table_len: default_func_table_len(),
      sram_base: default_sram_base(),
      sram_size: default_sram_size(),
      dram_base: default_dram_base(),
      dram_size: default_dram_size(),
      functions: default_functions(),
    }
  }
}

impl PimSection {
  /// Decoder segments in lookup order.
  pub fn segments(&self) -> Vec<MemorySegment> {
    vec![
      MemorySegment::new(AccessKind::Func, self.func_base, self.func_table_len as u64 * 8),
      MemorySegment::new(AccessKind::Sram, self.sram_base, self.sram_size),
      MemorySegment::new(AccessKind::Dram, self.dram_base, self.dram_size),
    ]
  }

  /// Control register of slot `fnum`.
  pub fn func_addr(&self, fnum: usize) -> u64 {
    self.func_base + fnum as u64 * 8
  }

  /// First slot bound to `kind`.
  pub fn slot_of(&self, kind: FuncKind) -> Option<usize> {
    self.functions.iter().position(|&k| k == kind)
  }
}

/// Backing DRAM model
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DramSection {
  #[serde(default = "default_latency")]
  pub latency: u64,
}

fn default_latency() -> u64 {
  4
}

impl Default for DramSection {
  fn default() -> Self {
    Self {
      latency: default_latency(),
    }
  }
}

/// Simulation run options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub step_mode: bool,
  #[serde(default)]
  pub trace_file: String,
  #[serde(default = "default_max_cycles")]
  pub max_cycles: u64,
  #[serde(default = "default_workloads")]
  pub workloads: Vec<WorkloadKind>,
}

fn default_max_cycles() -> u64 {
  1_000_000
}

fn default_workloads() -> Vec<WorkloadKind> {
  WorkloadKind::ALL.to_vec()
}

impl Default for SimulationSection {
  fn default() -> Self {
    Self {
      quiet: false,
      step_mode: false,
      trace_file: String::new(),
      max_cycles: default_max_cycles(),
      workloads: default_workloads(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub pim: PimSection,
  #[serde(default)]
  pub dram: DramSection,
  #[serde(default)]
  pub simulation: SimulationSection,
}

/// Load default.toml shipped with the crate
pub fn load_default_config() -> io::Result<AppConfig> {
  let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("src")
    .join("simulator")
    .join("config")
    .join("default.toml");

  load_config_file(&config_path)
}

pub fn load_config_file(path: &Path) -> io::Result<AppConfig> {
  let content = fs::read_to_string(path)
    .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("cannot read config file {:?}: {}", path, e)))?;

  parse_config(&content)
}

pub fn parse_config(content: &str) -> io::Result<AppConfig> {
  toml::from_str::<AppConfig>(content)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("failed to parse TOML config: {}", e)))
}

/// Merge two configs; set fields of the user file win, whole sections are replaced.
pub fn merge_config(mut base: AppConfig, override_content: &str) -> io::Result<AppConfig> {
  let table: toml::Table = toml::from_str(override_content)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("failed to parse TOML config: {}", e)))?;
  let user = parse_config(override_content)?;

  if table.contains_key("pim") {
    base.pim = user.pim;
  }
  if table.contains_key("dram") {
    base.dram = user.dram;
  }
  if let Some(sim) = table.get("simulation").and_then(|v| v.as_table()) {
    if sim.contains_key("quiet") {
      base.simulation.quiet = user.simulation.quiet;
    }
    if sim.contains_key("step_mode") {
      base.simulation.step_mode = user.simulation.step_mode;
    }
    if sim.contains_key("trace_file") {
      base.simulation.trace_file = user.simulation.trace_file;
    }
    if sim.contains_key("max_cycles") {
      base.simulation.max_cycles = user.simulation.max_cycles;
    }
    if sim.contains_key("workloads") {
      base.simulation.workloads = user.simulation.workloads;
    }
  }

  Ok(base)
}

/// Apply CLI flags over the loaded config
pub fn apply_cli_overrides(
  config: &mut AppConfig,
  quiet: bool,
  step: bool,
  trace_file: Option<&str>,
  workloads: &[WorkloadKind],
  latency: Option<u64>,
  max_cycles: Option<u64>,
) {
  if quiet {
    config.simulation.quiet = true;
  }
  if step {
    config.simulation.step_mode = true;
  }
  if let Some(file) = trace_file {
    config.simulation.trace_file = file.to_string();
  }
  if !workloads.is_empty() {
    config.simulation.workloads = workloads.to_vec();
  }
  if let Some(latency) = latency {
    config.dram.latency = latency;
  }
  if let Some(max_cycles) = max_cycles {
    config.simulation.max_cycles = max_cycles;
  }
}

pub fn validate_config(config: &AppConfig) -> io::Result<()> {
  let invalid = |msg: String| Err(io::Error::new(io::ErrorKind::InvalidData, msg));

  if config.dram.latency == 0 {
    return invalid("dram latency must be at least 1".to_string());
  }
  if config.simulation.max_cycles == 0 {
    return invalid("max_cycles must be at least 1".to_string());
  }
  for workload in &config.simulation.workloads {
    let kind = workload.func_kind();
    if config.pim.slot_of(kind).is_none() {
      return invalid(format!("workload {} needs a {} slot", workload, kind));
    }
  }
  // layout errors are reported by the unit itself
  crate::arch::pim::PimUnit::new(&config.pim)
    .map(|_| ())
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/// default.toml, then the optional user file, then CLI flags
pub fn load_and_merge_configs(
  config_file: Option<&Path>,
  quiet: bool,
  step: bool,
  trace_file: Option<&str>,
  workloads: &[WorkloadKind],
  latency: Option<u64>,
  max_cycles: Option<u64>,
) -> io::Result<AppConfig> {
  let mut config = load_default_config()?;

  if let Some(path) = config_file {
    let content = fs::read_to_string(path)
      .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("cannot read config file {:?}: {}", path, e)))?;
    config = merge_config(config, &content)?;
  }

  apply_cli_overrides(&mut config, quiet, step, trace_file, workloads, latency, max_cycles);
  validate_config(&config)?;

  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_toml_matches_defaults() {
    let config = load_default_config().unwrap();
    let defaults = AppConfig::default();
    assert_eq!(config.pim.func_base, defaults.pim.func_base);
    assert_eq!(config.pim.sram_size, 0x10000);
    assert_eq!(config.pim.functions, defaults.pim.functions);
    assert_eq!(config.dram.latency, defaults.dram.latency);
    assert_eq!(config.simulation.workloads, defaults.simulation.workloads);
    validate_config(&config).unwrap();
  }

  #[test]
  fn test_merge_keeps_unset_fields() {
    let base = AppConfig::default();
    let merged = merge_config(base, "[simulation]\nmax_cycles = 10\n[dram]\nlatency = 9\n").unwrap();
    assert_eq!(merged.simulation.max_cycles, 10);
    assert_eq!(merged.dram.latency, 9);
    assert_eq!(merged.simulation.workloads.len(), 4);
    assert_eq!(merged.pim.sram_base, default_sram_base());
  }

  #[test]
  fn test_function_binding_from_toml() {
    let config = parse_config("[pim]\nfunctions = [\"astar\", \"mem_copy\"]\n").unwrap();
    assert_eq!(config.pim.slot_of(FuncKind::AStar), Some(0));
    assert_eq!(config.pim.slot_of(FuncKind::MemCopy), Some(1));
    assert_eq!(config.pim.slot_of(FuncKind::Lfsr), None);
    assert_eq!(config.pim.func_addr(1), default_func_base() + 8);
  }

  #[test]
  fn test_validate_rejects() {
    let mut config = AppConfig::default();
    config.dram.latency = 0;
    assert!(validate_config(&config).is_err());

    let mut config = AppConfig::default();
    config.pim.functions = vec![FuncKind::MemCopy];
    assert!(validate_config(&config).is_err());

    let mut config = AppConfig::default();
    config.pim.func_base = 0x0E00_0008;
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_cli_overrides() {
    let mut config = AppConfig::default();
    apply_cli_overrides(&mut config, true, false, Some("t.json"), &[WorkloadKind::AStar], Some(2), None);
    assert!(config.simulation.quiet);
    assert!(!config.simulation.step_mode);
    assert_eq!(config.simulation.trace_file, "t.json");
    assert_eq!(config.simulation.workloads, vec![WorkloadKind::AStar]);
    assert_eq!(config.dram.latency, 2);
    assert_eq!(config.simulation.max_cycles, default_max_cycles());
  }
}
