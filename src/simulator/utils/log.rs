//! Global logging setup
use env_logger::Env;
use log::LevelFilter;
use std::sync::atomic::{AtomicBool, Ordering};

static ENABLE_LOG: AtomicBool = AtomicBool::new(true);

/// Install env_logger once; `RUST_LOG` overrides the `info` default.
pub fn init_log() {
  let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
    .format_timestamp(None)
    .is_test(cfg!(test))
    .try_init();
}

/// Quiet mode keeps warnings and errors only
pub fn set_log(enabled: bool) {
  ENABLE_LOG.store(enabled, Ordering::Relaxed);
  if !enabled {
    log::set_max_level(LevelFilter::Warn);
  }
}

/// Check if logging is enabled, default is true
pub fn is_log_enabled() -> bool {
  ENABLE_LOG.load(Ordering::Relaxed)
}
