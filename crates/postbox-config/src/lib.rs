mod service;

pub use service::{ServerConfig, DEFAULT_SWEEP_INTERVAL_SECS};
