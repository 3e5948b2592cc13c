//! Process layer of the labgate access point.
//!
//! Loads the TOML configuration, installs logging, builds the device graph
//! (real hardware or the simulated stand-ins) and runs the orchestrator until
//! a termination signal arrives.

pub mod app;
pub mod config;
pub mod signals;
pub mod simulation;
pub mod telemetry;

pub use app::{AccessPoint, SHUTDOWN_TIMEOUT, build, run};
pub use config::{AppConfig, Mode, resolve_config_path};
