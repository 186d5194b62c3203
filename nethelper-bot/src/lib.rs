//! # nethelper-bot
//!
//! Application crate: environment config, component wiring (storage, transport, probes, the
//! ordered handler chain) and the polling runner behind the `nethelper` binary.

pub mod cli;
pub mod components;
pub mod config;
pub mod runner;

pub use components::{build_dispatcher, Probes};
pub use config::BotConfig;
pub use runner::{reset_user, run_bot};
