//! CLI command handlers, one file per command.

mod config;
mod paginate;
mod simulate;

pub use config::run_config;
pub use paginate::run_paginate;
pub use simulate::{run_simulate, SimulateArgs};
