//! Configuration and output plumbing shared by the simulator and the CLI.

pub mod config;
pub mod csv_log;
