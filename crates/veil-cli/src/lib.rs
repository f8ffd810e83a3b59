//! Command line front end for Veil
//!
//! The `veil` binary maps its flags onto [`NodeConfig`](veil_node::NodeConfig),
//! [`SwarmConfig`](veil_swarm::SwarmConfig) and
//! [`LogConfig`](veil_logging::LogConfig) and runs one session.

pub mod config;
pub mod output;

pub use config::{Cli, Command};
