//! Host configuration for network-delay-simulation testbeds.
//!
//! Bridges pairs of physical interfaces, installs `tc netem` delay on every
//! transmit queue, pins NIC interrupts to CPU cores and applies kernel
//! tuning. Everything is done by driving the standard OS tools through the
//! [`exec`] seam, so a run can be printed instead of executed.

pub mod bridge;
pub mod config;
pub mod error;
pub mod exec;
pub mod irq;
pub mod netem;
pub mod sim;
pub mod state;
pub mod tuning;

#[cfg(test)]
pub(crate) mod test_util;

pub use config::{Config, InterfaceGroup, TcTime};
pub use error::{ConfigError, HostError};
pub use exec::{Action, Executor, RecordingExecutor, Runner, SystemExecutor};
pub use irq::IrqMode;
pub use sim::{DelaySim, Outcome};
pub use state::StateStore;
