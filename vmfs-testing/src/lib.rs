// SPDX-License-Identifier: GPL-3.0-only

pub mod artifacts;
pub mod config;
pub mod errors;
pub mod harness;
pub mod scenarios;
pub mod sim;

pub use config::{AcceptanceConfig, BackendKind};
pub use errors::{Result, TestingError};
pub use sim::SimulatedHost;
