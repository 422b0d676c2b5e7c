#![deny(missing_docs)]

//! # faultline
//!
//! The `faultline` crate provides a man-in-the-middle fault-injection relay
//! for testing the robustness of line-based client/server network protocols.
//!
//! It sits between a protocol client and a protocol server, relays
//! newline-delimited UTF-8 messages in both directions, and applies one
//! configured fault-injection scenario at a time to eligible traffic:
//!
//! - A closed catalog of named transformations ([`ScenarioKind`])
//! - An eligibility gate keyed on configured command substrings
//! - One independent worker per traffic direction with cooperative
//!   cancellation ([`RelayConnection`])
//! - Supervision of the executables under test ([`GameProcess`])
//! - A plain-text or CSV audit log of every relayed message ([`AuditLog`])
//!
//! ## Running a configured campaign
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> faultline::Result<()> {
//!   let config = faultline::ToolConfig::load("config.json")?;
//!   let audit = Arc::new(faultline::AuditLog::create(
//!     "game",
//!     config.print_log,
//!     config.log_mode_csv,
//!   )?);
//!   let driver = faultline::ScenarioDriver::new(config, audit);
//!   driver.run("game.jar".as_ref()).await
//! }
//! ```
//!
//! ## Relaying without supervision
//!
//! The relay core is independent of process supervision: hand
//! [`RelayConnection::open`] any accepted peer stream and an upstream
//! address, and it spawns the two direction workers until [`cancel`] is
//! called.
//!
//! [`cancel`]: RelayConnection::cancel

mod acceptor;
mod audit;
mod config;
mod driver;
mod error;
mod fault;
mod relay;
mod supervisor;

pub use acceptor::Acceptor;
pub use audit::{AuditLog, AuditSink, LogEvent, MemoryAudit};
pub use config::{ScenarioDefinition, ToolConfig};
pub use driver::ScenarioDriver;
pub use error::{Error, Result};
pub use fault::{FaultInjector, FaultPlan, ScenarioKind};
pub use relay::{CommandMatcher, Direction, RelayConnection, POLL_INTERVAL};
pub use supervisor::{CommandBuilder, GameProcess, JavaJar, Role};
