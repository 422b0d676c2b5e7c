//! Error types for the fault-injection relay

use std::io;
use thiserror::Error;

/// A `Result` alias where the `Err` case is `faultline::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// The errors that may occur while driving a fault-injection run.
#[derive(Error, Debug)]
pub enum Error {
  /// IO error on a relay channel or the audit log
  #[error("IO error: {0}")]
  Io(#[from] io::Error),

  /// Malformed or missing tool configuration, fatal before any connection
  #[error("config error: {0}")]
  Config(String),

  /// Accept or upstream-dial failure, fatal for one scenario iteration only
  #[error("connect error: {0}")]
  Connect(String),

  /// A scenario `value` that cannot be parsed as its transformation requires
  #[error("scenario value error: {0}")]
  ScenarioValue(String),

  /// Process supervision failure (launching or stopping a game process)
  #[error("supervisor error: {0}")]
  Supervisor(String),
}

impl Error {
  /// Create a config error and log it
  pub fn config(msg: impl Into<String>) -> Self {
    let error = Error::Config(msg.into());
    tracing::error!("{}", error);
    error
  }

  /// Create a connect error and log it
  pub fn connect(msg: impl Into<String>) -> Self {
    let error = Error::Connect(msg.into());
    tracing::error!("{}", error);
    error
  }

  /// Create a scenario value error and log it
  ///
  /// Absorbed by the worker loop, so reported at warn level.
  pub fn scenario_value(msg: impl Into<String>) -> Self {
    let error = Error::ScenarioValue(msg.into());
    tracing::warn!("{}", error);
    error
  }

  /// Create a supervisor error and log it
  pub fn supervisor(msg: impl Into<String>) -> Self {
    let error = Error::Supervisor(msg.into());
    tracing::error!("{}", error);
    error
  }
}
