//! Scenario driver
//!
//! Iterates the configured scenarios in order. Each enabled scenario gets a
//! fresh listener, a fresh pair of supervised game processes, and one relay
//! connection that runs for the scenario's configured duration before being
//! cancelled. A connect or supervision failure aborts that scenario only;
//! the driver moves on to the next one.

use crate::acceptor::Acceptor;
use crate::audit::AuditSink;
use crate::config::{ScenarioDefinition, ToolConfig};
use crate::error::{Error, Result};
use crate::relay::RelayConnection;
use crate::supervisor::{CommandBuilder, GameProcess, JavaJar, Role};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Runs every enabled scenario against the system under test.
pub struct ScenarioDriver {
  config: ToolConfig,
  audit: Arc<dyn AuditSink>,
  builder: Box<dyn CommandBuilder>,
}

impl ScenarioDriver {
  /// Driver over the default Java JAR command builder.
  pub fn new(config: ToolConfig, audit: Arc<dyn AuditSink>) -> Self {
    Self::with_command_builder(config, audit, Box::new(JavaJar))
  }

  /// Driver over a custom command builder.
  pub fn with_command_builder(
    config: ToolConfig,
    audit: Arc<dyn AuditSink>,
    builder: Box<dyn CommandBuilder>,
  ) -> Self {
    Self {
      config,
      audit,
      builder,
    }
  }

  /// Run all enabled scenarios in configured order.
  ///
  /// Only configuration errors abort the whole run; anything else is fatal
  /// for its own scenario iteration and logged.
  pub async fn run(&self, game: &Path) -> Result<()> {
    for scenario in self.config.enabled_scenarios() {
      match self.run_scenario(scenario, game).await {
        Ok(()) => {}
        Err(e @ Error::Config(_)) => return Err(e),
        Err(e) => {
          self
            .audit
            .log(&scenario.category(), "General", &format!("Scenario aborted: {}", e));
        }
      }
      // Settle pause between scenarios so ports and processes wind down.
      tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Ok(())
  }

  async fn run_scenario(&self, scenario: &ScenarioDefinition, game: &Path) -> Result<()> {
    let category = scenario.category();
    let acceptor = Acceptor::bind(self.config.test_tool_port, &*self.audit, &category).await?;

    let server = GameProcess::launch(
      &*self.builder,
      Role::Server,
      game,
      self.config.game_server_port,
      self.config.test_tool_port,
      self.audit.clone(),
      &category,
    )
    .await?;
    let client = GameProcess::launch(
      &*self.builder,
      Role::Client,
      game,
      self.config.game_server_port,
      self.config.test_tool_port,
      self.audit.clone(),
      &category,
    )
    .await?;

    self.audit.log(&category, "Client", "Waiting for client connection.");
    let peer = acceptor.accept().await?;
    self.audit.log(&category, "Client", "Client connected.");

    let upstream = format!("127.0.0.1:{}", self.config.game_server_port);
    let mut relay =
      RelayConnection::open(peer, &upstream, scenario, &self.config, self.audit.clone()).await?;
    relay.start();
    self.audit.log(&category, "General", "Started.");

    tokio::time::sleep(Duration::from_secs(scenario.duration)).await;
    self.audit.log(&category, "General", "Test duration passed.");

    relay.cancel().await;
    self.audit.log(&category, "General", "Sockets closed.");

    client.stop().await;
    server.stop().await;
    Ok(())
  }
}
