//! Game process supervision
//!
//! Launches the client and server executables under test, pumps their
//! output into the audit log line by line, and kills them when a scenario
//! ends. Command construction sits behind [`CommandBuilder`] so embedders
//! can supervise something other than a Java JAR.

use crate::audit::AuditSink;
use crate::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Which side of the system under test a process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  /// The game client; dials the tool port
  Client,
  /// The game server; listens on the game server port
  Server,
}

impl Role {
  /// Audit subject for this process's output.
  pub fn label(&self) -> &'static str {
    match self {
      Role::Client => "GameClient",
      Role::Server => "GameServer",
    }
  }
}

/// Builds the launch command for one role of the system under test.
pub trait CommandBuilder: Send + Sync {
  /// Produce the ready-to-spawn command for `role`.
  fn build(&self, role: Role, game: &Path, server_port: u16, tool_port: u16) -> Command;
}

/// Default builder for Java JAR targets.
///
/// Server role: `java -jar <game> server <gameServerPort>`.
/// Client role: `java -jar <game> client localhost:<testToolPort>`,
/// pointing the client at the relay instead of the real server.
pub struct JavaJar;

impl CommandBuilder for JavaJar {
  fn build(&self, role: Role, game: &Path, server_port: u16, tool_port: u16) -> Command {
    let mut command = Command::new("java");
    command.arg("-jar").arg(game);
    match role {
      Role::Server => {
        command.arg("server").arg(server_port.to_string());
      }
      Role::Client => {
        command.arg("client").arg(format!("localhost:{}", tool_port));
      }
    }
    command
  }
}

/// A supervised child process of the system under test.
pub struct GameProcess {
  role: Role,
  child: Child,
  pumps: Vec<JoinHandle<()>>,
  audit: Arc<dyn AuditSink>,
  category: String,
}

impl GameProcess {
  /// Launch one role of the system under test after a short settle pause.
  pub async fn launch(
    builder: &dyn CommandBuilder,
    role: Role,
    game: &Path,
    server_port: u16,
    tool_port: u16,
    audit: Arc<dyn AuditSink>,
    category: &str,
  ) -> Result<Self> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    audit.log(category, role.label(), "Launching JAR.");
    let mut command = builder.build(role, game, server_port, tool_port);
    command
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    let mut child = command
      .spawn()
      .map_err(|e| Error::supervisor(format!("failed to launch {}: {}", role.label(), e)))?;

    let mut pumps = Vec::new();
    if let Some(stdout) = child.stdout.take() {
      pumps.push(Self::pump(stdout, role, audit.clone(), category.to_string()));
    }
    if let Some(stderr) = child.stderr.take() {
      pumps.push(Self::pump(stderr, role, audit.clone(), category.to_string()));
    }

    Ok(Self {
      role,
      child,
      pumps,
      audit,
      category: category.to_string(),
    })
  }

  /// Copy one output stream into the audit log until the process exits.
  fn pump<R>(stream: R, role: Role, audit: Arc<dyn AuditSink>, category: String) -> JoinHandle<()>
  where
    R: AsyncRead + Send + Unpin + 'static,
  {
    tokio::spawn(async move {
      let mut lines = BufReader::new(stream).lines();
      while let Ok(Some(line)) = lines.next_line().await {
        audit.log(&category, role.label(), &line);
      }
    })
  }

  /// Kill the process and wait for its output pumps to drain.
  pub async fn stop(mut self) {
    if let Err(e) = self.child.start_kill() {
      tracing::debug!("{} already exited: {}", self.role.label(), e);
    }
    let _ = self.child.wait().await;
    for pump in self.pumps.drain(..) {
      let _ = pump.await;
    }
    self
      .audit
      .log(&self.category, self.role.label(), "JAR process stopped.");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::audit::MemoryAudit;
  use std::ffi::OsStr;

  #[test]
  fn java_jar_builds_role_specific_commands() {
    let server = JavaJar.build(Role::Server, Path::new("game.jar"), 6000, 6001);
    let args: Vec<&OsStr> = server.as_std().get_args().collect();
    assert_eq!(args, ["-jar", "game.jar", "server", "6000"]);
    assert_eq!(server.as_std().get_program(), "java");

    let client = JavaJar.build(Role::Client, Path::new("game.jar"), 6000, 6001);
    let args: Vec<&OsStr> = client.as_std().get_args().collect();
    assert_eq!(args, ["-jar", "game.jar", "client", "localhost:6001"]);
  }

  #[test]
  fn role_labels() {
    assert_eq!(Role::Client.label(), "GameClient");
    assert_eq!(Role::Server.label(), "GameServer");
  }

  struct EchoBuilder;

  impl CommandBuilder for EchoBuilder {
    fn build(&self, role: Role, _game: &Path, _server_port: u16, _tool_port: u16) -> Command {
      let mut command = Command::new("echo");
      command.arg(format!("hello from {}", role.label()));
      command
    }
  }

  #[tokio::test]
  async fn pumps_child_output_into_the_audit_log() {
    let audit = Arc::new(MemoryAudit::new());
    let process = GameProcess::launch(
      &EchoBuilder,
      Role::Server,
      Path::new("unused"),
      0,
      0,
      audit.clone(),
      "Test_Relay",
    )
    .await
    .unwrap();
    // Give the child time to emit before it is killed.
    tokio::time::sleep(Duration::from_millis(300)).await;
    process.stop().await;

    let events = audit.events();
    assert!(events
      .iter()
      .any(|e| e.subject == "GameServer" && e.message == "Launching JAR."));
    assert!(events
      .iter()
      .any(|e| e.subject == "GameServer" && e.message == "hello from GameServer"));
    assert!(events
      .iter()
      .any(|e| e.subject == "GameServer" && e.message == "JAR process stopped."));
  }
}
