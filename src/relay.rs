//! Relay connection and per-direction workers
//!
//! A [`RelayConnection`] owns one accepted peer stream and one dialed
//! upstream stream, and runs exactly one `DirectionWorker` per traffic
//! direction. Each worker has exclusive ownership of one inbound reader and
//! the paired outbound writer; the only state shared between the two is the
//! cancellation flag. Reads are poll-shaped: a bounded wait for the next
//! line, falling back to a no-op iteration so the cancellation flag is
//! observed promptly without socket read timeouts.

use crate::audit::AuditSink;
use crate::config::{ScenarioDefinition, ToolConfig};
use crate::error::{Error, Result};
use crate::fault::FaultInjector;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Bounded wait per read attempt; also the cancellation latency bound.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// One of the two traffic directions through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  /// Game client to game server
  ToUpstream,
  /// Game server to game client
  ToPeer,
}

impl Direction {
  /// The side this direction delivers to; audit subject for engine actions.
  pub fn destination(&self) -> &'static str {
    match self {
      Direction::ToUpstream => "Server",
      Direction::ToPeer => "Client",
    }
  }

  /// Audit subject for messages read on this direction.
  pub fn inbound_label(&self) -> &'static str {
    match self {
      Direction::ToUpstream => "Client ->",
      Direction::ToPeer => "Server ->",
    }
  }

  /// Audit subject for messages written on this direction.
  pub fn outbound_label(&self) -> &'static str {
    match self {
      Direction::ToUpstream => "-> Server",
      Direction::ToPeer => "-> Client",
    }
  }

  /// Lifecycle message recorded when this direction's worker exits.
  pub fn stopped_message(&self) -> &'static str {
    match self {
      Direction::ToUpstream => "Client thread stopped.",
      Direction::ToPeer => "Server thread stopped.",
    }
  }
}

/// Eligibility gate deciding which messages the active scenario touches.
#[derive(Debug, Clone)]
pub struct CommandMatcher {
  commands: Vec<String>,
  ignore_commands: bool,
}

impl CommandMatcher {
  /// Build a matcher over the configured command substrings.
  pub fn new(commands: &[String], ignore_commands: bool) -> Self {
    Self {
      commands: commands.iter().map(|c| c.to_lowercase()).collect(),
      ignore_commands,
    }
  }

  /// Whether the message contains any configured command, case-insensitive.
  pub fn is_command(&self, message: &str) -> bool {
    let lowered = message.to_lowercase();
    self.commands.iter().any(|c| lowered.contains(c))
  }

  /// Whether the active scenario applies to this message.
  pub fn applies(&self, message: &str) -> bool {
    if self.ignore_commands {
      !self.is_command(message)
    } else {
      self.is_command(message)
    }
  }
}

/// The unit of concurrent execution for one traffic direction.
///
/// Owns its reader and writer exclusively; never touches the sibling's.
struct DirectionWorker {
  direction: Direction,
  lines: Lines<BufReader<BoxedRead>>,
  writer: BoxedWrite,
  matcher: CommandMatcher,
  injector: Arc<FaultInjector>,
  audit: Arc<dyn AuditSink>,
  category: String,
  cancelled: Arc<AtomicBool>,
}

impl DirectionWorker {
  #[allow(clippy::too_many_arguments)]
  fn new(
    direction: Direction,
    reader: BoxedRead,
    writer: BoxedWrite,
    matcher: CommandMatcher,
    injector: Arc<FaultInjector>,
    audit: Arc<dyn AuditSink>,
    category: String,
    cancelled: Arc<AtomicBool>,
  ) -> Self {
    Self {
      direction,
      lines: BufReader::new(reader).lines(),
      writer,
      matcher,
      injector,
      audit,
      category,
      cancelled,
    }
  }

  /// Run until cancelled or the channel faults, then release the streams.
  async fn run(mut self) {
    if let Err(e) = self.relay_loop().await {
      tracing::debug!("{} worker: {}", self.direction.destination(), e);
    }
    self
      .audit
      .log(&self.category, "General", self.direction.stopped_message());
    let _ = self.writer.shutdown().await;
  }

  async fn relay_loop(&mut self) -> Result<()> {
    while !self.cancelled.load(Ordering::Relaxed) {
      // Bounded wait so a cancellation request is observed within
      // POLL_INTERVAL. next_line is cancellation safe: a line that is
      // partially read when the timeout fires is completed on the next
      // attempt.
      let line = match timeout(POLL_INTERVAL, self.lines.next_line()).await {
        Err(_) => continue,
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => {
          return Err(Error::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "peer closed the connection",
          )))
        }
        Ok(Err(e)) => return Err(e.into()),
      };
      if line.is_empty() {
        continue;
      }
      self
        .audit
        .log(&self.category, self.direction.inbound_label(), &line);
      if self.matcher.applies(&line) {
        match self.injector.apply(&line, self.direction) {
          Ok(plan) => {
            if let Some(delay) = plan.delay {
              tokio::time::sleep(delay).await;
            }
            for extra in &plan.extra {
              self.send(extra).await?;
            }
            self.send(&plan.forward).await?;
          }
          Err(e) => {
            // Degraded fallback: a bad scenario value never kills the loop.
            self
              .audit
              .log(&self.category, "General", &format!("{}; forwarding unmodified", e));
            self.send(&line).await?;
          }
        }
      } else {
        self.send(&line).await?;
      }
    }
    Ok(())
  }

  /// Write one line on the owned outbound channel and log it if non-empty.
  async fn send(&mut self, message: &str) -> Result<()> {
    self.writer.write_all(message.as_bytes()).await?;
    self.writer.write_all(b"\n").await?;
    self.writer.flush().await?;
    if !message.is_empty() {
      self
        .audit
        .log(&self.category, self.direction.outbound_label(), message);
    }
    Ok(())
  }
}

/// A connected peer/upstream socket pair and its two direction workers.
pub struct RelayConnection {
  workers: Option<(DirectionWorker, DirectionWorker)>,
  handles: Vec<JoinHandle<()>>,
  cancelled: Arc<AtomicBool>,
}

impl RelayConnection {
  /// Dial the upstream address and wrap both streams for relaying.
  ///
  /// A dial failure is fatal for the scenario iteration, not the process.
  pub async fn open<S>(
    peer: S,
    upstream_addr: &str,
    scenario: &ScenarioDefinition,
    config: &ToolConfig,
    audit: Arc<dyn AuditSink>,
  ) -> Result<Self>
  where
    S: AsyncRead + AsyncWrite + Send + 'static,
  {
    let upstream = TcpStream::connect(upstream_addr).await.map_err(|e| {
      Error::connect(format!("failed to reach upstream {}: {}", upstream_addr, e))
    })?;
    Self::from_streams(peer, upstream, scenario, config, audit)
  }

  /// Wrap an already-connected stream pair for relaying.
  ///
  /// Used directly by tests; [`RelayConnection::open`] delegates here.
  pub fn from_streams<P, U>(
    peer: P,
    upstream: U,
    scenario: &ScenarioDefinition,
    config: &ToolConfig,
    audit: Arc<dyn AuditSink>,
  ) -> Result<Self>
  where
    P: AsyncRead + AsyncWrite + Send + 'static,
    U: AsyncRead + AsyncWrite + Send + 'static,
  {
    let injector = Arc::new(FaultInjector::new(scenario, config, audit.clone())?);
    let matcher = CommandMatcher::new(&config.commands, config.ignore_commands);
    let cancelled = Arc::new(AtomicBool::new(false));
    let category = scenario.category();
    let (peer_read, peer_write) = tokio::io::split(peer);
    let (upstream_read, upstream_write) = tokio::io::split(upstream);
    let to_upstream = DirectionWorker::new(
      Direction::ToUpstream,
      Box::new(peer_read),
      Box::new(upstream_write),
      matcher.clone(),
      injector.clone(),
      audit.clone(),
      category.clone(),
      cancelled.clone(),
    );
    let to_peer = DirectionWorker::new(
      Direction::ToPeer,
      Box::new(upstream_read),
      Box::new(peer_write),
      matcher,
      injector,
      audit,
      category,
      cancelled.clone(),
    );
    Ok(Self {
      workers: Some((to_upstream, to_peer)),
      handles: Vec::new(),
      cancelled,
    })
  }

  /// Spawn both direction workers. Returns immediately.
  pub fn start(&mut self) {
    if let Some((to_upstream, to_peer)) = self.workers.take() {
      self.handles.push(tokio::spawn(to_upstream.run()));
      self.handles.push(tokio::spawn(to_peer.run()));
    }
  }

  /// Signal both workers to stop and wait for both loops to exit.
  ///
  /// Idempotent; safe to call whether or not a worker already exited on an
  /// I/O fault. Streams are released when the workers return.
  pub async fn cancel(&mut self) {
    self.cancelled.store(true, Ordering::Relaxed);
    // Never started: dropping the workers releases both streams.
    self.workers = None;
    for handle in self.handles.drain(..) {
      let _ = handle.await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn matcher(ignore: bool) -> CommandMatcher {
    CommandMatcher::new(&["MOVE".to_string(), "TURN".to_string()], ignore)
  }

  #[test]
  fn command_matching_is_case_insensitive_substring() {
    let m = matcher(false);
    assert!(m.is_command("MOVE|3|4"));
    assert!(m.is_command("premove|x"));
    assert!(m.is_command("turn|left"));
    assert!(!m.is_command("PING"));
  }

  #[test]
  fn eligibility_polarity_inverts_with_ignore_commands() {
    let normal = matcher(false);
    assert!(normal.applies("MOVE|3|4"));
    assert!(!normal.applies("PING"));

    let inverted = matcher(true);
    assert!(!inverted.applies("MOVE|3|4"));
    assert!(inverted.applies("PING"));
  }

  #[test]
  fn direction_labels_match_log_contract() {
    assert_eq!(Direction::ToUpstream.destination(), "Server");
    assert_eq!(Direction::ToUpstream.inbound_label(), "Client ->");
    assert_eq!(Direction::ToUpstream.outbound_label(), "-> Server");
    assert_eq!(Direction::ToUpstream.stopped_message(), "Client thread stopped.");
    assert_eq!(Direction::ToPeer.destination(), "Client");
    assert_eq!(Direction::ToPeer.inbound_label(), "Server ->");
    assert_eq!(Direction::ToPeer.outbound_label(), "-> Client");
    assert_eq!(Direction::ToPeer.stopped_message(), "Server thread stopped.");
  }
}
