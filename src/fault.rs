//! Fault-injection transformation catalog
//!
//! [`FaultInjector`] dispatches a message through the transformation named by
//! the active scenario and produces a [`FaultPlan`]: the text to forward,
//! any extra messages to inject before it, and any delay to impose first.
//! Plans are executed by the owning direction worker on its own outbound
//! channel only, so a transformation can never touch the sibling direction.

use crate::audit::AuditSink;
use crate::config::{ScenarioDefinition, ToolConfig};
use crate::error::{Error, Result};
use crate::relay::Direction;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Replacement alphabet for `TransformPartial`.
const REPLACEMENT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ.:,;-";

/// The closed catalog of fault-injection transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
  /// Forward the message unchanged
  Relay,
  /// Block the calling direction for `value` seconds, then forward unchanged
  Delay,
  /// Forward an empty string in place of the message (the write itself is
  /// not suppressed; an empty line still reaches the destination)
  Drop,
  /// Deliver the message `value` times in total on the same direction
  Repeat,
  /// Replace one random character with one from a fixed alphabet
  TransformPartial,
  /// Remove one random character at an index past the first
  DeletePartial,
  /// Append between 2 and 11 copies of the protocol separator
  ProtocolSeparators,
  /// Inject a random alphanumeric string of length `value`, then forward
  RandomString,
  /// Inject `value` random bytes decoded lossily as text, then forward
  RandomBitString,
  /// Append the separator (if absent) and one configured special character
  SpecialChars,
}

impl ScenarioKind {
  /// Resolve a configured scenario name. Unknown names yield `None`; the
  /// loader turns that into a configuration error.
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "Relay" => Some(Self::Relay),
      "Delay" => Some(Self::Delay),
      "Drop" => Some(Self::Drop),
      "Repeat" => Some(Self::Repeat),
      "TransformPartial" => Some(Self::TransformPartial),
      "DeletePartial" => Some(Self::DeletePartial),
      "ProtocolSeparators" => Some(Self::ProtocolSeparators),
      "RandomString" => Some(Self::RandomString),
      "RandomBitString" => Some(Self::RandomBitString),
      "SpecialChars" => Some(Self::SpecialChars),
      _ => None,
    }
  }

  /// The catalog name of this transformation.
  pub fn name(&self) -> &'static str {
    match self {
      Self::Relay => "Relay",
      Self::Delay => "Delay",
      Self::Drop => "Drop",
      Self::Repeat => "Repeat",
      Self::TransformPartial => "TransformPartial",
      Self::DeletePartial => "DeletePartial",
      Self::ProtocolSeparators => "ProtocolSeparators",
      Self::RandomString => "RandomString",
      Self::RandomBitString => "RandomBitString",
      Self::SpecialChars => "SpecialChars",
    }
  }

  /// Whether this transformation reads the configured protocol separator.
  pub fn needs_separator(&self) -> bool {
    matches!(self, Self::ProtocolSeparators | Self::SpecialChars)
  }

  /// Validate the scenario `value` against what this transformation parses
  /// out of it. Called at configuration load time.
  pub fn validate_value(&self, value: &str) -> Result<()> {
    match self {
      Self::Delay => {
        parse_number(self, value)?;
      }
      Self::Repeat => {
        if parse_number(self, value)? < 1 {
          return Err(Error::scenario_value(format!(
            "{} requires a count of at least 1, got {:?}",
            self.name(),
            value
          )));
        }
      }
      Self::RandomString | Self::RandomBitString => {
        parse_number(self, value)?;
      }
      _ => {}
    }
    Ok(())
  }
}

fn parse_number(kind: &ScenarioKind, value: &str) -> Result<u64> {
  value.trim().parse::<u64>().map_err(|_| {
    Error::scenario_value(format!(
      "{} requires a non-negative numeric value, got {:?}",
      kind.name(),
      value
    ))
  })
}

/// What a direction worker must do with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultPlan {
  /// Block the calling worker for this long before any write
  pub delay: Option<Duration>,
  /// Extra messages to write on the worker's own channel, before `forward`
  pub extra: Vec<String>,
  /// The (possibly empty) message to forward
  pub forward: String,
}

impl FaultPlan {
  fn forward(message: impl Into<String>) -> Self {
    Self {
      delay: None,
      extra: Vec::new(),
      forward: message.into(),
    }
  }
}

/// Stateless dispatcher applying one scenario's transformation to messages.
pub struct FaultInjector {
  kind: ScenarioKind,
  value: String,
  separator: String,
  special_characters: Vec<String>,
  audit: Arc<dyn AuditSink>,
  category: String,
}

impl FaultInjector {
  /// Build the injector for one configured scenario.
  pub fn new(
    scenario: &ScenarioDefinition,
    config: &ToolConfig,
    audit: Arc<dyn AuditSink>,
  ) -> Result<Self> {
    Ok(Self {
      kind: scenario.kind()?,
      value: scenario.value.clone(),
      separator: config.protocol_separator.clone(),
      special_characters: config.special_characters.clone(),
      audit,
      category: scenario.category(),
    })
  }

  /// The transformation this injector applies.
  pub fn kind(&self) -> ScenarioKind {
    self.kind
  }

  /// Apply the scenario transformation to one eligible message.
  ///
  /// Fails only on an unparsable scenario value; the caller logs and
  /// forwards the message unmodified in that case.
  pub fn apply(&self, message: &str, direction: Direction) -> Result<FaultPlan> {
    match self.kind {
      ScenarioKind::Relay => Ok(FaultPlan::forward(message)),
      ScenarioKind::Delay => self.delay(message, direction),
      ScenarioKind::Drop => Ok(self.drop_message(message, direction)),
      ScenarioKind::Repeat => self.repeat(message, direction),
      ScenarioKind::TransformPartial => Ok(self.transform_partial(message, direction)),
      ScenarioKind::DeletePartial => Ok(self.delete_partial(message, direction)),
      ScenarioKind::ProtocolSeparators => Ok(self.protocol_separators(message, direction)),
      ScenarioKind::RandomString => self.random_string(message, direction),
      ScenarioKind::RandomBitString => self.random_bit_string(message, direction),
      ScenarioKind::SpecialChars => self.special_chars(message, direction),
    }
  }

  fn note(&self, direction: Direction, message: String) {
    self.audit.log(&self.category, direction.destination(), &message);
  }

  fn delay(&self, message: &str, direction: Direction) -> Result<FaultPlan> {
    let seconds = parse_number(&self.kind, &self.value)?;
    let mut plan = FaultPlan::forward(message);
    if seconds > 0 {
      self.note(direction, format!("Delaying for {} sec.", seconds));
      plan.delay = Some(Duration::from_secs(seconds));
    }
    Ok(plan)
  }

  fn drop_message(&self, message: &str, direction: Direction) -> FaultPlan {
    self.note(direction, format!("Dropping message {}", message));
    FaultPlan::forward("")
  }

  fn repeat(&self, message: &str, direction: Direction) -> Result<FaultPlan> {
    let times = parse_number(&self.kind, &self.value)?;
    let mut plan = FaultPlan::forward(message);
    if times > 1 {
      self.note(
        direction,
        format!("Repeating message {} {} times.", message, times),
      );
      plan.extra = vec![message.to_string(); (times - 1) as usize];
    }
    Ok(plan)
  }

  fn transform_partial(&self, message: &str, direction: Direction) -> FaultPlan {
    let mut chars: Vec<char> = message.chars().collect();
    if chars.is_empty() {
      return FaultPlan::forward(message);
    }
    let mut rng = rand::rng();
    let position = rng.random_range(0..chars.len());
    // Exclude the current character so the mutation is always observable.
    let alphabet: Vec<char> = REPLACEMENT_ALPHABET
      .chars()
      .filter(|c| *c != chars[position])
      .collect();
    chars[position] = alphabet[rng.random_range(0..alphabet.len())];
    let mutated: String = chars.into_iter().collect();
    self.note(
      direction,
      format!("Message {} partially transformed into {}", message, mutated),
    );
    FaultPlan::forward(mutated)
  }

  fn delete_partial(&self, message: &str, direction: Direction) -> FaultPlan {
    let chars: Vec<char> = message.chars().collect();
    if chars.len() < 2 {
      return FaultPlan::forward(message);
    }
    // Position 0 is never eligible.
    let mut position = rand::rng().random_range(0..chars.len() - 1);
    if position == 0 {
      position = 1;
    }
    let shortened: String = chars
      .iter()
      .enumerate()
      .filter(|(i, _)| *i != position)
      .map(|(_, c)| c)
      .collect();
    self.note(
      direction,
      format!("Message {} partially deleted to {}", message, shortened),
    );
    FaultPlan::forward(shortened)
  }

  fn protocol_separators(&self, message: &str, direction: Direction) -> FaultPlan {
    let count = rand::rng().random_range(1..=10);
    let result = format!("{}{}{}", message, self.separator.repeat(count), self.separator);
    self.note(
      direction,
      format!("Added multiple protocol separators to message {}", result),
    );
    FaultPlan::forward(result)
  }

  fn random_string(&self, message: &str, direction: Direction) -> Result<FaultPlan> {
    let length = parse_number(&self.kind, &self.value)? as usize;
    let random: String = rand::rng()
      .sample_iter(Alphanumeric)
      .take(length)
      .map(char::from)
      .collect();
    self.note(direction, format!("Sending random string {}", random));
    let mut plan = FaultPlan::forward(message);
    plan.extra = vec![random];
    Ok(plan)
  }

  fn random_bit_string(&self, message: &str, direction: Direction) -> Result<FaultPlan> {
    let length = parse_number(&self.kind, &self.value)? as usize;
    let mut bytes = vec![0u8; length];
    rand::rng().fill(&mut bytes[..]);
    let random = String::from_utf8_lossy(&bytes).into_owned();
    self.note(direction, format!("Sending random bitstring {}", random));
    let mut plan = FaultPlan::forward(message);
    plan.extra = vec![random];
    Ok(plan)
  }

  fn special_chars(&self, message: &str, direction: Direction) -> Result<FaultPlan> {
    if self.special_characters.is_empty() {
      return Err(Error::scenario_value(
        "SpecialChars requires at least one configured special character".to_string(),
      ));
    }
    let mut result = message.to_string();
    if !result.contains(&self.separator) {
      result.push_str(&self.separator);
    }
    // The last list entry is excluded unless it is the only one.
    let bound = (self.special_characters.len() - 1).max(1);
    let special = &self.special_characters[rand::rng().random_range(0..bound)];
    self.note(
      direction,
      format!("Adding special character {} to message {}", special, result),
    );
    result.push_str(special);
    Ok(FaultPlan::forward(result))
  }
}
