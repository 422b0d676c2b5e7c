//! Tool configuration and scenario definitions
//!
//! The on-disk format is a single JSON document:
//!
//! ```json
//! {
//!   "gameServerPort": 6000,
//!   "testToolPort": 6001,
//!   "protocolSeparator": "|",
//!   "commands": ["MOVE", "TURN"],
//!   "ignoreCommands": false,
//!   "specialCharacters": ["$", "%", "&"],
//!   "printLog": true,
//!   "logModeCSV": false,
//!   "tests": [
//!     { "testName": "Drop", "value": "", "duration": 30, "enabled": true }
//!   ]
//! }
//! ```

use crate::error::{Error, Result};
use crate::fault::ScenarioKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shared tool configuration plus the ordered scenario list.
///
/// Loaded once before any connection is created and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
  /// Port the game server listens on (the relay dials this side)
  pub game_server_port: u16,
  /// Port the relay listens on (the game client dials this side)
  pub test_tool_port: u16,
  /// Delimiter marking boundaries inside a message payload
  pub protocol_separator: String,
  /// Substrings marking a message as a protocol command
  pub commands: Vec<String>,
  /// Invert the eligibility gate: transform everything *except* commands
  pub ignore_commands: bool,
  /// Candidate characters for the `SpecialChars` scenario
  pub special_characters: Vec<String>,
  /// Mirror audit entries to stdout
  pub print_log: bool,
  /// Write the audit log as CSV instead of plain text
  #[serde(rename = "logModeCSV")]
  pub log_mode_csv: bool,
  /// Scenarios to run, in order
  pub tests: Vec<ScenarioDefinition>,
}

/// One named fault-injection scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDefinition {
  /// Scenario name, one of the closed catalog in [`ScenarioKind`]
  pub test_name: String,
  /// Free-form value interpreted per scenario (seconds, count, length)
  #[serde(default)]
  pub value: String,
  /// How long the scenario's connection stays open, in seconds
  pub duration: u64,
  /// Disabled scenarios are skipped by the driver
  pub enabled: bool,
}

impl ScenarioDefinition {
  /// Resolve the scenario name against the transformation catalog.
  pub fn kind(&self) -> Result<ScenarioKind> {
    ScenarioKind::from_name(&self.test_name)
      .ok_or_else(|| Error::config(format!("unknown scenario name: {}", self.test_name)))
  }

  /// Audit-log category for this scenario.
  pub fn category(&self) -> String {
    format!("Test_{}", self.test_name)
  }
}

impl ToolConfig {
  /// Load and validate a configuration file.
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
      .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
    let config: ToolConfig = serde_json::from_str(&raw)
      .map_err(|e| Error::config(format!("invalid config {}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
  }

  /// Validate the configuration before any connection is opened.
  ///
  /// Checks every *enabled* scenario: the name must resolve, numeric values
  /// must parse, and separator-dependent scenarios require a non-empty
  /// separator. Disabled scenarios are never run, so they only need a
  /// resolvable name.
  pub fn validate(&self) -> Result<()> {
    for scenario in &self.tests {
      let kind = scenario.kind()?;
      if !scenario.enabled {
        continue;
      }
      kind.validate_value(&scenario.value).map_err(|e| {
        Error::config(format!("scenario {}: {}", scenario.test_name, e))
      })?;
      if kind.needs_separator() && self.protocol_separator.is_empty() {
        return Err(Error::config(format!(
          "scenario {} requires a non-empty protocolSeparator",
          scenario.test_name
        )));
      }
      if matches!(kind, ScenarioKind::SpecialChars) && self.special_characters.is_empty() {
        return Err(Error::config(format!(
          "scenario {} requires at least one entry in specialCharacters",
          scenario.test_name
        )));
      }
    }
    Ok(())
  }

  /// The enabled scenarios, in configured order.
  pub fn enabled_scenarios(&self) -> impl Iterator<Item = &ScenarioDefinition> {
    self.tests.iter().filter(|t| t.enabled)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"{
    "gameServerPort": 6000,
    "testToolPort": 6001,
    "protocolSeparator": "|",
    "commands": ["MOVE", "TURN"],
    "ignoreCommands": false,
    "specialCharacters": ["$", "%", "&"],
    "printLog": false,
    "logModeCSV": true,
    "tests": [
      { "testName": "Relay", "value": "", "duration": 10, "enabled": true },
      { "testName": "Repeat", "value": "3", "duration": 10, "enabled": true },
      { "testName": "Delay", "value": "2", "duration": 10, "enabled": false }
    ]
  }"#;

  #[test]
  fn parses_original_format() {
    let config: ToolConfig = serde_json::from_str(SAMPLE).unwrap();
    assert_eq!(config.game_server_port, 6000);
    assert_eq!(config.test_tool_port, 6001);
    assert_eq!(config.protocol_separator, "|");
    assert_eq!(config.commands, vec!["MOVE", "TURN"]);
    assert!(!config.ignore_commands);
    assert!(config.log_mode_csv);
    assert_eq!(config.tests.len(), 3);
    assert_eq!(config.tests[1].test_name, "Repeat");
    assert_eq!(config.tests[1].value, "3");
    assert!(!config.tests[2].enabled);
    config.validate().unwrap();
  }

  #[test]
  fn rejects_unknown_scenario_name() {
    let mut config: ToolConfig = serde_json::from_str(SAMPLE).unwrap();
    config.tests[0].test_name = "Explode".into();
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }

  #[test]
  fn rejects_non_numeric_value() {
    let mut config: ToolConfig = serde_json::from_str(SAMPLE).unwrap();
    config.tests[1].value = "three".into();
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }

  #[test]
  fn rejects_repeat_below_one() {
    let mut config: ToolConfig = serde_json::from_str(SAMPLE).unwrap();
    config.tests[1].value = "0".into();
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }

  #[test]
  fn disabled_scenarios_skip_value_validation() {
    let mut config: ToolConfig = serde_json::from_str(SAMPLE).unwrap();
    config.tests[2].value = "soon".into();
    config.validate().unwrap();
  }

  #[test]
  fn rejects_empty_separator_for_separator_scenarios() {
    let mut config: ToolConfig = serde_json::from_str(SAMPLE).unwrap();
    config.protocol_separator.clear();
    config.tests[0].test_name = "ProtocolSeparators".into();
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }

  #[test]
  fn rejects_special_chars_without_candidates() {
    let mut config: ToolConfig = serde_json::from_str(SAMPLE).unwrap();
    config.special_characters.clear();
    config.tests[0].test_name = "SpecialChars".into();
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }

  #[test]
  fn scenario_category_is_prefixed() {
    let config: ToolConfig = serde_json::from_str(SAMPLE).unwrap();
    assert_eq!(config.tests[0].category(), "Test_Relay");
  }
}
