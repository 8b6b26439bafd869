//! Configuration management
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.
//! The touch-combination assignments defined here are what the registry in
//! [`crate::touch`] is rebuilt from on every reload.

pub mod watcher;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::touch::{SlotBinding, TouchCommand};

pub use watcher::{BindingWatcher, CommandRegistry};

/// Number of assignable touch-combination slots (one per built-in pattern)
pub const COMBINATION_SLOTS: usize = 37;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,

    /// Forward the device's own log messages to the host log
    #[serde(default)]
    pub device_logging: bool,

    /// Per-slot touch-combination assignments; unlisted slots are off
    #[serde(default)]
    pub touch_combinations: Vec<TouchComboConfig>,
}

/// MIDI port configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    pub input_port: String,
    pub output_port: String,
}

/// Assignment of one touch-combination slot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TouchComboConfig {
    pub slot: usize,
    pub function: SlotFunction,
    /// Command name, required when `function` is `command`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// What a combination slot does
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotFunction {
    Off,
    Shift,
    Command,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.is_empty() {
            anyhow::bail!("MIDI input_port cannot be empty");
        }
        if self.midi.output_port.is_empty() {
            anyhow::bail!("MIDI output_port cannot be empty");
        }

        let mut seen = std::collections::HashSet::new();
        for combo in &self.touch_combinations {
            if combo.slot >= COMBINATION_SLOTS {
                anyhow::bail!(
                    "Touch combination slot {} is invalid (must be 0-{})",
                    combo.slot,
                    COMBINATION_SLOTS - 1
                );
            }
            if !seen.insert(combo.slot) {
                anyhow::bail!("Touch combination slot {} assigned twice", combo.slot);
            }
            if combo.function == SlotFunction::Command && combo.command.is_none() {
                anyhow::bail!(
                    "Touch combination slot {} has function 'command' but no command name",
                    combo.slot
                );
            }
        }

        Ok(())
    }

    /// Resolve the per-slot assignments into matcher bindings. A command
    /// name the resolver does not know degrades that slot to off with a
    /// warning; configuration must not take the surface down.
    pub fn slot_bindings(
        &self,
        resolve: impl Fn(&str) -> Option<Arc<dyn TouchCommand>>,
    ) -> Vec<SlotBinding> {
        let mut bindings = vec![SlotBinding::Off; COMBINATION_SLOTS];
        for combo in &self.touch_combinations {
            let Some(slot) = bindings.get_mut(combo.slot) else {
                continue;
            };
            *slot = match combo.function {
                SlotFunction::Off => SlotBinding::Off,
                SlotFunction::Shift => SlotBinding::Shift,
                SlotFunction::Command => {
                    let name = combo.command.as_deref().unwrap_or_default();
                    match resolve(name) {
                        Some(command) => SlotBinding::Command(command),
                        None => {
                            warn!("Unknown touch command '{}', slot {} disabled", name, combo.slot);
                            SlotBinding::Off
                        }
                    }
                }
            };
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touch::ButtonEvent;

    fn parse(yaml: &str) -> AppConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    const BASE: &str = r#"
midi:
  input_port: "Electra Controller"
  output_port: "Electra Controller"
"#;

    #[test]
    fn test_minimal_config() {
        let config = parse(BASE);
        config.validate().unwrap();
        assert!(!config.device_logging);
        assert!(config.touch_combinations.is_empty());
    }

    #[test]
    fn test_combination_parsing_and_bindings() {
        let config = parse(
            r#"
midi:
  input_port: "in"
  output_port: "out"
device_logging: true
touch_combinations:
  - slot: 0
    function: shift
  - slot: 21
    function: command
    command: "marker"
  - slot: 3
    function: off
"#,
        );
        config.validate().unwrap();

        struct Noop;
        impl TouchCommand for Noop {
            fn name(&self) -> &str {
                "marker"
            }
            fn execute(&self, _event: ButtonEvent) {}
        }

        let bindings = config.slot_bindings(|name| {
            (name == "marker").then(|| Arc::new(Noop) as Arc<dyn TouchCommand>)
        });
        assert_eq!(bindings.len(), COMBINATION_SLOTS);
        assert!(matches!(bindings[0], SlotBinding::Shift));
        assert!(matches!(bindings[21], SlotBinding::Command(_)));
        assert!(matches!(bindings[3], SlotBinding::Off));
        assert!(matches!(bindings[1], SlotBinding::Off));
    }

    #[test]
    fn test_unknown_command_degrades_to_off() {
        let config = parse(
            r#"
midi:
  input_port: "in"
  output_port: "out"
touch_combinations:
  - slot: 5
    function: command
    command: "nope"
"#,
        );
        let bindings = config.slot_bindings(|_| None);
        assert!(matches!(bindings[5], SlotBinding::Off));
    }

    #[test]
    fn test_invalid_slot_rejected() {
        let config = parse(
            r#"
midi:
  input_port: "in"
  output_port: "out"
touch_combinations:
  - slot: 37
    function: shift
"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_command_without_name_rejected() {
        let config = parse(
            r#"
midi:
  input_port: "in"
  output_port: "out"
touch_combinations:
  - slot: 2
    function: command
"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let config = parse(
            r#"
midi:
  input_port: "in"
  output_port: "out"
touch_combinations:
  - slot: 2
    function: shift
  - slot: 2
    function: shift
"#,
        );
        assert!(config.validate().is_err());
    }
}
