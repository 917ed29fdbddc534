use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keymap::{KeymapConfig, Keymaps};
use crate::register::{BLACKHOLE, UNNAMED};

/// Engine-wide settings.
///
/// Every field has a default, so a partial configuration file only needs to
/// name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a pending multi-key sequence waits for its next key.
    pub sequence_timeout_ms: u64,
    /// Nesting limit for macros replaying macros.
    pub max_macro_depth: usize,
    /// Register names shared by every document.
    pub global_registers: String,
    pub tab_width: usize,
    /// Insert spaces instead of a tab character.
    pub expand_tab: bool,
    pub keymap: KeymapConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sequence_timeout_ms: 400,
            max_macro_depth: 16,
            global_registers: "*+".to_string(),
            tab_width: 4,
            expand_tab: true,
            keymap: KeymapConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn sequence_timeout(&self) -> Duration {
        Duration::from_millis(self.sequence_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequence_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some(bad) = self
            .global_registers
            .chars()
            .find(|&c| c == UNNAMED || c == BLACKHOLE || c.is_whitespace() || c.is_control())
        {
            return Err(ConfigError::InvalidRegister(bad));
        }
        Ok(())
    }

    pub fn global_register_names(&self) -> Vec<char> {
        self.global_registers.chars().collect()
    }

    pub fn build_keymaps(&self) -> Result<Keymaps, ConfigError> {
        Ok(Keymaps::from_config(&self.keymap)?)
    }

    /// The text `insert_tab` inserts.
    pub fn indent_unit(&self) -> String {
        if self.expand_tab {
            " ".repeat(self.tab_width.max(1))
        } else {
            "\t".to_string()
        }
    }
}
