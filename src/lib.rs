//! A selection-first modal editing engine.
//!
//! Hosts feed raw key events through [`Engine::push_event`]; the engine
//! resolves them against per-mode keymaps, edits its own copy of the
//! document and mirrors every change back through [`DocumentHost`].

pub mod buffer;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod key;
pub mod keymap;
pub mod matcher;
pub mod movement;
pub mod register;
pub mod selection;
pub mod traits;
pub mod transaction;
pub mod types;

pub use crate::buffer::Buffer;
pub use crate::commands::{Command, Invocation};
pub use crate::config::EngineConfig;
pub use crate::engine::{Document, Editor, EditorSnapshot, Engine, EngineBuilder};
pub use crate::error::{ConfigError, EditError, KeymapError};
pub use crate::history::History;
pub use crate::key::{KeyCode, KeyInput, Modifiers, RawKeyEvent, parse_sequence};
pub use crate::keymap::{KeyTrie, KeymapConfig, Keymaps};
pub use crate::matcher::{Matcher, Resolution};
pub use crate::register::{GlobalRegisters, RegisterValue, Registers};
pub use crate::selection::{Range, Selection};
#[cfg(feature = "clipboard")]
pub use crate::traits::SystemClipboard;
pub use crate::traits::{Clipboard, DocumentHost};
pub use crate::transaction::{Change, ChangeSet, Transaction};
pub use crate::types::{DocumentId, FocusContext, KeymapMode, Mode, Operator};
