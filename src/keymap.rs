//! Per-mode keymaps.
//!
//! Each mode owns a [`KeyTrie`]. A node may hold a command and children at
//! the same time, so a key can both complete a command and start a longer
//! sequence; the matcher decides between them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::commands::Command;
use crate::error::KeymapError;
use crate::key::{KeyInput, format_sequence, parse_sequence};
use crate::types::KeymapMode;

/// Command name that removes a default binding.
pub const UNBIND: &str = "no_op";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyTrie {
    command: Option<Command>,
    children: HashMap<KeyInput, KeyTrie>,
}

impl KeyTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `keys` to `command`, replacing any previous binding.
    ///
    /// A command that reads a character argument must be a leaf: it would
    /// swallow the key that continues the longer sequence.
    pub fn bind(&mut self, keys: &[KeyInput], command: Command) -> Result<(), KeymapError> {
        if keys.is_empty() {
            return Err(KeymapError::EmptySequence);
        }
        let conflict = || KeymapError::Conflict {
            sequence: format_sequence(keys),
        };
        let mut node = self;
        for key in keys {
            if node.command.is_some_and(Command::needs_char) {
                return Err(conflict());
            }
            node = node.children.entry(*key).or_default();
        }
        if command.needs_char() && !node.children.is_empty() {
            return Err(conflict());
        }
        node.command = Some(command);
        Ok(())
    }

    /// Remove the binding for `keys` and prune empty branches.
    pub fn unbind(&mut self, keys: &[KeyInput]) {
        let Some((first, rest)) = keys.split_first() else {
            self.command = None;
            return;
        };
        if let Some(child) = self.children.get_mut(first) {
            child.unbind(rest);
            if child.command.is_none() && child.children.is_empty() {
                self.children.remove(first);
            }
        }
    }

    pub fn get(&self, key: &KeyInput) -> Option<&KeyTrie> {
        self.children.get(key)
    }

    /// Follow `keys` from this node.
    pub fn walk(&self, keys: &[KeyInput]) -> Option<&KeyTrie> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn command(&self) -> Option<Command> {
        self.command
    }

    /// Whether longer sequences continue from this node.
    pub fn is_prefix(&self) -> bool {
        !self.children.is_empty()
    }

    /// Every bound sequence below this node, in no particular order.
    pub fn bindings(&self) -> Vec<(Vec<KeyInput>, Command)> {
        let mut out = Vec::new();
        self.collect(&mut Vec::new(), &mut out);
        out
    }

    fn collect(&self, path: &mut Vec<KeyInput>, out: &mut Vec<(Vec<KeyInput>, Command)>) {
        if let Some(command) = self.command {
            out.push((path.clone(), command));
        }
        for (key, child) in &self.children {
            path.push(*key);
            child.collect(path, out);
            path.pop();
        }
    }
}

/// Keymap overrides: mode, then key notation, then command name.
///
/// ```json
/// { "normal": { "g w": "move_next_word_start", "x": "no_op" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeymapConfig(pub BTreeMap<KeymapMode, BTreeMap<String, String>>);

impl KeymapConfig {
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    pub fn bind(&mut self, mode: KeymapMode, keys: &str, command: &str) -> &mut Self {
        self.0
            .entry(mode)
            .or_default()
            .insert(keys.to_string(), command.to_string());
        self
    }
}

/// The keymaps of every mode. Immutable once built and shared between
/// documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymaps {
    maps: HashMap<KeymapMode, KeyTrie>,
}

impl Default for Keymaps {
    fn default() -> Self {
        let mut maps = HashMap::new();
        for mode in KeymapMode::ALL {
            let mut trie = KeyTrie::new();
            for (keys, name) in default_bindings(mode) {
                // Defaults are static and covered by tests.
                if let Err(err) = bind_named(&mut trie, keys, name) {
                    log::error!("bad default binding {keys:?} in {mode:?}: {err}");
                }
            }
            maps.insert(mode, trie);
        }
        Self { maps }
    }
}

fn bind_named(trie: &mut KeyTrie, keys: &str, name: &str) -> Result<(), KeymapError> {
    let sequence = parse_sequence(keys)?;
    if name == UNBIND {
        trie.unbind(&sequence);
        return Ok(());
    }
    let command =
        Command::from_name(name).ok_or_else(|| KeymapError::UnknownCommand(name.to_string()))?;
    trie.bind(&sequence, command)
}

impl Keymaps {
    /// The default keymaps with `config` merged over them.
    pub fn from_config(config: &KeymapConfig) -> Result<Self, KeymapError> {
        let mut keymaps = Self::default();
        for (mode, bindings) in &config.0 {
            let trie = keymaps.maps.entry(*mode).or_default();
            for (keys, name) in bindings {
                bind_named(trie, keys, name)?;
            }
        }
        Ok(keymaps)
    }

    pub fn get(&self, mode: KeymapMode) -> &KeyTrie {
        static EMPTY: std::sync::OnceLock<KeyTrie> = std::sync::OnceLock::new();
        self.maps
            .get(&mode)
            .unwrap_or_else(|| EMPTY.get_or_init(KeyTrie::new))
    }

    pub fn bind(&mut self, mode: KeymapMode, keys: &[KeyInput], command: Command) -> Result<(), KeymapError> {
        self.maps.entry(mode).or_default().bind(keys, command)
    }
}

const MOTIONS: &[(&str, &str)] = &[
    ("h", "move_char_left"),
    ("left", "move_char_left"),
    ("l", "move_char_right"),
    ("right", "move_char_right"),
    ("j", "move_line_down"),
    ("down", "move_line_down"),
    ("k", "move_line_up"),
    ("up", "move_line_up"),
    ("w", "move_next_word_start"),
    ("b", "move_prev_word_start"),
    ("e", "move_next_word_end"),
    ("0", "goto_line_start"),
    ("home", "goto_line_start"),
    ("$", "goto_line_end"),
    ("end", "goto_line_end"),
    ("^", "goto_first_nonwhitespace"),
    ("g h", "goto_line_start"),
    ("g l", "goto_line_end"),
    ("g s", "goto_first_nonwhitespace"),
    ("g g", "goto_file_start"),
    ("g e", "goto_last_line"),
    ("G", "goto_last_line"),
    ("f", "find_next_char"),
    ("t", "till_next_char"),
    ("F", "find_prev_char"),
    ("T", "till_prev_char"),
];

const SELECTION: &[(&str, &str)] = &[
    (";", "collapse_selection"),
    ("A-;", "flip_selections"),
    (",", "keep_primary_selection"),
    ("C", "copy_selection_on_next_line"),
    (")", "rotate_selections_forward"),
    ("(", "rotate_selections_backward"),
    ("%", "select_all"),
    ("A-s", "split_selection_on_newline"),
];

const EDITING: &[(&str, &str)] = &[
    ("i", "insert_mode"),
    ("a", "append_mode"),
    ("I", "insert_at_line_start"),
    ("A", "insert_at_line_end"),
    ("o", "open_below"),
    ("O", "open_above"),
    ("d", "delete"),
    ("c", "change"),
    ("y", "yank"),
    ("D", "delete_to_line_end"),
    ("x", "delete_char_forward"),
    ("del", "delete_char_forward"),
    ("X", "delete_char_backward"),
    ("r", "replace_char"),
    ("J", "join_lines"),
    ("p", "paste_after"),
    ("P", "paste_before"),
    ("u", "undo"),
    ("U", "redo"),
    ("C-r", "redo"),
    (".", "repeat_last_change"),
    ("\"", "select_register"),
    ("Q", "record_macro"),
    ("q", "replay_macro"),
];

const INSERT: &[(&str, &str)] = &[
    ("esc", "normal_mode"),
    ("ret", "insert_newline"),
    ("tab", "insert_tab"),
    ("backspace", "delete_char_backward"),
    ("del", "delete_char_forward"),
    ("C-w", "delete_word_backward"),
    ("left", "move_char_left"),
    ("right", "move_char_right"),
    ("up", "move_line_up"),
    ("down", "move_line_down"),
    ("home", "goto_line_start"),
    ("end", "goto_line_end"),
];

const OPERATOR: &[(&str, &str)] = &[
    ("i w", "select_inner_word"),
    ("a w", "select_around_word"),
    ("d", "select_line"),
    ("c", "select_line"),
    ("y", "select_line"),
    ("esc", "normal_mode"),
];

fn default_bindings(mode: KeymapMode) -> Vec<(&'static str, &'static str)> {
    match mode {
        KeymapMode::Normal => MOTIONS
            .iter()
            .chain(SELECTION)
            .chain(EDITING)
            .chain(&[("v", "select_mode"), ("esc", "normal_mode")])
            .copied()
            .collect(),
        KeymapMode::Select => MOTIONS
            .iter()
            .chain(SELECTION)
            .chain(EDITING)
            .chain(&[("v", "normal_mode"), ("esc", "normal_mode")])
            .copied()
            .collect(),
        KeymapMode::Insert => INSERT.to_vec(),
        KeymapMode::Operator => MOTIONS.iter().chain(OPERATOR).copied().collect(),
    }
}
