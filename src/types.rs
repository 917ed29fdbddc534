use serde::{Deserialize, Serialize};

/// Operators that wait for a motion or textobject before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Delete,
    Change,
    Yank,
}

/// The current mode of a document's engine.
///
/// The same keys perform different actions depending on the current mode.
/// Mode changes are only ever the declared effect of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Normal mode - for navigation and operators.
    #[default]
    Normal,
    /// Insert mode - for typing text.
    Insert,
    /// Select mode - motions extend the selections.
    Select,
    /// An operator is waiting for its motion or textobject.
    PendingOperator(Operator),
}

impl Mode {
    /// The keymap consulted while in this mode.
    pub fn keymap_mode(self) -> KeymapMode {
        match self {
            Mode::Normal => KeymapMode::Normal,
            Mode::Insert => KeymapMode::Insert,
            Mode::Select => KeymapMode::Select,
            Mode::PendingOperator(_) => KeymapMode::Operator,
        }
    }
}

/// Identifies one of the per-mode keymaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeymapMode {
    Normal,
    Insert,
    Select,
    Operator,
}

impl KeymapMode {
    pub const ALL: [KeymapMode; 4] = [
        KeymapMode::Normal,
        KeymapMode::Insert,
        KeymapMode::Select,
        KeymapMode::Operator,
    ];
}

/// Where keyboard focus was when the host received an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusContext {
    /// An editable document owned by this engine.
    Document,
    /// A document that cannot be edited (viewer, diff pane).
    ReadOnlyDocument,
    /// Some other UI element: tool window, dialog, search field.
    Other,
}

impl FocusContext {
    pub fn is_editable(self) -> bool {
        matches!(self, FocusContext::Document)
    }
}

/// Host-side handle for an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);
