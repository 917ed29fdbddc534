use thiserror::Error;

/// Errors raised while building keymaps from configuration data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeymapError {
    #[error("invalid key notation: {0:?}")]
    InvalidKey(String),

    #[error("empty key sequence")]
    EmptySequence,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// A command taking a character argument cannot also be a prefix.
    #[error("binding {sequence:?} conflicts with a command awaiting a character")]
    Conflict { sequence: String },
}

/// Contract violations detected while applying a transaction.
///
/// These indicate a bug in a command implementation. The engine aborts the
/// transaction and keeps the pre-transform state when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("inconsistent selection: {reason}")]
    InconsistentSelection { reason: String },

    #[error("change {from}..{to} out of bounds for buffer of {len} chars")]
    ChangeOutOfBounds { from: usize, to: usize, len: usize },

    #[error("changes unordered or overlapping at offset {at}")]
    OverlappingChanges { at: usize },
}

/// Engine configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sequence timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid global register name: {0:?}")]
    InvalidRegister(char),

    #[error(transparent)]
    Keymap(#[from] KeymapError),
}

pub type Result<T, E = EditError> = std::result::Result<T, E>;
