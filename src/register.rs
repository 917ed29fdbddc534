//! Registers: named slots for yanked text and recorded macros.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::trace;

use crate::key::KeyInput;
use crate::traits::Clipboard;

/// Written by every yank and delete.
pub const UNNAMED: char = '"';
/// Discards whatever is written to it.
pub const BLACKHOLE: char = '_';
/// Default target for macro recording and replay.
pub const DEFAULT_MACRO: char = '@';
/// Mirrored into the system clipboard when one is attached.
pub const CLIPBOARD: char = '+';

/// Contents of a register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterValue {
    /// One fragment per contributing selection, in selection order.
    Text(Vec<String>),
    /// A recorded raw key stream.
    Macro(Vec<KeyInput>),
}

#[derive(Default)]
struct GlobalStore {
    values: HashMap<char, RegisterValue>,
    clipboard: Option<Box<dyn Clipboard + Send>>,
}

/// Registers shared by every document in the process.
///
/// Cloning yields another handle to the same store. Writes are last-writer-wins.
#[derive(Clone, Default)]
pub struct GlobalRegisters {
    inner: Arc<Mutex<GlobalStore>>,
}

impl std::fmt::Debug for GlobalRegisters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.lock();
        f.debug_struct("GlobalRegisters")
            .field("values", &store.values)
            .field("clipboard", &store.clipboard.is_some())
            .finish()
    }
}

impl GlobalRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a clipboard backing the `+` register.
    pub fn with_clipboard(self, clipboard: Box<dyn Clipboard + Send>) -> Self {
        self.lock().clipboard = Some(clipboard);
        self
    }

    fn lock(&self) -> MutexGuard<'_, GlobalStore> {
        // A panic while holding the lock cannot leave the map half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, name: char) -> Option<RegisterValue> {
        let mut store = self.lock();
        if name == CLIPBOARD
            && let Some(text) = store.clipboard.as_mut().and_then(|c| c.get())
        {
            let stale = match store.values.get(&name) {
                Some(RegisterValue::Text(fragments)) => fragments.join("\n") != text,
                _ => true,
            };
            if stale {
                return Some(RegisterValue::Text(vec![text]));
            }
        }
        store.values.get(&name).cloned()
    }

    pub fn set(&self, name: char, value: RegisterValue) {
        let mut store = self.lock();
        if name == CLIPBOARD
            && let (Some(clipboard), RegisterValue::Text(fragments)) =
                (store.clipboard.as_mut(), &value)
        {
            clipboard.set(fragments.join("\n"));
        }
        store.values.insert(name, value);
    }
}

/// The register set of one document.
#[derive(Debug, Clone)]
pub struct Registers {
    local: HashMap<char, RegisterValue>,
    global: GlobalRegisters,
    global_names: Vec<char>,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(GlobalRegisters::new(), vec!['*', CLIPBOARD])
    }
}

impl Registers {
    pub fn new(global: GlobalRegisters, global_names: Vec<char>) -> Self {
        Self {
            local: HashMap::new(),
            global,
            global_names,
        }
    }

    pub fn is_global(&self, name: char) -> bool {
        self.global_names.contains(&name)
    }

    pub fn get(&self, name: char) -> Option<RegisterValue> {
        if name == BLACKHOLE {
            return None;
        }
        if self.is_global(name) {
            self.global.get(name)
        } else {
            self.local.get(&name).cloned()
        }
    }

    fn set(&mut self, name: char, value: RegisterValue) {
        if name == BLACKHOLE {
            return;
        }
        if self.is_global(name) {
            self.global.set(name, value);
        } else {
            self.local.insert(name, value);
        }
    }

    /// Overwrite `name` with `fragments`. The unnamed register is updated too
    /// unless writing to the blackhole.
    pub fn yank(&mut self, name: char, fragments: Vec<String>) {
        if name == BLACKHOLE {
            return;
        }
        trace!("yank {} fragment(s) into {name:?}", fragments.len());
        if name != UNNAMED {
            self.set(UNNAMED, RegisterValue::Text(fragments.clone()));
        }
        self.set(name, RegisterValue::Text(fragments));
    }

    /// Text fragments held by `name`, if it holds text.
    pub fn fragments(&self, name: char) -> Option<Vec<String>> {
        match self.get(name)? {
            RegisterValue::Text(fragments) => Some(fragments),
            RegisterValue::Macro(_) => None,
        }
    }

    pub fn set_macro(&mut self, name: char, keys: Vec<KeyInput>) {
        trace!("recorded {} key(s) into {name:?}", keys.len());
        self.set(name, RegisterValue::Macro(keys));
    }

    /// Keys recorded into `name`, if it holds a macro.
    pub fn macro_keys(&self, name: char) -> Option<Vec<KeyInput>> {
        match self.get(name)? {
            RegisterValue::Macro(keys) => Some(keys),
            RegisterValue::Text(_) => None,
        }
    }
}
