//! Multi-key sequence matching with counts and timeouts.
//!
//! The matcher buffers keys while they walk a keymap trie. Time is passed in
//! by the caller, so pending sequences expire deterministically: a deadline
//! is only ever checked against an `Instant` the host provides.

use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::commands::{Command, Invocation};
use crate::key::KeyInput;
use crate::keymap::KeyTrie;

/// Counts saturate here; larger repeats are never useful.
pub const MAX_COUNT: usize = 100_000;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(400);

/// What the matcher decided about the key it was fed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A command is ready to run.
    ///
    /// `consumed` counts the keys of the sequence that formed it. Keys in
    /// `replay` were buffered past the match and must be fed again, in order.
    Matched {
        invocation: Invocation,
        consumed: usize,
        replay: Vec<KeyInput>,
    },
    /// The key extended a prefix or a count; more input is needed.
    Pending,
    /// No binding. `discarded` holds every buffered key that was dropped.
    /// `retry` is a key that must be fed again as the start of a new
    /// sequence.
    Miss {
        discarded: Vec<KeyInput>,
        retry: Option<KeyInput>,
    },
}

/// Buffered input for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingState {
    keys: Vec<KeyInput>,
    count: Option<usize>,
    count_keys: Vec<KeyInput>,
    awaiting: Option<Command>,
    deadline: Option<Instant>,
}

impl PendingState {
    pub fn keys(&self) -> &[KeyInput] {
        &self.keys
    }

    pub fn count(&self) -> Option<usize> {
        self.count
    }

    /// The command waiting for its character argument, if any.
    pub fn awaiting(&self) -> Option<Command> {
        self.awaiting
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_idle(&self) -> bool {
        self.keys.is_empty() && self.count.is_none() && self.awaiting.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Matcher {
    state: PendingState,
    timeout: Duration,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Matcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: PendingState::default(),
            timeout,
        }
    }

    pub fn state(&self) -> &PendingState {
        &self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Drop all buffered input, including the count.
    pub fn reset(&mut self) {
        self.state = PendingState::default();
    }

    /// Feed one key.
    ///
    /// With `collect_counts` unset, digits are ordinary keys (Insert mode).
    pub fn resolve(
        &mut self,
        key: KeyInput,
        trie: &KeyTrie,
        now: Instant,
        collect_counts: bool,
    ) -> Resolution {
        if let Some(command) = self.state.awaiting.take() {
            return self.complete_argument(command, key);
        }

        if collect_counts
            && self.state.keys.is_empty()
            && let Some(digit) = key.digit()
            && (digit != 0 || self.state.count.is_some())
            && (self.state.count.is_some() || trie.get(&key).is_none())
        {
            let count = self
                .state
                .count
                .unwrap_or(0)
                .saturating_mul(10)
                .saturating_add(digit as usize)
                .min(MAX_COUNT);
            self.state.count = Some(count);
            self.state.count_keys.push(key);
            trace!("count now {count}");
            return Resolution::Pending;
        }

        self.state.keys.push(key);
        match trie.walk(&self.state.keys) {
            Some(node) if node.is_prefix() => {
                self.state.deadline = Some(now + self.timeout);
                Resolution::Pending
            }
            Some(node) => match node.command() {
                Some(command) if command.needs_char() => {
                    // Waiting for an argument has no deadline.
                    self.state.deadline = None;
                    self.state.awaiting = Some(command);
                    Resolution::Pending
                }
                Some(command) => {
                    let consumed = self.state.keys.len();
                    self.matched(command, None, consumed, Vec::new())
                }
                // Only reachable with a trie edited after it was walked.
                None => self.miss(trie),
            },
            None => self.miss(trie),
        }
    }

    fn complete_argument(&mut self, command: Command, key: KeyInput) -> Resolution {
        match key.printable() {
            Some(ch) => {
                let consumed = self.state.keys.len() + 1;
                self.matched(command, Some(ch), consumed, Vec::new())
            }
            None => {
                debug!("{} cancelled by {key}", command.name());
                let mut discarded = std::mem::take(&mut self.state.keys);
                discarded.push(key);
                self.state = PendingState::default();
                Resolution::Miss {
                    discarded,
                    retry: None,
                }
            }
        }
    }

    /// The last buffered key diverged from every binding.
    fn miss(&mut self, trie: &KeyTrie) -> Resolution {
        let mut keys = std::mem::take(&mut self.state.keys);
        self.state.deadline = None;
        let Some(diverging) = keys.pop() else {
            return Resolution::Pending;
        };

        if keys.is_empty() {
            // A fresh sequence missed outright.
            let mut discarded = std::mem::take(&mut self.state.count_keys);
            discarded.push(diverging);
            self.state = PendingState::default();
            return Resolution::Miss {
                discarded,
                retry: None,
            };
        }

        // Longest buffered prefix that completes a command on its own.
        let matched = (1..=keys.len()).rev().find_map(|len| {
            trie.walk(&keys[..len])
                .and_then(KeyTrie::command)
                .filter(|command| !command.needs_char())
                .map(|command| (len, command))
        });
        match matched {
            Some((len, command)) => {
                let mut replay = keys.split_off(len);
                replay.push(diverging);
                self.matched(command, None, len, replay)
            }
            None => {
                debug!("sequence {keys:?} discarded, retrying {diverging}");
                Resolution::Miss {
                    discarded: keys,
                    retry: Some(diverging),
                }
            }
        }
    }

    fn matched(
        &mut self,
        command: Command,
        arg: Option<char>,
        consumed: usize,
        replay: Vec<KeyInput>,
    ) -> Resolution {
        let invocation = Invocation {
            command,
            count: self.state.count,
            arg,
        };
        trace!("matched {} {invocation:?}", command.name());
        self.state = PendingState::default();
        Resolution::Matched {
            invocation,
            consumed,
            replay,
        }
    }

    /// Flush a sequence whose deadline passed before `now`.
    ///
    /// A lone key that is also a command runs; anything longer is dropped.
    /// Returns `None` when nothing expired.
    pub fn expire(&mut self, now: Instant, trie: &KeyTrie) -> Option<Resolution> {
        let deadline = self.state.deadline?;
        if now < deadline {
            return None;
        }
        let keys = std::mem::take(&mut self.state.keys);
        self.state.deadline = None;
        if let [key] = keys.as_slice()
            && let Some(command) = trie.get(key).and_then(KeyTrie::command)
        {
            return Some(self.matched(command, None, 1, Vec::new()));
        }
        debug!("pending sequence {keys:?} expired");
        let mut discarded = std::mem::take(&mut self.state.count_keys);
        discarded.extend(keys);
        self.state = PendingState::default();
        Some(Resolution::Miss {
            discarded,
            retry: None,
        })
    }
}
