use std::cell::RefCell;
use std::rc::Rc;

use modal_mini::selection::Range;
use modal_mini::traits::DocumentHost;
use ropey::Rope;

#[derive(Debug, Default)]
pub struct HostState {
    pub rope: Rope,
    pub selections: Vec<Range>,
    pub primary: usize,
    pub replace_calls: usize,
}

/// Rope-backed host document. Clones share state, so tests can inspect what
/// the engine pushed after boxing one clone into it.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    state: Rc<RefCell<HostState>>,
}

impl MockHost {
    pub fn new(text: &str) -> Self {
        let host = Self::default();
        {
            let mut state = host.state.borrow_mut();
            state.rope = Rope::from_str(text);
            state.selections = vec![Range::point(0)];
        }
        host
    }

    pub fn text(&self) -> String {
        self.state.borrow().rope.to_string()
    }

    pub fn selections(&self) -> Vec<Range> {
        self.state.borrow().selections.clone()
    }

    pub fn primary(&self) -> usize {
        self.state.borrow().primary
    }

    pub fn replace_calls(&self) -> usize {
        self.state.borrow().replace_calls
    }

    /// Edit the text the way a user typing outside the engine would.
    pub fn set_text(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        state.rope = Rope::from_str(text);
        let len = state.rope.len_chars();
        for range in &mut state.selections {
            *range = range.clamp(len);
        }
    }

    pub fn select(&self, ranges: Vec<Range>) {
        self.state.borrow_mut().selections = ranges;
    }

    pub fn boxed(&self) -> Box<dyn DocumentHost> {
        Box::new(self.clone())
    }
}

impl DocumentHost for MockHost {
    fn get_text(&self) -> String {
        self.text()
    }

    fn replace(&mut self, from: usize, to: usize, text: &str) {
        let mut state = self.state.borrow_mut();
        state.replace_calls += 1;
        state.rope.remove(from..to);
        state.rope.insert(from, text);
    }

    fn set_selections(&mut self, ranges: &[Range], primary: usize) {
        let mut state = self.state.borrow_mut();
        state.selections = ranges.to_vec();
        state.primary = primary;
    }

    fn get_selections(&self) -> Vec<Range> {
        self.selections()
    }
}
