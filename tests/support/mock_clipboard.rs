use std::sync::{Arc, Mutex};

use modal_mini::traits::Clipboard;

/// In-memory clipboard. Clones share the same content, so a test can keep a
/// handle after giving one to the engine.
#[derive(Default, Debug, Clone)]
pub struct MockClipboard {
    content: Arc<Mutex<Option<String>>>,
}

impl MockClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> Option<String> {
        self.content.lock().unwrap().clone()
    }

    pub fn put(&self, text: &str) {
        *self.content.lock().unwrap() = Some(text.to_string());
    }
}

impl Clipboard for MockClipboard {
    fn get(&mut self) -> Option<String> {
        self.content()
    }

    fn set(&mut self, text: String) {
        *self.content.lock().unwrap() = Some(text);
    }
}
