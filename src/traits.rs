use crate::selection::Range;

/// The narrow view of a host document the engine works through.
///
/// Offsets are char offsets. The engine never touches host UI directly;
/// everything it changes is pushed through these four calls.
pub trait DocumentHost {
    fn get_text(&self) -> String;

    /// Replace the chars in `from..to` with `text`.
    fn replace(&mut self, from: usize, to: usize, text: &str);

    fn set_selections(&mut self, ranges: &[Range], primary: usize);
    fn get_selections(&self) -> Vec<Range>;
}

pub trait Clipboard {
    fn get(&mut self) -> Option<String>;
    fn set(&mut self, text: String);
}

/// System clipboard through `arboard`.
#[cfg(feature = "clipboard")]
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    pub fn new() -> Option<Self> {
        match arboard::Clipboard::new() {
            Ok(inner) => Some(Self { inner }),
            Err(err) => {
                log::warn!("system clipboard unavailable: {err}");
                None
            }
        }
    }
}

#[cfg(feature = "clipboard")]
impl Clipboard for SystemClipboard {
    fn get(&mut self) -> Option<String> {
        self.inner.get_text().ok()
    }

    fn set(&mut self, text: String) {
        if let Err(err) = self.inner.set_text(text) {
            log::warn!("failed to write system clipboard: {err}");
        }
    }
}
