use crate::error::{EmoteError, Result};
use arboard::{Clipboard, ImageData};
use tracing::debug;

fn clipboard_error(err: arboard::Error) -> EmoteError {
    EmoteError::Clipboard(err.to_string())
}

/// The operations a paste needs from a clipboard.
pub trait ClipboardAccess {
    fn read_text(&mut self) -> Option<String>;
    fn read_image(&mut self) -> Option<ImageData<'static>>;
    fn write_text(&mut self, text: &str) -> Result<()>;
    fn write_image(&mut self, image: ImageData<'static>) -> Result<()>;
    fn wipe(&mut self) -> Result<()>;
}

impl ClipboardAccess for Clipboard {
    fn read_text(&mut self) -> Option<String> {
        self.get_text().ok()
    }

    fn read_image(&mut self) -> Option<ImageData<'static>> {
        self.get_image().ok()
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        self.set_text(text).map_err(clipboard_error)
    }

    fn write_image(&mut self, image: ImageData<'static>) -> Result<()> {
        self.set_image(image).map_err(clipboard_error)
    }

    fn wipe(&mut self) -> Result<()> {
        self.clear().map_err(clipboard_error)
    }
}

fn open_clipboard() -> Result<Clipboard> {
    Clipboard::new().map_err(clipboard_error)
}

/// Set the clipboard content as text
pub fn set_clipboard_text(text: &str) -> Result<()> {
    open_clipboard()?.write_text(text)
}

#[derive(Debug, Clone)]
enum Contents {
    Text(String),
    Image(ImageData<'static>),
    Empty,
}

/// Clipboard contents captured before a paste, put back afterwards.
///
/// Text and images survive the round trip. Other formats are lost.
#[derive(Debug, Clone)]
pub struct ClipboardSnapshot {
    contents: Contents,
}

impl ClipboardSnapshot {
    /// Check that the clipboard is reachable and remember what it holds.
    pub fn capture() -> Result<Self> {
        Ok(Self::capture_from(&mut open_clipboard()?))
    }

    pub fn capture_from(clipboard: &mut impl ClipboardAccess) -> Self {
        let contents = if let Some(text) = clipboard.read_text() {
            Contents::Text(text)
        } else if let Some(image) = clipboard.read_image() {
            Contents::Image(image)
        } else {
            Contents::Empty
        };
        Self { contents }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.contents, Contents::Empty)
    }

    /// Put the captured contents back. Whatever another application copied in
    /// the meantime is overwritten.
    pub fn restore(self) -> Result<()> {
        self.restore_to(&mut open_clipboard()?)
    }

    pub fn restore_to(self, clipboard: &mut impl ClipboardAccess) -> Result<()> {
        let result = match self.contents {
            Contents::Text(text) => clipboard.write_text(&text),
            Contents::Image(image) => clipboard.write_image(image),
            Contents::Empty => clipboard.wipe(),
        };
        debug!(ok = result.is_ok(), "clipboard restored");
        result
    }
}
