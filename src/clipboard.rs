use crate::error::ClipboardError;

/// Places `text` on the system clipboard.
#[cfg(not(target_arch = "wasm32"))]
pub fn copy_text(text: &str) -> Result<(), ClipboardError> {
    let mut clipboard = arboard::Clipboard::new().map_err(|err| {
        tracing::warn!("clipboard unavailable: {}", err);
        ClipboardError::new(err.to_string())
    })?;
    clipboard.set_text(text.to_owned()).map_err(|err| {
        tracing::warn!("clipboard write failed: {}", err);
        ClipboardError::new(err.to_string())
    })
}

#[cfg(target_arch = "wasm32")]
pub fn copy_text(_text: &str) -> Result<(), ClipboardError> {
    Err(ClipboardError::new("no system clipboard in the browser"))
}
