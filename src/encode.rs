// Image payload encoding. The register endpoint takes plain base64, the
// verify endpoint takes a data URI.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Error, Result};

/// MIME type used for unknown or missing extensions.
pub const FALLBACK_MIME: &str = "image/jpeg";

/// Guess an image MIME type from the file extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        _ => FALLBACK_MIME,
    }
}

/// Read the whole file and return it as standard base64.
pub fn encode_base64(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(STANDARD.encode(bytes))
}

/// Read the whole file and return it as a `data:<mime>;base64,` URI.
pub fn encode_data_uri(path: &Path) -> Result<String> {
    let b64 = encode_base64(path)?;
    Ok(format!("data:{};base64,{}", guess_mime(path), b64))
}
