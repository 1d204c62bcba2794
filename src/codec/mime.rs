use std::path::Path;

/// Fallback for files whose extension is unknown; never passes validation
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// Guesses a MIME type from a file's extension, the way a browser labels
/// a picked file before it is read.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("svg") => "image/svg+xml",
        _ => UNKNOWN_MIME_TYPE,
    }
}
