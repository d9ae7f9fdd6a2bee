//! Centralized filename handling for the pairing convention.
//!
//! Two directories of images are paired by *base name*: the filename with its
//! extension removed, compared case-insensitively. Paired files are then
//! renamed to a shared sequence name so downstream tooling never sees the
//! original names:
//!
//! - `IMG_0042.JPG` + `img_0042.png` → base name `img_0042` (folded)
//! - 1st pair → `0001.JPG`, 2nd pair → `0002.png`, 10000th pair → `10000.tif`
//!
//! The sequence name always keeps the extension of the "before" file, with
//! its original case.

use std::path::Path;

/// Image extensions accepted on either side, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Minimum width of a sequence number. Wider numbers are never truncated.
pub const SEQUENCE_WIDTH: usize = 4;

/// Filename without its extension (`"a.b.jpg"` → `"a.b"`).
///
/// Dotfiles like `.jpg` have no extension, so the whole name is the base.
pub fn base_name(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

/// Extension including the leading dot, original case (`"a.JPG"` → `".JPG"`).
///
/// Returns an empty string when the name has no extension.
pub fn dotted_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Whether the filename carries one of [`IMAGE_EXTENSIONS`].
pub fn is_image_filename(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ok| e.eq_ignore_ascii_case(ok)))
        .unwrap_or(false)
}

/// MIME type sent for an image file, by extension.
pub fn mime_type(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Key used to pair files across directories.
pub fn pairing_key(filename: &str) -> String {
    base_name(filename).to_lowercase()
}

/// Render a 1-based sequence index plus extension: `(7, ".png")` → `"0007.png"`.
pub fn sequence_name(index: usize, extension: &str) -> String {
    format!("{index:0>width$}{extension}", width = SEQUENCE_WIDTH)
}

/// Whether a filename uses only ASCII letters, digits, `_`, `-` and `.`.
///
/// Names that fail this check still pair fine; the check exists so callers
/// can warn about names the inference backend may mangle.
pub fn is_standard_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
