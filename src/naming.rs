//! Output filename rules.
//!
//! Every successfully re-encoded file is JPEG, so its name keeps the
//! original base name and always ends in `.jpg`:
//! - `photo.png` → `photo.jpg`
//! - `Banner.Summer.WEBP` → `Banner.Summer.jpg`
//! - `scan` → `scan.jpg`
//!
//! Only the last extension is replaced. Directory components (some pickers
//! and the CLI hand over full paths) are stripped.

/// Extension every re-encoded file ends up with.
pub const JPEG_EXTENSION: &str = "jpg";

/// Base name of a file: no directories, last extension removed.
///
/// A leading dot is part of the name, not an extension (`.hidden` stays
/// `.hidden`). An empty result falls back to `"image"`.
pub fn base_name(filename: &str) -> &str {
    let file = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let stem = match file.rfind('.') {
        Some(0) | None => file,
        Some(dot) => &file[..dot],
    };
    if stem.is_empty() { "image" } else { stem }
}

/// Name for a re-encoded JPEG produced from `original`.
pub fn jpeg_output_name(original: &str) -> String {
    format!("{}.{}", base_name(original), JPEG_EXTENSION)
}

/// Lowercased extension of `filename`, if it has one.
pub fn extension(filename: &str) -> Option<String> {
    let file = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match file.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(file[dot + 1..].to_ascii_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_becomes_jpg() {
        assert_eq!(jpeg_output_name("photo.png"), "photo.jpg");
    }

    #[test]
    fn jpeg_normalized_to_jpg() {
        assert_eq!(jpeg_output_name("DSC_0001.JPEG"), "DSC_0001.jpg");
    }

    #[test]
    fn only_last_extension_replaced() {
        assert_eq!(jpeg_output_name("Banner.Summer.webp"), "Banner.Summer.jpg");
    }

    #[test]
    fn no_extension_gets_one() {
        assert_eq!(jpeg_output_name("scan"), "scan.jpg");
    }

    #[test]
    fn directories_are_stripped() {
        assert_eq!(jpeg_output_name("uploads/2024/photo.png"), "photo.jpg");
        assert_eq!(jpeg_output_name(r"C:\fakepath\photo.gif"), "photo.jpg");
    }

    #[test]
    fn dotfile_is_a_name() {
        assert_eq!(jpeg_output_name(".hidden"), ".hidden.jpg");
    }

    #[test]
    fn empty_name_falls_back() {
        assert_eq!(jpeg_output_name(""), "image.jpg");
        assert_eq!(jpeg_output_name("dir/"), "image.jpg");
    }

    #[test]
    fn extension_lowercased() {
        assert_eq!(extension("a/B.PNG").as_deref(), Some("png"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension(".hidden"), None);
    }
}
