//! Shared types used across the upload pipeline.
//!
//! Everything here is transient and in-memory: a [`SourceFile`] comes in
//! from a file picker (or the CLI), an [`OutputFile`] goes out to the
//! upload form, and [`Notice`]s carry the user-facing feedback in between.

use crate::imaging::Quality;
use crate::naming;
use serde::Serialize;
use std::path::Path;
use std::time::SystemTime;

/// Declared MIME type for a filename, the way a browser file picker reports it.
///
/// Unknown extensions map to `application/octet-stream`.
pub fn mime_for_name(filename: &str) -> &'static str {
    match naming::extension(filename).as_deref() {
        Some("jpg" | "jpeg" | "jfif") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("tif" | "tiff") => "image/tiff",
        Some("avif") => "image/avif",
        Some("heic") => "image/heic",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// A raw file selected by the user. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    /// Declared MIME type (not sniffed from content).
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, declaring its MIME type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_for_name(&name);
        Ok(Self::new(name, mime, bytes))
    }

    /// Declared byte size.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// The file handed back to the caller for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub last_modified: SystemTime,
}

impl OutputFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Copy of the source bytes, untouched, with a fresh timestamp.
    pub fn passthrough(source: &SourceFile) -> Self {
        Self {
            name: source.name.clone(),
            mime: source.mime.clone(),
            bytes: source.bytes.clone(),
            last_modified: SystemTime::now(),
        }
    }

    /// Copy of the source bytes under the `.jpg` output name.
    ///
    /// The declared MIME type stays the source's: the bytes are untouched.
    pub fn renamed_copy(source: &SourceFile) -> Self {
        Self {
            name: naming::jpeg_output_name(&source.name),
            ..Self::passthrough(source)
        }
    }
}

/// One pass of the re-encode loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EncodingAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    pub quality: Quality,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A transient user-facing message (a toast, in the storefront).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Human-readable byte size (`1.5 MB`, `512 KB`, `900 B`), binary units.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.0} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}
