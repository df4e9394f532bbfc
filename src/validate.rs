//! Pre-flight checks on a file selection.
//!
//! Runs before any decoding: a file with the wrong declared type or an
//! oversized byte count is rejected here and never reaches the backend.
//! A cancelled picker (empty selection) is not an error.

use crate::types::{Notice, SourceFile, format_bytes};
use thiserror::Error;

/// What a given upload slot accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    pub max_file_bytes: u64,
    pub accepted_types: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{name}: unsupported file type {mime}")]
    UnsupportedType { name: String, mime: String },
    #[error("{name}: file is {size} bytes, limit is {max} bytes")]
    TooLarge { name: String, size: u64, max: u64 },
}

impl ValidationError {
    /// Error toast shown instead of queuing the file.
    pub fn notice(&self) -> Notice {
        match self {
            ValidationError::UnsupportedType { name, mime } => {
                Notice::error(format!("{name} ({mime}) is not a supported image type."))
            }
            ValidationError::TooLarge { name, max, .. } => Notice::error(format!(
                "{name} is too large. Maximum size is {}.",
                format_bytes(*max)
            )),
        }
    }
}

/// Check the first file of a selection against `constraints`.
///
/// Returns `Ok(None)` when nothing was selected. The type check runs before
/// the size check.
pub fn validate<'a>(
    selection: &'a [SourceFile],
    constraints: &Constraints,
) -> Result<Option<&'a SourceFile>, ValidationError> {
    let Some(file) = selection.first() else {
        return Ok(None);
    };

    let accepted = constraints
        .accepted_types
        .iter()
        .any(|t| t.eq_ignore_ascii_case(&file.mime));
    if !accepted {
        return Err(ValidationError::UnsupportedType {
            name: file.name.clone(),
            mime: file.mime.clone(),
        });
    }

    if file.size() > constraints.max_file_bytes {
        return Err(ValidationError::TooLarge {
            name: file.name.clone(),
            size: file.size(),
            max: constraints.max_file_bytes,
        });
    }

    Ok(Some(file))
}
