//! Multipart upload payload.
//!
//! Builds the ordered list of form parts the backend expects for banner and
//! product uploads. Field names follow the backend contract: `image`,
//! `mobile_image`, `thumbnail`, `gallery[]`, plus free text metadata.
//!
//! Removing an existing image is an explicit [`ImageSlot::Remove`]. How that
//! goes over the wire is a [`RemovalEncoding`]: a `remove_<field>` flag, or
//! the legacy convention of sending the field itself as an empty string.
//! Send the legacy form only to backends that have not learned the flag.

use crate::types::OutputFile;
use serde::{Deserialize, Serialize};

pub const FIELD_IMAGE: &str = "image";
pub const FIELD_MOBILE_IMAGE: &str = "mobile_image";
pub const FIELD_THUMBNAIL: &str = "thumbnail";
pub const FIELD_GALLERY: &str = "gallery[]";

/// Wire format for "remove the stored image".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalEncoding {
    /// `remove_<field>` = `"1"`.
    #[default]
    Flag,
    /// `<field>` = `""`.
    EmptyString,
}

/// What to do with one single-image field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageSlot {
    /// Leave the stored image alone; nothing is sent.
    #[default]
    Keep,
    Replace(OutputFile),
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartValue {
    Text(String),
    File(OutputFile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

impl FormPart {
    fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PartValue::Text(value.into()),
        }
    }

    fn file(name: impl Into<String>, file: OutputFile) -> Self {
        Self {
            name: name.into(),
            value: PartValue::File(file),
        }
    }
}

/// An upload form under construction.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    removal: RemovalEncoding,
    fields: Vec<(String, String)>,
    slots: Vec<(String, ImageSlot)>,
    gallery: Vec<OutputFile>,
}

impl UploadForm {
    pub fn new(removal: RemovalEncoding) -> Self {
        Self {
            removal,
            ..Self::default()
        }
    }

    /// Add a text metadata field. Repeated names are sent repeatedly.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Set a single-image field. Setting the same field again replaces it.
    pub fn slot(mut self, name: impl Into<String>, slot: ImageSlot) -> Self {
        let name = name.into();
        match self.slots.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = slot,
            None => self.slots.push((name, slot)),
        }
        self
    }

    /// Append a gallery image.
    pub fn gallery(mut self, file: OutputFile) -> Self {
        self.gallery.push(file);
        self
    }

    /// Ordered parts: text fields, then image slots, then gallery files.
    pub fn parts(&self) -> Vec<FormPart> {
        let mut parts: Vec<FormPart> = self
            .fields
            .iter()
            .map(|(name, value)| FormPart::text(name, value))
            .collect();

        for (name, slot) in &self.slots {
            match slot {
                ImageSlot::Keep => {}
                ImageSlot::Replace(file) => parts.push(FormPart::file(name, file.clone())),
                ImageSlot::Remove => parts.push(match self.removal {
                    RemovalEncoding::Flag => FormPart::text(format!("remove_{name}"), "1"),
                    RemovalEncoding::EmptyString => FormPart::text(name, ""),
                }),
            }
        }

        parts.extend(
            self.gallery
                .iter()
                .map(|file| FormPart::file(FIELD_GALLERY, file.clone())),
        );
        parts
    }
}
