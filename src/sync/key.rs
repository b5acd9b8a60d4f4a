//! Artifact naming
//!
//! An image and its description share one key, `{timestamp}_{index}`, and are
//! stored as `{key}.{ext}` and `{key}.txt`. The shared prefix is the only link
//! between the two files.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Local-time format used in keys (second resolution)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Extension used for description files
pub const DESCRIPTION_EXTENSION: &str = "txt";

/// Logical name shared by an image and its description
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Key for the item at `index` of a submission made at `timestamp`
    pub fn new(timestamp: NaiveDateTime, index: usize) -> Self {
        Self(format!("{}_{}", timestamp.format(TIMESTAMP_FORMAT), index))
    }

    /// Key taken from an existing file name (everything before the last `.`)
    pub fn from_file_name(file_name: &str) -> Self {
        Self(base_name(file_name).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{key}.{ext}`
    pub fn image_file_name(&self, extension: ImageExtension) -> String {
        format!("{}.{}", self.0, extension)
    }

    /// `{key}.txt`
    pub fn description_file_name(&self) -> String {
        format!("{}.{}", self.0, DESCRIPTION_EXTENSION)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image formats recognised by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageExtension {
    #[default]
    Jpg,
    Jpeg,
    Png,
}

impl ImageExtension {
    /// Recognise the extension of `file_name`, ignoring case
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "jpg" => Some(ImageExtension::Jpg),
            "jpeg" => Some(ImageExtension::Jpeg),
            "png" => Some(ImageExtension::Png),
            _ => None,
        }
    }

    /// Extension to store a submission under; unknown or missing names fall back to `jpg`
    pub fn for_upload(original_name: Option<&str>) -> Self {
        original_name
            .and_then(Self::from_file_name)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageExtension::Jpg => "jpg",
            ImageExtension::Jpeg => "jpeg",
            ImageExtension::Png => "png",
        }
    }
}

impl fmt::Display for ImageExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check whether a listed file counts as an image
pub fn is_image_name(file_name: &str) -> bool {
    ImageExtension::from_file_name(file_name).is_some()
}

/// Check whether a listed file counts as a description
pub fn is_description_name(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(DESCRIPTION_EXTENSION))
}

/// File name without its last `.`-extension
pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(base, _)| base)
}
