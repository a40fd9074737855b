//! COCO-style annotation document.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;

/// Required top-level keys of an annotation document.
pub const REQUIRED_KEYS: [&str; 10] = [
    "description",
    "url",
    "version",
    "year",
    "contributor",
    "date_created",
    "licenses",
    "images",
    "annotations",
    "categories",
];

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("{doc}: missing required key `{key}`")]
    MissingKey { doc: String, key: &'static str },
    #[error("{doc}: document root is not an object")]
    NotAnObject { doc: String },
    #[error("{doc}: invalid document: {source}")]
    Invalid {
        doc: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Dataset-level metadata. Flattened into the document root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub description: String,
    pub url: String,
    /// Display string; numeric versions are accepted and rendered as text.
    #[serde(deserialize_with = "display_string")]
    pub version: String,
    pub year: i64,
    pub contributor: String,
    pub date_created: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: i64,
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: u64,
    pub file_name: String,
    pub height: u32,
    pub width: u32,
    #[serde(default)]
    pub date_captured: String,
    #[serde(default)]
    pub flickr_url: String,
    #[serde(default)]
    pub license: i64,
    #[serde(default)]
    pub dataset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: i64,
    pub image_id: u64,
    #[serde(default)]
    pub segmentation: Vec<Vec<f64>>,
    /// Length of `keypoints` (63), not the number of visible landmarks.
    #[serde(default)]
    pub num_keypoints: usize,
    /// Not computed; always 0.
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub iscrowd: u8,
    #[serde(default)]
    pub keypoints: Vec<f64>,
    /// `[x, y, w, h]` in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub supercategory: String,
    pub name: String,
    pub skeleton: Vec<[u32; 2]>,
    pub keypoints: Vec<String>,
    pub id: i64,
}

/// A complete annotation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDocument {
    #[serde(flatten)]
    pub info: DatasetInfo,
    pub licenses: Vec<License>,
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<AnnotationRecord>,
    pub categories: Vec<Category>,
}

impl AnnotationDocument {
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let bytes = read_file(path)?;
        serde_json::from_slice(&bytes).map_err(|source| SchemaError::Invalid {
            doc: path.display().to_string(),
            source,
        })
    }

    /// Serialize fully in memory, then write. A failed serialization leaves
    /// no file behind.
    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        let bytes = serde_json::to_vec(self).map_err(|source| SchemaError::Invalid {
            doc: path.display().to_string(),
            source,
        })?;
        write_file(path, &bytes)
    }
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, SchemaError> {
    std::fs::read(path).map_err(|source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<(), SchemaError> {
    std::fs::write(path, bytes).map_err(|source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Number(serde_json::Number),
}

fn display_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match StringOrNumber::deserialize(d)? {
        StringOrNumber::Str(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}
