//! Concatenation of two annotation documents.
//!
//! Lists are concatenated `A` then `B` with no deduplication and no id
//! collision check; callers keep the id spaces disjoint. Text metadata is
//! joined with `" | "` and `year` takes the maximum.

use crate::schema::{
    read_file, write_file, AnnotationDocument, DatasetInfo, SchemaError, REQUIRED_KEYS,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

const SEPARATOR: &str = " | ";

/// An annotation document whose list entries are kept as opaque JSON, so
/// documents from other producers merge without losing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(flatten)]
    pub info: DatasetInfo,
    pub licenses: Vec<Value>,
    pub images: Vec<Value>,
    pub annotations: Vec<Value>,
    pub categories: Vec<Value>,
}

impl RawDocument {
    /// Validate and convert a parsed JSON document. `doc` names the input in errors.
    pub fn from_value(doc: &str, value: Value) -> Result<Self, SchemaError> {
        let obj = value.as_object().ok_or_else(|| SchemaError::NotAnObject {
            doc: doc.to_string(),
        })?;
        if let Some(key) = REQUIRED_KEYS.iter().find(|k| !obj.contains_key(**k)) {
            return Err(SchemaError::MissingKey {
                doc: doc.to_string(),
                key: *key,
            });
        }
        serde_json::from_value(value).map_err(|source| SchemaError::Invalid {
            doc: doc.to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let doc = path.display().to_string();
        let bytes = read_file(path)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|source| SchemaError::Invalid {
            doc: doc.clone(),
            source,
        })?;
        Self::from_value(&doc, value)
    }

    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        let bytes = serde_json::to_vec(self).map_err(|source| SchemaError::Invalid {
            doc: path.display().to_string(),
            source,
        })?;
        write_file(path, &bytes)
    }

    pub fn from_document(doc: &AnnotationDocument) -> Result<Self, SchemaError> {
        let value = serde_json::to_value(doc).map_err(|source| SchemaError::Invalid {
            doc: doc.info.description.clone(),
            source,
        })?;
        Self::from_value(&doc.info.description, value)
    }
}

/// Combine `a` and `b`. Entries of `a` precede those of `b`.
pub fn merge(a: RawDocument, b: RawDocument) -> RawDocument {
    let info = DatasetInfo {
        description: join(&a.info.description, &b.info.description),
        url: join(&a.info.url, &b.info.url),
        version: join(&a.info.version, &b.info.version),
        year: a.info.year.max(b.info.year),
        contributor: join(&a.info.contributor, &b.info.contributor),
        date_created: join(&a.info.date_created, &b.info.date_created),
    };

    RawDocument {
        info,
        licenses: concat(a.licenses, b.licenses),
        images: concat(a.images, b.images),
        annotations: concat(a.annotations, b.annotations),
        categories: concat(a.categories, b.categories),
    }
}

/// Validate two JSON documents and merge them.
pub fn merge_values(a: Value, b: Value) -> Result<Value, SchemaError> {
    let a = RawDocument::from_value("first", a)?;
    let b = RawDocument::from_value("second", b)?;
    let merged = merge(a, b);
    serde_json::to_value(&merged).map_err(|source| SchemaError::Invalid {
        doc: "merged".into(),
        source,
    })
}

fn join(a: &str, b: &str) -> String {
    format!("{a}{SEPARATOR}{b}")
}

fn concat(mut a: Vec<Value>, b: Vec<Value>) -> Vec<Value> {
    a.extend(b);
    a
}
