//! Dataset profiles.
//!
//! A profile carries the static metadata written into a converted document:
//! the info block, the license list and the attribution fields stamped on
//! each image. The AFLW profile is embedded at compile time from
//! `contrib/profiles/aflw.toml`; other profiles can be loaded from disk.

use crate::schema::{DatasetInfo, License};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const AFLW_PROFILE: &str = include_str!("../../../contrib/profiles/aflw.toml");

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad profile TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Attribution fields from the `[image]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageAttribution {
    pub license: i64,
    #[serde(default)]
    pub flickr_url: String,
    #[serde(default)]
    pub date_captured: String,
    pub dataset: String,
}

/// Top-level profile structure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetProfile {
    pub info: DatasetInfo,
    pub image: ImageAttribution,
    #[serde(default)]
    pub licenses: Vec<License>,
}

impl DatasetProfile {
    /// The embedded AFLW profile.
    pub fn aflw() -> Result<Self, ProfileError> {
        Self::from_toml(AFLW_PROFILE)
    }

    pub fn from_toml(src: &str) -> Result<Self, ProfileError> {
        Ok(toml::from_str(src)?)
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let src = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let profile = Self::from_toml(&src)?;
        tracing::debug!(path = %path.display(), dataset = %profile.image.dataset, "loaded profile");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_aflw_profile() {
        let p = DatasetProfile::aflw().unwrap();
        assert_eq!(p.info.description, "Annotated Facial Landmarks in the Wild (AFLW)");
        assert_eq!(p.info.version, "1.0");
        assert_eq!(p.info.year, 2011);
        assert_eq!(p.info.date_created, "2011");
        assert_eq!(p.image.license, 1);
        assert_eq!(p.image.dataset, "aflw");
        assert_eq!(p.licenses.len(), 1);
        assert_eq!(p.licenses[0].id, 0);
        assert_eq!(p.licenses[0].name, "aflw_license");
    }

    #[test]
    fn test_numeric_version_accepted() {
        let src = r#"
            [info]
            description = "d"
            url = "u"
            version = 2
            year = 2015
            contributor = "c"
            date_created = "2015"

            [image]
            license = 0
            dataset = "other"
        "#;
        let p = DatasetProfile::from_toml(src).unwrap();
        assert_eq!(p.info.version, "2");
        assert!(p.licenses.is_empty());
        assert_eq!(p.image.flickr_url, "");
    }

    #[test]
    fn test_bad_profile_rejected() {
        let err = DatasetProfile::from_toml("[info]\ndescription = 1").unwrap_err();
        assert!(matches!(err, ProfileError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = DatasetProfile::load(Path::new("/nonexistent/profile.toml")).unwrap_err();
        assert!(matches!(err, ProfileError::Read { .. }));
    }
}
