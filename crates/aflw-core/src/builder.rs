//! Two-phase construction of [`FaceRecord`]s from extracted rows.
//!
//! The geometry pass resolves each face's backing image and produces an
//! immutable set of partial records keyed by `face_id`. The landmark pass
//! consumes that set, attaches landmark coordinates and finalizes the records.
//! Faces whose image cannot be resolved and landmarks that reference such
//! faces are reported in [`BuildDiagnostics`] instead of failing the build.

use crate::extractor::{FaceRow, LandmarkRow, SourceStore, StorageError};
use crate::types::{FaceRecord, FaceRect, Gender, ImageSize, Landmark, Pose, NUM_LANDMARKS};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Backing image of a face is absent or cannot be probed for its size.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MissingAssetError {
    #[error("image not found: {0}")]
    NotFound(PathBuf),
    #[error("image unreadable: {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

impl MissingAssetError {
    pub fn path(&self) -> &Path {
        match self {
            MissingAssetError::NotFound(path) => path,
            MissingAssetError::Unreadable { path, .. } => path,
        }
    }
}

/// Landmarks reference a face that has no surviving record.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("landmarks reference face {face_id}, which has no image record")]
pub struct OrphanReferenceError {
    pub face_id: i64,
}

/// Reads pixel dimensions of an image without decoding it.
pub trait ImageProbe {
    fn probe(&self, path: &Path) -> Result<ImageSize, MissingAssetError>;
}

/// [`ImageProbe`] backed by the filesystem and the `image` crate's header readers.
pub struct FsImageProbe;

impl ImageProbe for FsImageProbe {
    fn probe(&self, path: &Path) -> Result<ImageSize, MissingAssetError> {
        if !path.is_file() {
            return Err(MissingAssetError::NotFound(path.to_path_buf()));
        }
        let (width, height) =
            image::image_dimensions(path).map_err(|e| MissingAssetError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(ImageSize { width, height })
    }
}

/// Recoverable conditions collected while building face records.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BuildDiagnostics {
    /// One entry per excluded face, in source order.
    pub missing_assets: Vec<MissingAssetError>,
    /// One entry per distinct orphaned face id, in first-seen order.
    pub orphans: Vec<OrphanReferenceError>,
    /// Landmark rows skipped because `feature_id` was outside `1..=21`.
    pub invalid_landmarks: usize,
}

impl BuildDiagnostics {
    /// Unresolved image paths, each listed once, in first-seen order.
    pub fn not_found_paths(&self) -> Vec<&Path> {
        let mut seen = HashSet::new();
        self.missing_assets
            .iter()
            .map(MissingAssetError::path)
            .filter(|p| seen.insert(*p))
            .collect()
    }

    pub fn invalid_face_ids(&self) -> Vec<i64> {
        self.orphans.iter().map(|o| o.face_id).collect()
    }

    /// Write the not-found side file: one path per line.
    pub fn write_not_found<W: Write>(&self, mut out: W) -> io::Result<()> {
        for path in self.not_found_paths() {
            writeln!(out, "{}", path.display())?;
        }
        out.flush()
    }

    pub fn is_clean(&self) -> bool {
        self.missing_assets.is_empty() && self.orphans.is_empty() && self.invalid_landmarks == 0
    }
}

/// Face fields known after the geometry pass. Keypoints are attached later.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialFace {
    pub face_id: i64,
    pub image_path: String,
    pub size: ImageSize,
    pub bbox: FaceRect,
    pub pose: Pose,
    pub gender: Gender,
}

impl PartialFace {
    fn finalize(self, keypoints: [Landmark; NUM_LANDMARKS]) -> FaceRecord {
        FaceRecord {
            face_id: self.face_id,
            image_path: self.image_path,
            size: self.size,
            bbox: self.bbox,
            keypoints,
            pose: self.pose,
            gender: self.gender,
        }
    }
}

/// Output of the geometry pass: partial records keyed by face id.
#[derive(Debug, Default)]
pub struct GeometryPass {
    partials: BTreeMap<i64, PartialFace>,
    missing: Vec<(i64, MissingAssetError)>,
}

/// Finished records, sorted by `face_id`, plus diagnostics.
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub records: Vec<FaceRecord>,
    pub diagnostics: BuildDiagnostics,
}

/// Resolves face rows against a dataset root.
pub struct FaceRecordBuilder<P> {
    root: PathBuf,
    image_dir: String,
    probe: P,
}

impl<P: ImageProbe> FaceRecordBuilder<P> {
    /// `image_dir` is the subdirectory of `root` holding the images; it also
    /// prefixes every emitted `image_path`.
    pub fn new(root: impl Into<PathBuf>, image_dir: impl Into<String>, probe: P) -> Self {
        Self {
            root: root.into(),
            image_dir: image_dir.into(),
            probe,
        }
    }

    fn relative_path(&self, file_path: &str) -> String {
        if self.image_dir.is_empty() {
            file_path.to_string()
        } else {
            format!("{}/{}", self.image_dir, file_path)
        }
    }

    /// Resolve every face's image; faces whose image is unresolvable are dropped.
    pub fn geometry_pass(&self, rows: Vec<FaceRow>) -> GeometryPass {
        let total = rows.len();
        let mut pass = GeometryPass::default();

        for row in rows {
            let image_path = self.relative_path(&row.file_path);
            let full_path = self.root.join(&image_path);

            let size = match self.probe.probe(&full_path) {
                Ok(size) => size,
                Err(err) => {
                    tracing::debug!(face_id = row.face_id, error = %err, "face excluded");
                    if pass.partials.remove(&row.face_id).is_some() {
                        tracing::debug!(
                            face_id = row.face_id,
                            "duplicate face row, keeping the last"
                        );
                    }
                    pass.missing.push((row.face_id, err));
                    continue;
                }
            };
            pass.missing.retain(|(face_id, _)| *face_id != row.face_id);

            let face = PartialFace {
                face_id: row.face_id,
                image_path,
                size,
                bbox: row.rect,
                pose: row.pose,
                gender: Gender::from_code(row.sex.as_deref()),
            };
            if pass.partials.insert(row.face_id, face).is_some() {
                tracing::debug!(face_id = row.face_id, "duplicate face row, keeping the last");
            }
        }

        tracing::info!(
            rows = total,
            faces = pass.partials.len(),
            missing = pass.missing.len(),
            "geometry pass complete"
        );
        pass
    }

    /// Run both passes against `store`.
    pub fn build(&self, store: &SourceStore) -> Result<BuildOutput, StorageError> {
        let faces = store.face_rows()?;
        let pass = self.geometry_pass(faces);
        let landmarks = store.landmark_rows()?;
        Ok(pass.landmark_pass(&landmarks))
    }
}

impl GeometryPass {
    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    pub fn contains(&self, face_id: i64) -> bool {
        self.partials.contains_key(&face_id)
    }

    /// Faces excluded because their image could not be resolved.
    pub fn missing(&self) -> impl ExactSizeIterator<Item = &MissingAssetError> {
        self.missing.iter().map(|(_, err)| err)
    }

    /// Attach landmarks and finalize. Records come out sorted by `face_id`.
    pub fn landmark_pass(self, rows: &[LandmarkRow]) -> BuildOutput {
        let mut keypoints: BTreeMap<i64, [Landmark; NUM_LANDMARKS]> = BTreeMap::new();
        let mut diagnostics = BuildDiagnostics {
            missing_assets: self.missing.into_iter().map(|(_, err)| err).collect(),
            ..BuildDiagnostics::default()
        };
        let mut orphaned = HashSet::new();

        for row in rows {
            let Some(idx) = landmark_index(row.feature_id) else {
                tracing::warn!(
                    face_id = row.face_id,
                    feature_id = row.feature_id,
                    "landmark index out of range, skipped"
                );
                diagnostics.invalid_landmarks += 1;
                continue;
            };

            if !self.partials.contains_key(&row.face_id) {
                if orphaned.insert(row.face_id) {
                    diagnostics.orphans.push(OrphanReferenceError {
                        face_id: row.face_id,
                    });
                }
                continue;
            }

            keypoints
                .entry(row.face_id)
                .or_insert([Landmark::default(); NUM_LANDMARKS])[idx] =
                Landmark::visible(row.x, row.y);
        }

        let records: Vec<FaceRecord> = self
            .partials
            .into_values()
            .map(|face| {
                let kps = keypoints
                    .remove(&face.face_id)
                    .unwrap_or([Landmark::default(); NUM_LANDMARKS]);
                face.finalize(kps)
            })
            .collect();

        tracing::info!(
            landmarks = rows.len(),
            records = records.len(),
            orphaned_faces = diagnostics.orphans.len(),
            invalid_landmarks = diagnostics.invalid_landmarks,
            "landmark pass complete"
        );

        BuildOutput {
            records,
            diagnostics,
        }
    }
}

fn landmark_index(feature_id: i64) -> Option<usize> {
    if (1..=NUM_LANDMARKS as i64).contains(&feature_id) {
        Some((feature_id - 1) as usize)
    } else {
        None
    }
}
