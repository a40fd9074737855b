//! Projects face records into an [`AnnotationDocument`].

use crate::image_id::{self, ImageIdError};
use crate::profile::DatasetProfile;
use crate::schema::{AnnotationDocument, AnnotationRecord, Category, ImageRecord};
use crate::types::{FaceRecord, LANDMARK_NAMES};
use std::collections::HashSet;

/// Id of the single "face" category.
pub const FACE_CATEGORY_ID: i64 = 0;

/// The fixed "face" category with its 21 landmark names and no skeleton.
pub fn face_category() -> Category {
    Category {
        supercategory: "face".into(),
        name: "face".into(),
        skeleton: Vec::new(),
        keypoints: LANDMARK_NAMES.iter().map(|s| s.to_string()).collect(),
        id: FACE_CATEGORY_ID,
    }
}

/// Builds annotation documents using the static metadata of a profile.
pub struct SchemaAssembler<'a> {
    profile: &'a DatasetProfile,
}

impl<'a> SchemaAssembler<'a> {
    pub fn new(profile: &'a DatasetProfile) -> Self {
        Self { profile }
    }

    /// Emit one annotation per face and one image per distinct image id.
    ///
    /// Records are processed in ascending `face_id` order regardless of input
    /// order. Fails without producing a document if any image path cannot be
    /// encoded to an id.
    pub fn assemble(
        &self,
        mut records: Vec<FaceRecord>,
    ) -> Result<AnnotationDocument, ImageIdError> {
        records.sort_by_key(|r| r.face_id);

        let mut images = Vec::new();
        let mut annotations = Vec::with_capacity(records.len());
        let mut seen_images = HashSet::new();

        for record in records {
            let image_id = image_id::encode(&record.image_path)?;

            if seen_images.insert(image_id) {
                images.push(self.image_record(image_id, &record));
            }

            let keypoints = record.flat_keypoints();
            annotations.push(AnnotationRecord {
                id: record.face_id,
                image_id,
                segmentation: Vec::new(),
                num_keypoints: keypoints.len(),
                area: 0.0,
                iscrowd: 0,
                keypoints,
                bbox: Some(record.bbox.to_array()),
                category_id: FACE_CATEGORY_ID,
            });
        }

        tracing::info!(
            images = images.len(),
            annotations = annotations.len(),
            "assembled annotation document"
        );

        Ok(AnnotationDocument {
            info: self.profile.info.clone(),
            licenses: self.profile.licenses.clone(),
            images,
            annotations,
            categories: vec![face_category()],
        })
    }

    fn image_record(&self, id: u64, record: &FaceRecord) -> ImageRecord {
        let attribution = &self.profile.image;
        ImageRecord {
            id,
            file_name: record.image_path.clone(),
            height: record.size.height,
            width: record.size.width,
            date_captured: attribution.date_captured.clone(),
            flickr_url: attribution.flickr_url.clone(),
            license: attribution.license,
            dataset: attribution.dataset.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FaceRect, Gender, ImageSize, Landmark, Pose, NUM_LANDMARKS};

    fn record(face_id: i64, path: &str) -> FaceRecord {
        let mut keypoints = [Landmark::default(); NUM_LANDMARKS];
        keypoints[7] = Landmark::visible(3.0, 4.0);
        FaceRecord {
            face_id,
            image_path: path.into(),
            size: ImageSize {
                width: 640,
                height: 480,
            },
            bbox: FaceRect {
                x: 10.0,
                y: 20.0,
                w: 30.0,
                h: 40.0,
            },
            keypoints,
            pose: Pose::default(),
            gender: Gender::Female,
        }
    }

    #[test]
    fn test_assemble_fields() {
        let profile = DatasetProfile::aflw().unwrap();
        let doc = SchemaAssembler::new(&profile)
            .assemble(vec![record(5, "flickr/3/image00042.jpg")])
            .unwrap();

        assert_eq!(doc.images.len(), 1);
        let img = &doc.images[0];
        assert_eq!(img.id, 300042);
        assert_eq!(img.file_name, "flickr/3/image00042.jpg");
        assert_eq!((img.width, img.height), (640, 480));
        assert_eq!(img.license, 1);
        assert_eq!(img.dataset, "aflw");

        let ann = &doc.annotations[0];
        assert_eq!(ann.id, 5);
        assert_eq!(ann.image_id, 300042);
        assert_eq!(ann.num_keypoints, 63);
        assert_eq!(ann.keypoints.len(), 63);
        assert_eq!(&ann.keypoints[21..24], &[3.0, 4.0, 1.0]);
        assert_eq!(ann.area, 0.0);
        assert_eq!(ann.iscrowd, 0);
        assert!(ann.segmentation.is_empty());
        assert_eq!(ann.bbox, Some([10.0, 20.0, 30.0, 40.0]));
        assert_eq!(ann.category_id, FACE_CATEGORY_ID);

        assert_eq!(doc.info.year, 2011);
        assert_eq!(doc.licenses.len(), 1);
    }

    #[test]
    fn test_category_block() {
        let cat = face_category();
        assert_eq!(cat.name, "face");
        assert_eq!(cat.supercategory, "face");
        assert_eq!(cat.keypoints.len(), 21);
        assert_eq!(cat.keypoints[14], "NoseCenter");
        assert!(cat.skeleton.is_empty());
    }

    #[test]
    fn test_shared_image_emitted_once() {
        let profile = DatasetProfile::aflw().unwrap();
        let doc = SchemaAssembler::new(&profile)
            .assemble(vec![
                record(1, "flickr/0/image00002.jpg"),
                record(2, "flickr/0/image00002.jpg"),
                record(3, "flickr/0/image00003.jpg"),
            ])
            .unwrap();
        assert_eq!(doc.images.len(), 2);
        assert_eq!(doc.annotations.len(), 3);
        assert_eq!(doc.annotations[1].image_id, 2);
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let profile = DatasetProfile::aflw().unwrap();
        let assembler = SchemaAssembler::new(&profile);
        let input = vec![
            record(9, "flickr/1/image00001.jpg"),
            record(2, "flickr/0/image00002.jpg"),
            record(5, "flickr/0/image00002.jpg"),
        ];
        let a =
            serde_json::to_vec(&assembler.assemble(input.clone()).unwrap().annotations).unwrap();
        let mut reversed = input;
        reversed.reverse();
        let b = serde_json::to_vec(&assembler.assemble(reversed).unwrap().annotations).unwrap();
        assert_eq!(a, b);

        let doc = assembler
            .assemble(vec![
                record(9, "flickr/1/image00001.jpg"),
                record(2, "flickr/0/image00002.jpg"),
            ])
            .unwrap();
        let ids: Vec<i64> = doc.annotations.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 9]);
    }

    #[test]
    fn test_unencodable_path_fails_whole_document() {
        let profile = DatasetProfile::aflw().unwrap();
        let err = SchemaAssembler::new(&profile)
            .assemble(vec![record(1, "flickr/0/image00002.jpg"), record(2, "loose.jpg")])
            .unwrap_err();
        assert!(matches!(err, ImageIdError::MissingDirIndex(_)));
    }
}
