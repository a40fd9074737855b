//! Example access over an assembled annotation document.
//!
//! Each example is one image that has at least one annotation: its pixels as
//! a channel-major `3 x H x W` tensor plus every face box in normalized corner
//! form `(x1, y1, x2, y2)` with the category id as label.

use crate::schema::{AnnotationDocument, AnnotationRecord, ImageRecord, SchemaError};
use image::RgbImage;
use ndarray::Array3;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("annotation document: {0}")]
    Document(#[from] SchemaError),
    #[error("annotation {annotation} references unknown image {image}")]
    UnknownImage { annotation: i64, image: u64 },
    #[error("index {index} out of range for dataset of {len} images")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("image not found: {0}")]
    MissingImage(String),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("annotation {0} has no bounding box")]
    MissingBbox(i64),
}

/// A face box in corner form, normalized by image width/height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledBox {
    /// `[x1, y1, x2, y2]`.
    pub coords: [f64; 4],
    pub label: i64,
}

/// One dataset example.
#[derive(Debug, Clone)]
pub struct Example {
    /// Channel-major RGB intensities in `0.0..=255.0`, shape `(3, height, width)`.
    pub pixels: Array3<f32>,
    pub boxes: Vec<LabeledBox>,
    pub height: u32,
    pub width: u32,
}

/// Indexed access to dataset examples.
pub trait DatasetSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn example_at(&self, index: usize) -> Result<Example, DatasetError>;
}

struct ImageGroup {
    image: ImageRecord,
    annotations: Vec<AnnotationRecord>,
}

/// Dataset backed by an annotation document and an image root directory.
pub struct CocoDataset {
    root: PathBuf,
    groups: Vec<ImageGroup>,
}

impl CocoDataset {
    /// Load `json` and index it against `root`.
    pub fn open(root: &Path, json: &Path) -> Result<Self, DatasetError> {
        let doc = AnnotationDocument::load(json)?;
        let dataset = Self::from_document(root, doc)?;
        tracing::info!(
            root = %root.display(),
            json = %json.display(),
            images = dataset.len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    /// Group annotations by image. Images appear in order of their first
    /// annotation; images without annotations are not examples.
    pub fn from_document(root: &Path, doc: AnnotationDocument) -> Result<Self, DatasetError> {
        let mut by_id: HashMap<u64, ImageRecord> = HashMap::new();
        for image in doc.images {
            by_id.entry(image.id).or_insert(image);
        }

        let mut position: HashMap<u64, usize> = HashMap::new();
        let mut groups: Vec<ImageGroup> = Vec::new();
        for ann in doc.annotations {
            let idx = match position.get(&ann.image_id) {
                Some(&idx) => idx,
                None => {
                    let image = by_id.get(&ann.image_id).cloned().ok_or(DatasetError::UnknownImage {
                        annotation: ann.id,
                        image: ann.image_id,
                    })?;
                    groups.push(ImageGroup {
                        image,
                        annotations: Vec::new(),
                    });
                    position.insert(ann.image_id, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[idx].annotations.push(ann);
        }

        Ok(Self {
            root: root.to_path_buf(),
            groups,
        })
    }

    /// Image id of the example at `index`.
    pub fn image_id(&self, index: usize) -> Option<u64> {
        self.groups.get(index).map(|g| g.image.id)
    }

    fn load_image(&self, file_name: &str) -> Result<RgbImage, DatasetError> {
        let path = self.root.join(file_name);
        if !path.is_file() {
            return Err(DatasetError::MissingImage(path.display().to_string()));
        }
        let img = image::open(&path).map_err(|source| DatasetError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        Ok(img.to_rgb8())
    }
}

impl DatasetSource for CocoDataset {
    fn len(&self) -> usize {
        self.groups.len()
    }

    fn example_at(&self, index: usize) -> Result<Example, DatasetError> {
        let group = self.groups.get(index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.groups.len(),
        })?;

        let rgb = self.load_image(&group.image.file_name)?;
        let (width, height) = rgb.dimensions();
        let boxes = normalized_boxes(&group.annotations, width, height)?;

        Ok(Example {
            pixels: to_chw(&rgb),
            boxes,
            height,
            width,
        })
    }
}

/// Convert `[x, y, w, h]` boxes to normalized corner form.
pub fn normalized_boxes(
    annotations: &[AnnotationRecord],
    width: u32,
    height: u32,
) -> Result<Vec<LabeledBox>, DatasetError> {
    let (w, h) = (width as f64, height as f64);
    annotations
        .iter()
        .map(|ann| {
            let [x, y, bw, bh] = ann.bbox.ok_or(DatasetError::MissingBbox(ann.id))?;
            Ok(LabeledBox {
                coords: [x / w, y / h, (x + bw) / w, (y + bh) / h],
                label: ann.category_id,
            })
        })
        .collect()
}

/// Interleaved RGB to a `(3, H, W)` tensor.
pub fn to_chw(rgb: &RgbImage) -> Array3<f32> {
    let (width, height) = rgb.dimensions();
    Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DatasetInfo;
    use image::Rgb;

    fn image(id: u64, file_name: &str) -> ImageRecord {
        ImageRecord {
            id,
            file_name: file_name.into(),
            height: 0,
            width: 0,
            date_captured: String::new(),
            flickr_url: String::new(),
            license: 1,
            dataset: "aflw".into(),
        }
    }

    fn ann(id: i64, image_id: u64, bbox: Option<[f64; 4]>) -> AnnotationRecord {
        AnnotationRecord {
            id,
            image_id,
            segmentation: Vec::new(),
            num_keypoints: 0,
            area: 0.0,
            iscrowd: 0,
            keypoints: Vec::new(),
            bbox,
            category_id: 0,
        }
    }

    fn document(
        images: Vec<ImageRecord>,
        annotations: Vec<AnnotationRecord>,
    ) -> AnnotationDocument {
        AnnotationDocument {
            info: DatasetInfo {
                description: "t".into(),
                url: String::new(),
                version: "1".into(),
                year: 2011,
                contributor: String::new(),
                date_created: String::new(),
            },
            licenses: Vec::new(),
            images,
            annotations,
            categories: Vec::new(),
        }
    }

    #[test]
    fn test_groups_follow_annotation_order() {
        let doc = document(
            vec![image(1, "a.png"), image(2, "b.png"), image(3, "unused.png")],
            vec![
                ann(10, 2, Some([0.0; 4])),
                ann(11, 1, Some([0.0; 4])),
                ann(12, 2, Some([0.0; 4])),
            ],
        );
        let ds = CocoDataset::from_document(Path::new("/"), doc).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.image_id(0), Some(2));
        assert_eq!(ds.image_id(1), Some(1));
        assert_eq!(ds.groups[0].annotations.len(), 2);
    }

    #[test]
    fn test_unknown_image_rejected() {
        let doc = document(vec![image(1, "a.png")], vec![ann(10, 99, None)]);
        let err = CocoDataset::from_document(Path::new("/"), doc).err().unwrap();
        assert!(matches!(
            err,
            DatasetError::UnknownImage {
                annotation: 10,
                image: 99,
            }
        ));
    }

    #[test]
    fn test_normalized_boxes() {
        let boxes =
            normalized_boxes(&[ann(1, 1, Some([10.0, 20.0, 30.0, 40.0]))], 100, 200).unwrap();
        assert_eq!(boxes[0].coords, [0.1, 0.1, 0.4, 0.3]);
        assert_eq!(boxes[0].label, 0);
    }

    #[test]
    fn test_missing_bbox_rejected() {
        let err = normalized_boxes(&[ann(5, 1, None)], 10, 10).unwrap_err();
        assert!(matches!(err, DatasetError::MissingBbox(5)));
    }

    #[test]
    fn test_to_chw_layout() {
        let mut rgb = RgbImage::new(2, 1);
        rgb.put_pixel(0, 0, Rgb([1, 2, 3]));
        rgb.put_pixel(1, 0, Rgb([4, 5, 6]));
        let t = to_chw(&rgb);
        assert_eq!(t.shape(), &[3, 1, 2]);
        assert_eq!(t[[0, 0, 1]], 4.0);
        assert_eq!(t[[2, 0, 0]], 3.0);
    }

    #[test]
    fn test_example_at_reads_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("flickr/0")).unwrap();
        RgbImage::from_pixel(4, 2, Rgb([10, 20, 30]))
            .save(dir.path().join("flickr/0/image00001.png"))
            .unwrap();

        let doc = document(
            vec![image(1, "flickr/0/image00001.png")],
            vec![ann(7, 1, Some([0.0, 0.0, 2.0, 1.0]))],
        );
        let ds = CocoDataset::from_document(dir.path(), doc).unwrap();
        let ex = ds.example_at(0).unwrap();
        assert_eq!((ex.width, ex.height), (4, 2));
        assert_eq!(ex.pixels.shape(), &[3, 2, 4]);
        assert_eq!(ex.boxes[0].coords, [0.0, 0.0, 0.5, 0.5]);

        assert!(matches!(
            ds.example_at(1),
            Err(DatasetError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_example_at_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(vec![image(1, "gone.png")], vec![ann(7, 1, Some([0.0; 4]))]);
        let ds = CocoDataset::from_document(dir.path(), doc).unwrap();
        assert!(matches!(ds.example_at(0), Err(DatasetError::MissingImage(_))));
    }
}
