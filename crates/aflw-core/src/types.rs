use serde::{Deserialize, Serialize};

/// Number of facial landmarks annotated per face.
pub const NUM_LANDMARKS: usize = 21;

/// Length of a flattened `(x, y, visibility)` keypoint vector.
pub const KEYPOINT_VALUES: usize = NUM_LANDMARKS * 3;

/// Landmark names in `feature_id` order (`feature_id = index + 1`).
pub const LANDMARK_NAMES: [&str; NUM_LANDMARKS] = [
    "LeftBrowLeftCorner",
    "LeftBrowCenter",
    "LeftBrowRightCorner",
    "RightBrowLeftCorner",
    "RightBrowCenter",
    "RightBrowRightCorner",
    "LeftEyeLeftCorner",
    "LeftEyeCenter",
    "LeftEyeRightCorner",
    "RightEyeLeftCorner",
    "RightEyeCenter",
    "RightEyeRightCorner",
    "LeftEar",
    "NoseLeft",
    "NoseCenter",
    "NoseRight",
    "RightEar",
    "MouthLeftCorner",
    "MouthCenter",
    "MouthRightCorner",
    "ChinCenter",
];

/// Whether a landmark coordinate was observed in the source annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Absent = 0,
    Visible = 1,
}

/// One facial landmark. Absent landmarks are `(0, 0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub visibility: Visibility,
}

impl Landmark {
    pub fn visible(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            visibility: Visibility::Visible,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}

/// Gender as recorded in the face metadata table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male = 0,
    Female = 1,
}

impl Gender {
    /// Decode the metadata `sex` column: `'m'` is male, anything else female.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("m") => Gender::Male,
            _ => Gender::Female,
        }
    }

    pub fn as_index(self) -> u8 {
        self as u8
    }
}

/// Head pose in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Face rectangle in pixels: top-left corner plus width/height.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl FaceRect {
    /// COCO `[x, y, w, h]` layout.
    pub fn to_array(self) -> [f64; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

/// Pixel dimensions of a backing image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// A fully built, labeled face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRecord {
    pub face_id: i64,
    /// Path relative to the dataset root, e.g. `flickr/0/image00002.jpg`.
    pub image_path: String,
    pub size: ImageSize,
    pub bbox: FaceRect,
    pub keypoints: [Landmark; NUM_LANDMARKS],
    pub pose: Pose,
    pub gender: Gender,
}

impl FaceRecord {
    /// Keypoints flattened to `[x0, y0, v0, x1, y1, v1, ...]`.
    pub fn flat_keypoints(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(KEYPOINT_VALUES);
        for lm in &self.keypoints {
            flat.push(lm.x);
            flat.push(lm.y);
            flat.push(lm.visibility as u8 as f64);
        }
        flat
    }

    pub fn visible_landmarks(&self) -> usize {
        self.keypoints.iter().filter(|lm| lm.is_visible()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FaceRecord {
        FaceRecord {
            face_id: 1,
            image_path: "flickr/0/image00002.jpg".into(),
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
            keypoints: [Landmark::default(); NUM_LANDMARKS],
            pose: Pose::default(),
            gender: Gender::Male,
        }
    }

    #[test]
    fn test_flat_keypoints_all_absent() {
        let flat = record().flat_keypoints();
        assert_eq!(flat.len(), KEYPOINT_VALUES);
        assert!(flat.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_flat_keypoints_layout() {
        let mut r = record();
        r.keypoints[2] = Landmark::visible(5.5, 7.25);
        let flat = r.flat_keypoints();
        assert_eq!(&flat[6..9], &[5.5, 7.25, 1.0]);
        assert_eq!(r.visible_landmarks(), 1);
    }

    #[test]
    fn test_gender_from_code() {
        assert_eq!(Gender::from_code(Some("m")), Gender::Male);
        assert_eq!(Gender::from_code(Some("f")), Gender::Female);
        assert_eq!(Gender::from_code(None), Gender::Female);
        assert_eq!(Gender::Male.as_index(), 0);
        assert_eq!(Gender::Female.as_index(), 1);
    }

    #[test]
    fn test_landmark_names_count() {
        assert_eq!(LANDMARK_NAMES.len(), NUM_LANDMARKS);
        assert_eq!(LANDMARK_NAMES[0], "LeftBrowLeftCorner");
        assert_eq!(LANDMARK_NAMES[20], "ChinCenter");
    }
}
