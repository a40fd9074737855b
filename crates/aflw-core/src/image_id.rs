//! Stable image identifiers derived from `<dir-index>/<file-index>.<ext>` paths.
//!
//! `image_id = dir_index * 10^5 + file_index`. The id is a pure function of the
//! path. File indices of 100000 or more are not rejected and alias ids in the
//! next directory (`0/image100000.jpg` and `1/image00000.jpg` both map to
//! 100000).

use std::path::Path;
use thiserror::Error;

/// Decimal width reserved for the file index.
pub const FILE_INDEX_DIGITS: u32 = 5;

const FILE_INDEX_RADIX: u64 = 10u64.pow(FILE_INDEX_DIGITS);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageIdError {
    #[error("image path has no parent directory index: {0}")]
    MissingDirIndex(String),
    #[error("image path has no numeric file index: {0}")]
    MissingFileIndex(String),
    #[error("image id does not fit in 64 bits: {0}")]
    Overflow(String),
}

/// Combine a directory index and file index into one id.
///
/// Returns `None` when the id does not fit in a `u64`.
pub fn compose(dir_index: u64, file_index: u64) -> Option<u64> {
    dir_index
        .checked_mul(FILE_INDEX_RADIX)?
        .checked_add(file_index)
}

/// Encode an image path such as `flickr/3/image00042.jpg` to `300042`.
///
/// The directory index is the name of the directory directly containing the
/// file; the file index is the first run of digits in the file stem.
pub fn encode(path: &str) -> Result<u64, ImageIdError> {
    let p = Path::new(path);

    let dir_index = p
        .parent()
        .and_then(|d| d.file_name())
        .and_then(|d| d.to_str())
        .and_then(|d| d.parse::<u64>().ok())
        .ok_or_else(|| ImageIdError::MissingDirIndex(path.to_string()))?;

    let file_index = p
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(first_digit_run)
        .ok_or_else(|| ImageIdError::MissingFileIndex(path.to_string()))?;

    compose(dir_index, file_index).ok_or_else(|| ImageIdError::Overflow(path.to_string()))
}

fn first_digit_run(s: &str) -> Option<u64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: &str = &s[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}
