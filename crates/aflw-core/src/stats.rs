//! Streaming dataset statistics.
//!
//! One pass over a [`DatasetSource`] records image sizes and box geometry,
//! and sums each image's per-channel mean intensity. The sum is divided by
//! the number of images once, after the pass. Pixel tensors are dropped as
//! soon as their example has been accumulated.

use crate::dataset::{DatasetError, DatasetSource, Example};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatisticsError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("statistics sidecar: {0}")]
    Json(#[from] serde_json::Error),
}

/// Aggregate statistics of a dataset, as written to the sidecar file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub img_widths: Vec<u32>,
    pub img_heights: Vec<u32>,
    pub bbox_widths: Vec<f64>,
    pub bbox_heights: Vec<f64>,
    pub bbox_areas: Vec<f64>,
    pub bbox_diags: Vec<f64>,
    pub bbox_labels: Vec<i64>,
    /// Mean intensity per channel (R, G, B).
    pub per_channel_mean: [f64; 3],
}

/// Mean and population standard deviation of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SequenceSummary {
    pub mean: f64,
    pub std: f64,
}

impl SequenceSummary {
    pub fn of<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<f64>,
    {
        let values: Vec<f64> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: var.sqrt(),
        }
    }
}

impl DatasetStatistics {
    pub fn img_width_summary(&self) -> SequenceSummary {
        SequenceSummary::of(self.img_widths.iter().copied())
    }

    pub fn img_height_summary(&self) -> SequenceSummary {
        SequenceSummary::of(self.img_heights.iter().copied())
    }

    pub fn bbox_width_summary(&self) -> SequenceSummary {
        SequenceSummary::of(self.bbox_widths.iter().copied())
    }

    pub fn bbox_height_summary(&self) -> SequenceSummary {
        SequenceSummary::of(self.bbox_heights.iter().copied())
    }

    pub fn bbox_area_summary(&self) -> SequenceSummary {
        SequenceSummary::of(self.bbox_areas.iter().copied())
    }

    pub fn bbox_diag_summary(&self) -> SequenceSummary {
        SequenceSummary::of(self.bbox_diags.iter().copied())
    }

    /// Log mean/std of every sequence at info level.
    pub fn log_summary(&self) {
        let rows = [
            ("image widths", self.img_width_summary()),
            ("image heights", self.img_height_summary()),
            ("bbox widths", self.bbox_width_summary()),
            ("bbox heights", self.bbox_height_summary()),
            ("bbox areas", self.bbox_area_summary()),
            ("bbox diagonals", self.bbox_diag_summary()),
        ];
        for (name, s) in rows {
            tracing::info!(mean = s.mean as i64, std = s.std as i64, "{name}");
        }
        tracing::info!(
            per_channel_mean = ?self.per_channel_mean.map(|c| c as i64),
            "per channel mean"
        );
    }

    pub fn save(&self, path: &Path) -> Result<(), StatisticsError> {
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(path, bytes).map_err(|source| StatisticsError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, StatisticsError> {
        let bytes = std::fs::read(path).map_err(|source| StatisticsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Accumulates statistics one example at a time.
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    stats: DatasetStatistics,
    per_channel_sum: [f64; 3],
    images: usize,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn images(&self) -> usize {
        self.images
    }

    pub fn push(&mut self, example: &Example) {
        let (w, h) = (example.width as f64, example.height as f64);
        self.stats.img_widths.push(example.width);
        self.stats.img_heights.push(example.height);

        for b in &example.boxes {
            let [x1, y1, x2, y2] = [
                b.coords[0] * w,
                b.coords[1] * h,
                b.coords[2] * w,
                b.coords[3] * h,
            ];
            let bw = x2 - x1;
            let bh = y2 - y1;
            self.stats.bbox_labels.push(b.label);
            self.stats.bbox_widths.push(bw);
            self.stats.bbox_heights.push(bh);
            self.stats.bbox_diags.push((bw * bw + bh * bh).sqrt());
            self.stats.bbox_areas.push(bw * bh);
        }

        for (sum, mean) in self.per_channel_sum.iter_mut().zip(channel_means(&example.pixels)) {
            *sum += mean;
        }
        self.images += 1;
    }

    /// Divide the channel sums by the image count and return the statistics.
    pub fn finish(self) -> DatasetStatistics {
        let mut stats = self.stats;
        if self.images == 0 {
            tracing::warn!("no images aggregated; per-channel mean left at zero");
        } else {
            let n = self.images as f64;
            stats.per_channel_mean = self.per_channel_sum.map(|s| s / n);
        }
        stats
    }
}

/// Mean intensity of each of the first three channels of a `(C, H, W)` tensor.
pub fn channel_means(pixels: &Array3<f32>) -> [f64; 3] {
    let mut means = [0.0; 3];
    for (mean, plane) in means.iter_mut().zip(pixels.outer_iter()) {
        if plane.is_empty() {
            continue;
        }
        *mean = plane.iter().map(|&v| v as f64).sum::<f64>() / plane.len() as f64;
    }
    means
}

/// Run one pass over `source`.
pub fn aggregate<S: DatasetSource + ?Sized>(source: &S) -> Result<DatasetStatistics, DatasetError> {
    let total = source.len();
    tracing::info!(images = total, "computing dataset statistics");

    let mut agg = StatisticsAggregator::new();
    for i in 0..total {
        let example = source.example_at(i)?;
        agg.push(&example);
        tracing::debug!(processed = i + 1, total, "statistics progress");
    }
    Ok(agg.finish())
}
