//! aflw-core — AFLW face annotations to COCO format.
//!
//! Reads the AFLW SQLite database, builds one record per labeled face,
//! assembles a COCO-style keypoint document, merges documents, and computes
//! dataset statistics over an assembled document.

pub mod assembler;
pub mod builder;
pub mod dataset;
pub mod extractor;
pub mod image_id;
pub mod merge;
pub mod profile;
pub mod schema;
pub mod stats;
pub mod types;

pub use assembler::SchemaAssembler;
pub use builder::{BuildDiagnostics, BuildOutput, FaceRecordBuilder, FsImageProbe, ImageProbe};
pub use dataset::{CocoDataset, DatasetSource, Example, LabeledBox};
pub use extractor::SourceStore;
pub use merge::{merge, RawDocument};
pub use profile::DatasetProfile;
pub use schema::AnnotationDocument;
pub use stats::{DatasetStatistics, StatisticsAggregator};
pub use types::FaceRecord;
