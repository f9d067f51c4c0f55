use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or exporting a labeled dataset.
///
/// Run-level variants (missing source dir, empty vocabulary, bad split) abort
/// the run. Image-level variants are caught by the orchestrator, logged, and
/// counted as skipped.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("source directory does not exist: {0}")]
    SourceDirMissing(PathBuf),

    #[error("class vocabulary file not found: {0}")]
    VocabularyMissing(PathBuf),

    #[error("class vocabulary is empty")]
    EmptyVocabulary,

    #[error("split fractions must sum to 1.0, got {train} + {val} + {test} = {sum}")]
    InvalidSplit {
        train: f64,
        val: f64,
        test: f64,
        sum: f64,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read image dimensions for {path}: {source}")]
    ImageDimensions {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("image error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("not a usable font file: {0}")]
    Font(PathBuf),

    #[error("failed to parse detections from {path}: {source}")]
    DetectionParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("detector failed on {path}: {message}")]
    Detector { path: PathBuf, message: String },

    #[error("failed to serialize COCO export: {0}")]
    CocoSerialize(#[from] serde_json::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl LabelError {
    /// Attach a path to an `std::io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LabelError>;
