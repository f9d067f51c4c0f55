use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::warn;

use crate::error::{LabelError, Result};
use crate::geometry::CenterBox;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "webp"];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Whether `path` carries one of the allowed image extensions (case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| get_image_extensions_set().contains(&ext.to_string_lossy().to_lowercase()))
        .unwrap_or(false)
}

/// A normalized box kept for one image, ready to be written as a label line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: CenterBox,
    pub confidence: f64,
    pub class_idx: usize,
}

impl Detection {
    pub fn new(bbox: CenterBox, confidence: f64, class_idx: usize) -> Self {
        Self {
            bbox,
            confidence,
            class_idx,
        }
    }
}

/// Ordered, duplicate-free list of class names. A class id is its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassVocabulary {
    names: Vec<String>,
}

impl ClassVocabulary {
    /// Build from names in order. Blank names are ignored and later duplicates
    /// are dropped. Fails when nothing is left.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if seen.insert(name.to_string()) {
                ordered.push(name.to_string());
            } else {
                warn!("Duplicate class name {:?} ignored", name);
            }
        }

        if ordered.is_empty() {
            return Err(LabelError::EmptyVocabulary);
        }
        Ok(Self { names: ordered })
    }

    /// Load a newline-delimited UTF-8 class list.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(LabelError::VocabularyMissing(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| LabelError::io(path, e))?;
        Self::from_names(content.lines())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// One of the three dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum DatasetSplit {
    Train,
    Val,
    Test,
}

impl DatasetSplit {
    pub const ALL: [DatasetSplit; 3] = [DatasetSplit::Train, DatasetSplit::Val, DatasetSplit::Test];

    /// Directory name used on disk.
    pub fn dir_name(&self) -> &'static str {
        match self {
            DatasetSplit::Train => "train",
            DatasetSplit::Val => "val",
            DatasetSplit::Test => "test",
        }
    }
}

impl fmt::Display for DatasetSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

// Struct to hold the paths to the output directories for train/val/test splits
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub train_images_dir: PathBuf,
    pub train_labels_dir: PathBuf,
    pub val_images_dir: PathBuf,
    pub val_labels_dir: PathBuf,
    pub test_images_dir: PathBuf,
    pub test_labels_dir: PathBuf,
}

impl OutputDirs {
    pub fn images_dir(&self, split: DatasetSplit) -> &Path {
        match split {
            DatasetSplit::Train => &self.train_images_dir,
            DatasetSplit::Val => &self.val_images_dir,
            DatasetSplit::Test => &self.test_images_dir,
        }
    }

    pub fn labels_dir(&self, split: DatasetSplit) -> &Path {
        match split {
            DatasetSplit::Train => &self.train_labels_dir,
            DatasetSplit::Val => &self.val_labels_dir,
            DatasetSplit::Test => &self.test_labels_dir,
        }
    }
}

// Struct to hold the split image lists for training, validation, and testing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitData<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
    pub test: Vec<T>,
}

impl<T> SplitData<T> {
    pub fn get(&self, split: DatasetSplit) -> &[T] {
        match split {
            DatasetSplit::Train => &self.train,
            DatasetSplit::Val => &self.val,
            DatasetSplit::Test => &self.test,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counters for a single class folder.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FolderStats {
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub skipped: usize,
}

impl FolderStats {
    pub fn labeled(&self) -> usize {
        self.train + self.val + self.test
    }
}

// Struct to hold processing statistics for a whole run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub skipped: usize,
    pub class_distribution: BTreeMap<String, usize>,
}

impl ProcessingStats {
    /// Start with a zero entry for every class so unbalanced classes show up.
    pub fn new(vocabulary: &ClassVocabulary) -> Self {
        Self {
            class_distribution: vocabulary.names().iter().map(|n| (n.clone(), 0)).collect(),
            ..Default::default()
        }
    }

    pub fn add_folder(&mut self, class_name: &str, folder: &FolderStats) {
        self.train += folder.train;
        self.val += folder.val;
        self.test += folder.test;
        self.skipped += folder.skipped;
        *self
            .class_distribution
            .entry(class_name.to_string())
            .or_insert(0) += folder.labeled();
    }

    pub fn labeled(&self) -> usize {
        self.train + self.val + self.test
    }

    pub fn print_summary(&self) {
        log::info!("=== Labeling Summary ===");
        log::info!("Classes: {}", self.class_distribution.len());
        log::info!("Train images: {}", self.train);
        log::info!("Validation images: {}", self.val);
        log::info!("Test images: {}", self.test);
        log::info!("Skipped images: {}", self.skipped);
        for (class_name, count) in &self.class_distribution {
            log::debug!("  {}: {}", class_name, count);
        }

        let empty: Vec<&str> = self
            .class_distribution
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| name.as_str())
            .collect();
        if !empty.is_empty() {
            log::warn!("{} class(es) have no labeled images: {:?}", empty.len(), empty);
        }
        if self.skipped > 0 {
            log::warn!(
                "Total skipped images: {} (no detections, detector or decode failure)",
                self.skipped
            );
        }
    }
}
