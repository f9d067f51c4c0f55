//! Second pass over an already labeled image tree.
//!
//! Works only on files on disk: it regroups images and labels into a flat
//! train/val layout and exports every label as one COCO annotation file.

use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use crate::coco::{CocoFile, CocoWriter};
use crate::config::{dataset_dir_of, RefineConfig};
use crate::error::{LabelError, Result};
use crate::geometry::CenterBox;
use crate::io::Manifest;
use crate::types::{ClassVocabulary, DatasetSplit};
use crate::utils::{
    create_output_directory, create_progress_bar, list_image_files_recursive,
    read_image_dimensions,
};

/// Parse one YOLO label line into its class id and box. Blank, short, or
/// malformed lines yield `None`; tokens after the fifth are ignored.
pub fn parse_label_line(line: &str) -> Option<(usize, CenterBox)> {
    let tokens: Vec<&str> = line.split_whitespace().take(5).collect();
    if tokens.len() < 5 {
        return None;
    }
    let class_id = tokens[0].parse::<usize>().ok()?;
    let mut values = [0.0f64; 4];
    for (value, token) in values.iter_mut().zip(&tokens[1..]) {
        *value = token.parse::<f64>().ok()?;
    }
    let [x_center, y_center, width, height] = values;
    Some((class_id, CenterBox::new(x_center, y_center, width, height)))
}

/// Counts from a train/val regroup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegroupSummary {
    pub train: usize,
    pub val: usize,
    pub missing_labels: usize,
    /// Images that landed on a file name already written by this regroup.
    pub overwritten: usize,
}

#[derive(Debug, Clone)]
pub struct Refiner {
    images_dir: PathBuf,
    labels_dir: PathBuf,
}

impl Refiner {
    pub fn new(images_dir: impl Into<PathBuf>, labels_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
            labels_dir: labels_dir.into(),
        }
    }

    /// Label file mirroring the image's position under the images directory.
    pub fn label_path_for(&self, image_path: &Path) -> PathBuf {
        let relative = image_path
            .strip_prefix(&self.images_dir)
            .unwrap_or(image_path);
        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = relative.parent().unwrap_or_else(|| Path::new(""));
        self.labels_dir.join(parent).join(format!("{}.txt", stem))
    }

    /// Label file for an image named relative to the images directory: the
    /// mirrored nested location if it exists, else `<labels_dir>/<stem>.txt`.
    fn find_label(&self, image_name: &Path) -> Option<PathBuf> {
        let stem = image_name.file_stem()?.to_string_lossy().into_owned();
        let parent = image_name.parent().unwrap_or_else(|| Path::new(""));
        let nested = self.labels_dir.join(parent).join(format!("{}.txt", stem));
        if nested.is_file() {
            return Some(nested);
        }
        let flat = self.labels_dir.join(format!("{}.txt", stem));
        flat.is_file().then_some(flat)
    }

    /// Rewrite label files, keeping only boxes whose score reaches
    /// `min_confidence`.
    ///
    /// `confidence_file` is a JSON object mapping image names (relative to the
    /// images directory) to one score per label line, in line order. Lines
    /// without a score are dropped too. Images whose label file cannot be
    /// found are left alone. Returns the number of boxes removed.
    pub fn filter_low_confidence(
        &self,
        confidence_file: &Path,
        min_confidence: f64,
    ) -> Result<usize> {
        let file = File::open(confidence_file).map_err(|e| LabelError::io(confidence_file, e))?;
        let confidences: BTreeMap<String, Vec<f64>> =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                LabelError::DetectionParse {
                    path: confidence_file.to_path_buf(),
                    source,
                }
            })?;

        let mut removed = 0;
        for (image_name, scores) in &confidences {
            let Some(label_path) = self.find_label(Path::new(image_name)) else {
                debug!("No label file for {}", image_name);
                continue;
            };
            let content =
                fs::read_to_string(&label_path).map_err(|e| LabelError::io(&label_path, e))?;

            let mut kept = String::with_capacity(content.len());
            let lines = content.lines().filter(|line| !line.trim().is_empty());
            for (idx, line) in lines.enumerate() {
                match scores.get(idx) {
                    Some(&score) if score >= min_confidence => {
                        kept.push_str(line);
                        kept.push('\n');
                    }
                    _ => removed += 1,
                }
            }
            fs::write(&label_path, kept).map_err(|e| LabelError::io(&label_path, e))?;
        }

        info!("Removed {} low-confidence boxes", removed);
        Ok(removed)
    }

    /// Image path relative to the images directory, `/`-separated.
    pub fn relative_file_name(&self, image_path: &Path) -> String {
        let relative = image_path
            .strip_prefix(&self.images_dir)
            .unwrap_or(image_path);
        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Copy the first `floor(n * train_size)` images (in sorted walk order)
    /// into `train/` and the rest into `val/`, next to the images directory,
    /// then write a manifest to `yaml_output`. No shuffling happens here.
    pub fn create_yolo_dataset_yaml(
        &self,
        yaml_output: &Path,
        class_names: &[String],
        train_size: f64,
    ) -> Result<RegroupSummary> {
        let image_files = list_image_files_recursive(&self.images_dir);
        let split_idx =
            ((image_files.len() as f64 * train_size).floor() as usize).min(image_files.len());
        let (train_images, val_images) = image_files.split_at(split_idx);

        let dataset_dir = dataset_dir_of(&self.images_dir);
        let mut summary = RegroupSummary::default();
        let pb = create_progress_bar(image_files.len() as u64, "Regroup");

        let splits = [
            (DatasetSplit::Train, train_images),
            (DatasetSplit::Val, val_images),
        ];
        for (split, images) in splits {
            let split_dir = dataset_dir.join(split.dir_name());
            let images_out = create_output_directory(&split_dir.join("images"))?;
            let labels_out = create_output_directory(&split_dir.join("labels"))?;
            let mut written = HashSet::new();

            for image_path in images {
                let file_name = image_path.file_name().unwrap_or_default();
                if !written.insert(file_name.to_os_string()) {
                    warn!(
                        "{} overwrites an image of the same name in {}",
                        image_path.display(),
                        images_out.display()
                    );
                    summary.overwritten += 1;
                }
                fs::copy(image_path, images_out.join(file_name))
                    .map_err(|e| LabelError::io(image_path, e))?;

                let label_path = self.label_path_for(image_path);
                if label_path.is_file() {
                    let label_name = label_path.file_name().unwrap_or_default();
                    fs::copy(&label_path, labels_out.join(label_name))
                        .map_err(|e| LabelError::io(&label_path, e))?;
                } else {
                    debug!("No label for {}", image_path.display());
                    summary.missing_labels += 1;
                }
                pb.inc(1);
            }
        }
        pb.finish_with_message("Regroup complete");
        summary.train = train_images.len();
        summary.val = val_images.len();

        let absolute_path =
            fs::canonicalize(&dataset_dir).map_err(|e| LabelError::io(&dataset_dir, e))?;
        let manifest = Manifest {
            path: absolute_path,
            train: "train/images".to_string(),
            val: "val/images".to_string(),
            test: None,
            names: class_names.to_vec(),
        };
        manifest.write(yaml_output)?;

        info!(
            "Created {} with {} train, {} val images",
            yaml_output.display(),
            summary.train,
            summary.val
        );
        Ok(summary)
    }

    /// Build the COCO export from the label files. Pixel boxes use the real
    /// image size read from each file. Images without a label file are listed
    /// with no annotations.
    pub fn build_coco(&self, class_names: &[String]) -> CocoFile {
        let mut writer = CocoWriter::new(class_names);
        let image_files = list_image_files_recursive(&self.images_dir);
        let pb = create_progress_bar(image_files.len() as u64, "COCO");

        for image_path in &image_files {
            pb.inc(1);
            let (width, height) = match read_image_dimensions(image_path) {
                Ok(dimensions) => dimensions,
                Err(e) => {
                    warn!("Skipping image from COCO export: {}", e);
                    continue;
                }
            };
            let image_id = writer.add_image(self.relative_file_name(image_path), width, height);

            let label_path = self.label_path_for(image_path);
            let bytes = match fs::read(&label_path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("No label file for {}", image_path.display());
                    continue;
                }
                Err(e) => {
                    warn!("Cannot read {}: {}", label_path.display(), e);
                    continue;
                }
            };
            // undecodable lines come out malformed and are reported below
            let content = String::from_utf8_lossy(&bytes);

            for line in content.lines() {
                match parse_label_line(line) {
                    Some((class_id, bbox)) => {
                        let pixel = bbox.to_pixel(width as f64, height as f64);
                        writer.add_annotation(image_id, class_id as u32, &pixel);
                    }
                    None if !line.trim().is_empty() => {
                        warn!(
                            "Ignoring malformed line {:?} in {}",
                            line,
                            label_path.display()
                        );
                    }
                    None => {}
                }
            }
        }
        pb.finish_with_message("COCO export complete");

        writer.build()
    }

    /// Build the COCO export and write it as pretty-printed JSON.
    pub fn export_to_coco(&self, output_path: &Path, class_names: &[String]) -> Result<CocoFile> {
        let coco = self.build_coco(class_names);

        let file = File::create(output_path).map_err(|e| LabelError::io(output_path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &coco)?;
        writer.flush().map_err(|e| LabelError::io(output_path, e))?;

        info!(
            "Exported {} images with {} annotations to {}",
            coco.images.len(),
            coco.annotations.len(),
            output_path.display()
        );
        Ok(coco)
    }
}

/// Run the refinement steps selected on the command line.
pub fn refine_dataset(config: &RefineConfig, skip_split: bool, skip_coco: bool) -> Result<()> {
    if !config.images_dir.is_dir() {
        return Err(LabelError::SourceDirMissing(config.images_dir.clone()));
    }
    let vocabulary = ClassVocabulary::from_file(&config.classes_file)?;
    let refiner = Refiner::new(&config.images_dir, &config.labels_dir);

    if let Some(confidence_file) = &config.confidence_file {
        refiner.filter_low_confidence(confidence_file, config.min_confidence)?;
    }

    if !skip_split {
        let summary = refiner.create_yolo_dataset_yaml(
            &config.yaml_output,
            vocabulary.names(),
            config.train_size,
        )?;
        if summary.missing_labels > 0 {
            warn!("{} image(s) had no label file", summary.missing_labels);
        }
        if summary.overwritten > 0 {
            warn!(
                "{} image(s) were overwritten by a same-named image from another folder",
                summary.overwritten
            );
        }
    }
    if !skip_coco {
        refiner.export_to_coco(&config.coco_output, vocabulary.names())?;
    }
    Ok(())
}
