use log::warn;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{LabelError, Result};
use crate::types::{DatasetSplit, Detection, OutputDirs};
use crate::utils::{create_output_directory, parse_yaml_name_list, yaml_name_list, yaml_quote};

pub const MANIFEST_FILE_NAME: &str = "data.yaml";

/// Set up `<root>/{train,val,test}/{images,labels}`. Safe to call repeatedly.
pub fn setup_output_directories(root: &Path) -> Result<OutputDirs> {
    let dir = |split: DatasetSplit, kind: &str| {
        create_output_directory(&root.join(split.dir_name()).join(kind))
    };

    Ok(OutputDirs {
        root: root.to_path_buf(),
        train_images_dir: dir(DatasetSplit::Train, "images")?,
        train_labels_dir: dir(DatasetSplit::Train, "labels")?,
        val_images_dir: dir(DatasetSplit::Val, "images")?,
        val_labels_dir: dir(DatasetSplit::Val, "labels")?,
        test_images_dir: dir(DatasetSplit::Test, "images")?,
        test_labels_dir: dir(DatasetSplit::Test, "labels")?,
    })
}

/// Render detections as YOLO label lines:
/// `<class_idx> <x_center> <y_center> <width> <height>`, six decimals each.
pub fn format_label_lines(detections: &[Detection]) -> String {
    let mut yolo_data = String::with_capacity(detections.len() * 48);
    for det in detections {
        let b = &det.bbox;
        // writing to a String cannot fail
        let _ = writeln!(
            yolo_data,
            "{} {:.6} {:.6} {:.6} {:.6}",
            det.class_idx, b.x_center, b.y_center, b.width, b.height
        );
    }
    yolo_data
}

/// Write (or overwrite) a YOLO label file.
pub fn write_label(path: &Path, detections: &[Detection]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path).map_err(|e| LabelError::io(path, e))?);
    writer
        .write_all(format_label_lines(detections).as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| LabelError::io(path, e))
}

/// Output stem for an image of `class_name`: `<class>_<original stem>`,
/// sanitized so it is a valid file name. Folders are prefixed so two classes
/// cannot produce the same name.
pub fn output_stem(class_name: &str, image_path: &Path) -> String {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_filename::sanitize(format!("{}_{}", class_name, stem))
}

/// Output stems for every image of one class folder, in input order.
///
/// Images whose stems clash (`a.png` and `a.jpg`) get their extension
/// appended; anything still clashing gets a numeric suffix. The result only
/// depends on the input order, so it is the same on every run.
pub fn unique_output_stems(class_name: &str, image_paths: &[PathBuf]) -> Vec<String> {
    let bases: Vec<String> = image_paths
        .iter()
        .map(|path| output_stem(class_name, path))
        .collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for base in &bases {
        *counts.entry(base.as_str()).or_insert(0) += 1;
    }

    let mut taken = HashSet::new();
    let mut stems = Vec::with_capacity(bases.len());
    for (path, base) in image_paths.iter().zip(&bases) {
        let mut stem = match path.extension() {
            Some(ext) if counts[base.as_str()] > 1 => {
                sanitize_filename::sanitize(format!("{}_{}", base, ext.to_string_lossy()))
            }
            _ => base.clone(),
        };
        let mut suffix = 1;
        while taken.contains(&stem) {
            stem = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        if stem != *base {
            warn!(
                "{} shares its name with another image, writing it as {}",
                path.display(),
                stem
            );
        }
        taken.insert(stem.clone());
        stems.push(stem);
    }
    stems
}

/// Copy a labeled image into a split as `<stem>.<ext>` and write
/// `<stem>.txt` next to it. Returns the destination image path.
pub fn emit_labeled_image(
    image_path: &Path,
    stem: &str,
    detections: &[Detection],
    images_dir: &Path,
    labels_dir: &Path,
) -> Result<PathBuf> {
    let file_name = match image_path.extension() {
        Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
        None => stem.to_string(),
    };

    let image_output_path = images_dir.join(file_name);
    fs::copy(image_path, &image_output_path).map_err(|e| LabelError::io(image_path, e))?;

    let label_output_path = labels_dir.join(format!("{}.txt", stem));
    write_label(&label_output_path, detections)?;

    Ok(image_output_path)
}

/// Dataset description consumed by training tools.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub path: PathBuf,
    pub train: String,
    pub val: String,
    pub test: Option<String>,
    pub names: Vec<String>,
}

impl Manifest {
    /// The standard three-split layout produced by the labeler.
    pub fn for_splits(path: PathBuf, names: Vec<String>) -> Self {
        let images = |split: DatasetSplit| format!("{}/images", split.dir_name());
        Self {
            path,
            train: images(DatasetSplit::Train),
            val: images(DatasetSplit::Val),
            test: Some(images(DatasetSplit::Test)),
            names,
        }
    }

    pub fn render(&self) -> String {
        let mut yaml_content = format!(
            "path: {}\ntrain: {}\nval: {}\n",
            yaml_quote(&self.path.to_string_lossy()),
            self.train,
            self.val
        );
        if let Some(test) = &self.test {
            yaml_content.push_str(&format!("test: {}\n", test));
        }
        yaml_content.push_str(&format!("\nnc: {}\n", self.names.len()));
        yaml_content.push_str(&format!("names: {}\n", yaml_name_list(&self.names)));
        yaml_content
    }

    /// Write the manifest, replacing any previous one.
    pub fn write(&self, output_path: &Path) -> Result<()> {
        fs::write(output_path, self.render()).map_err(|e| LabelError::io(output_path, e))
    }
}

/// Create the `data.yaml` file for a dataset rooted at `root`.
pub fn create_dataset_yaml(root: &Path, class_names: &[String]) -> Result<PathBuf> {
    let absolute_path = fs::canonicalize(root).map_err(|e| LabelError::io(root, e))?;
    let manifest_path = root.join(MANIFEST_FILE_NAME);
    Manifest::for_splits(absolute_path, class_names.to_vec()).write(&manifest_path)?;
    Ok(manifest_path)
}

/// Read the class names back from a manifest's `names:` line.
pub fn read_manifest_names(manifest_path: &Path) -> Result<Vec<String>> {
    if !manifest_path.is_file() {
        return Err(LabelError::VocabularyMissing(manifest_path.to_path_buf()));
    }
    let content =
        fs::read_to_string(manifest_path).map_err(|e| LabelError::io(manifest_path, e))?;
    content
        .lines()
        .find_map(|line| line.strip_prefix("names:"))
        .and_then(parse_yaml_name_list)
        .filter(|names| !names.is_empty())
        .ok_or(LabelError::EmptyVocabulary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CenterBox;

    #[test]
    fn test_format_label_lines() {
        let dets = vec![
            Detection::new(CenterBox::new(0.15, 0.15, 0.1, 0.1), 0.9, 0),
            Detection::new(CenterBox::new(0.5, 0.25, 1.0, 0.333333333), 0.4, 12),
        ];
        assert_eq!(
            format_label_lines(&dets),
            "0 0.150000 0.150000 0.100000 0.100000\n12 0.500000 0.250000 1.000000 0.333333\n"
        );
        assert_eq!(format_label_lines(&[]), "");
    }

    #[test]
    fn test_output_stem_prefixes_class() {
        assert_eq!(
            output_stem("green onion", Path::new("/x/green onion/img_01.JPG")),
            "green onion_img_01"
        );
        assert_eq!(output_stem("a/b", Path::new("c.png")), "ab_c");
    }

    #[test]
    fn test_unique_output_stems_resolve_clashes() {
        let paths: Vec<PathBuf> = ["a.jpg", "a.png", "b.png", "a_png.png"]
            .iter()
            .map(|name| PathBuf::from("tomato").join(name))
            .collect();
        assert_eq!(
            unique_output_stems("tomato", &paths),
            vec!["tomato_a_jpg", "tomato_a_png", "tomato_b", "tomato_a_png_1"]
        );
        assert_eq!(
            unique_output_stems("tomato", &paths[2..3]),
            vec!["tomato_b"]
        );
    }

    #[test]
    fn test_setup_output_directories_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let first = setup_output_directories(dir.path()).unwrap();
        let second = setup_output_directories(dir.path()).unwrap();
        assert_eq!(first.val_labels_dir, second.val_labels_dir);
        for split in DatasetSplit::ALL {
            assert!(first.images_dir(split).is_dir());
            assert!(first.labels_dir(split).is_dir());
        }
    }

    #[test]
    fn test_manifest_render() {
        let manifest = Manifest::for_splits(
            PathBuf::from("/data/out"),
            vec!["tomato".to_string(), "soy sauce".to_string()],
        );
        assert_eq!(
            manifest.render(),
            "path: '/data/out'\ntrain: train/images\nval: val/images\ntest: test/images\n\nnc: 2\nnames: ['tomato', 'soy sauce']\n"
        );
    }

    #[test]
    fn test_manifest_quotes_awkward_root() {
        let manifest = Manifest::for_splits(
            PathBuf::from("/data/it's: here"),
            vec!["tomato".to_string()],
        );
        assert!(manifest
            .render()
            .starts_with("path: '/data/it''s: here'\ntrain: train/images\n"));
    }

    #[test]
    fn test_create_dataset_yaml_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        create_dataset_yaml(dir.path(), &["a".to_string()]).unwrap();
        let path = create_dataset_yaml(dir.path(), &["a".to_string(), "b".to_string()]).unwrap();
        let yaml_content = fs::read_to_string(&path).unwrap();
        assert!(yaml_content.contains("nc: 2\n"));
        assert!(yaml_content.contains("names: ['a', 'b']"));
        assert_eq!(
            read_manifest_names(&path).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_read_manifest_names_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        assert!(matches!(
            read_manifest_names(&path),
            Err(LabelError::VocabularyMissing(_))
        ));
        fs::write(&path, "path: '.'\nnc: 0\n").unwrap();
        assert!(matches!(
            read_manifest_names(&path),
            Err(LabelError::EmptyVocabulary)
        ));
    }
}
