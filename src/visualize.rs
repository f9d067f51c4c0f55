//! Draw YOLO labels onto dataset images and save them for a visual check.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::VisualizeConfig;
use crate::error::{LabelError, Result};
use crate::geometry::CenterBox;
use crate::io::{read_manifest_names, MANIFEST_FILE_NAME};
use crate::refiner::parse_label_line;
use crate::types::{ClassVocabulary, DatasetSplit};
use crate::utils::{create_output_directory, create_progress_bar, list_image_files};

const LABEL_PADDING: u32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Load a TrueType/OpenType font for label text.
pub fn load_font(path: &Path) -> Result<FontArc> {
    let data = fs::read(path).map_err(|e| LabelError::io(path, e))?;
    FontArc::try_from_vec(data).map_err(|_| LabelError::Font(path.to_path_buf()))
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}

pub struct LabelVisualizer {
    vocabulary: ClassVocabulary,
    colors: Vec<Rgb<u8>>,
    /// Without a font only the boxes are drawn.
    font: Option<FontArc>,
    font_scale: PxScale,
}

impl LabelVisualizer {
    pub fn new(vocabulary: ClassVocabulary, font: Option<FontArc>) -> Self {
        let n = vocabulary.len().max(1);
        let colors = (0..n)
            .map(|i| hsv_to_rgb(i as f32 / n as f32 * 360.0, 0.8, 0.9))
            .collect();

        Self {
            vocabulary,
            colors,
            font,
            font_scale: PxScale::from(16.0),
        }
    }

    pub fn class_color(&self, class_id: usize) -> Rgb<u8> {
        self.colors[class_id % self.colors.len()]
    }

    pub fn label_text(&self, class_id: usize) -> String {
        match self.vocabulary.name(class_id) {
            Some(name) => name.to_string(),
            None => format!("Class {}", class_id),
        }
    }

    /// Draw each normalized label box, two pixels wide, with a filled name tab
    /// above its top-left corner.
    pub fn draw_labels(&self, image: &mut RgbImage, labels: &[(usize, CenterBox)]) {
        let (w, h) = (image.width() as f64, image.height() as f64);
        for (class_id, bbox) in labels {
            let color = self.class_color(*class_id);
            let pixel = bbox.to_pixel(w, h);

            let x1 = pixel.x.max(0.0);
            let y1 = pixel.y.max(0.0);
            let box_w = ((pixel.x + pixel.width).min(w) - x1).max(0.0) as u32;
            let box_h = ((pixel.y + pixel.height).min(h) - y1).max(0.0) as u32;
            let (x, y) = (x1 as i32, y1 as i32);

            if box_w > 0 && box_h > 0 {
                draw_hollow_rect_mut(image, Rect::at(x, y).of_size(box_w, box_h), color);
                if box_w > 2 && box_h > 2 {
                    let inner = Rect::at(x + 1, y + 1).of_size(box_w - 2, box_h - 2);
                    draw_hollow_rect_mut(image, inner, color);
                }
            }

            if let Some(font) = &self.font {
                let text = self.label_text(*class_id);
                let (text_w, text_h) = text_size(self.font_scale, font, &text);
                let tab_h = text_h + 2 * LABEL_PADDING;
                let tab_y = (y - tab_h as i32).max(0);
                let tab = Rect::at(x, tab_y).of_size(text_w + 2 * LABEL_PADDING, tab_h);
                draw_filled_rect_mut(image, tab, color);
                draw_text_mut(
                    image,
                    TEXT_COLOR,
                    x + LABEL_PADDING as i32,
                    tab_y + LABEL_PADDING as i32,
                    self.font_scale,
                    font,
                    &text,
                );
            }
        }
    }

    /// Decode an image and draw the boxes of its label file. A missing label
    /// file yields the undecorated image.
    pub fn render(&self, image_path: &Path, label_path: &Path) -> Result<RgbImage> {
        let mut image = image::open(image_path)
            .map_err(|source| LabelError::Image {
                path: image_path.to_path_buf(),
                source,
            })?
            .to_rgb8();

        let labels: Vec<(usize, CenterBox)> = match fs::read(label_path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .filter_map(parse_label_line)
                .collect(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No label file for {}", image_path.display());
                Vec::new()
            }
            Err(e) => return Err(LabelError::io(label_path, e)),
        };

        self.draw_labels(&mut image, &labels);
        Ok(image)
    }

    /// Render a seeded sample of `num_samples` images from one split of a
    /// dataset and save them as `<split>_<nnn>_<stem>.png` under `output_dir`.
    /// Images that fail to render are skipped with a warning.
    pub fn visualize_split(
        &self,
        dataset_dir: &Path,
        split: DatasetSplit,
        num_samples: usize,
        seed: u64,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let split_dir = dataset_dir.join(split.dir_name());
        let images_dir = split_dir.join("images");
        let labels_dir = split_dir.join("labels");
        if !images_dir.is_dir() {
            return Err(LabelError::SourceDirMissing(images_dir));
        }

        let image_files = list_image_files(&images_dir);
        if image_files.is_empty() {
            warn!("No images found in {}", images_dir.display());
            return Ok(Vec::new());
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let sampled: Vec<&PathBuf> = image_files.choose_multiple(&mut rng, num_samples).collect();
        info!("Visualizing {} images from the {} split", sampled.len(), split);

        create_output_directory(output_dir)?;
        let pb = create_progress_bar(sampled.len() as u64, "Visualize");
        let mut saved = Vec::with_capacity(sampled.len());

        for (i, image_path) in sampled.into_iter().enumerate() {
            pb.inc(1);
            let stem = image_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let label_path = labels_dir.join(format!("{}.txt", stem));

            let rendered = match self.render(image_path, &label_path) {
                Ok(rendered) => rendered,
                Err(e) => {
                    warn!("Skipping visualization: {}", e);
                    continue;
                }
            };

            let save_path = output_dir.join(format!("{}_{:03}_{}.png", split, i, stem));
            rendered.save(&save_path).map_err(|source| LabelError::Image {
                path: save_path.clone(),
                source,
            })?;
            saved.push(save_path);
        }
        pb.finish_with_message("Visualization complete");

        info!("Saved {} images to {}", saved.len(), output_dir.display());
        Ok(saved)
    }
}

/// Build a visualizer from the configuration and render one split.
///
/// Class names come from the classes file when given, otherwise from the
/// dataset's `data.yaml`.
pub fn visualize_dataset(config: &VisualizeConfig) -> Result<Vec<PathBuf>> {
    let vocabulary = match &config.classes_file {
        Some(classes_file) => ClassVocabulary::from_file(classes_file)?,
        None => ClassVocabulary::from_names(read_manifest_names(
            &config.dataset_dir.join(MANIFEST_FILE_NAME),
        )?)?,
    };
    let font = match &config.font {
        Some(path) => Some(load_font(path)?),
        None => {
            info!("No font given, drawing boxes without class names");
            None
        }
    };

    LabelVisualizer::new(vocabulary, font).visualize_split(
        &config.dataset_dir,
        config.split,
        config.num_samples,
        config.seed,
        &config.output_dir,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visualizer() -> LabelVisualizer {
        LabelVisualizer::new(
            ClassVocabulary::from_names(["tomato", "onion"]).unwrap(),
            None,
        )
    }

    #[test]
    fn test_label_text_falls_back_to_index() {
        let viz = visualizer();
        assert_eq!(viz.label_text(1), "onion");
        assert_eq!(viz.label_text(7), "Class 7");
        assert_eq!(viz.class_color(0), viz.class_color(2));
        assert_ne!(viz.class_color(0), viz.class_color(1));
    }

    #[test]
    fn test_draw_labels_outlines_box() {
        let viz = visualizer();
        let mut image = RgbImage::new(128, 128);
        viz.draw_labels(&mut image, &[(1, CenterBox::new(0.5, 0.5, 0.5, 0.5))]);

        let color = viz.class_color(1);
        assert_eq!(*image.get_pixel(32, 32), color);
        assert_eq!(*image.get_pixel(33, 64), color);
        assert_eq!(*image.get_pixel(95, 95), color);
        assert_eq!(*image.get_pixel(64, 64), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_labels_clips_to_image() {
        let viz = visualizer();
        let mut image = RgbImage::new(20, 20);
        viz.draw_labels(&mut image, &[(0, CenterBox::new(0.0, 0.0, 1.0, 1.0))]);
        assert_eq!(*image.get_pixel(0, 0), viz.class_color(0));
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), Rgb([0, 255, 0]));
    }
}
