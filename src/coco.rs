//! COCO format data structures
//!
//! Only the object-detection subset is produced: `images`, `annotations`
//! and `categories`. Ids are assigned sequentially from zero in insertion order.

use serde::{Deserialize, Serialize};

use crate::geometry::PixelBox;

pub const SUPERCATEGORY: &str = "ingredient";

/// COCO category information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
    pub supercategory: String,
}

/// COCO image information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: u32,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// COCO annotation information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u32,
    pub image_id: u32,
    pub category_id: u32,
    pub bbox: [f64; 4], // [x, y, width, height]
    pub area: f64,
    pub iscrowd: u32,
}

/// Complete COCO dataset structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CocoFile {
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
}

/// Accumulates images and annotations and hands out their ids.
#[derive(Debug, Default)]
pub struct CocoWriter {
    next_image_id: u32,
    next_annotation_id: u32,
    coco: CocoFile,
}

impl CocoWriter {
    /// Create a writer whose categories are `class_names`, id = index.
    pub fn new(class_names: &[String]) -> Self {
        let categories = class_names
            .iter()
            .enumerate()
            .map(|(id, name)| Category {
                id: id as u32,
                name: name.clone(),
                supercategory: SUPERCATEGORY.to_string(),
            })
            .collect();

        Self {
            coco: CocoFile {
                categories,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Add an image and return its id.
    pub fn add_image(&mut self, file_name: String, width: u32, height: u32) -> u32 {
        let image_id = self.next_image_id;
        self.next_image_id += 1;
        self.coco.images.push(Image {
            id: image_id,
            file_name,
            width,
            height,
        });
        image_id
    }

    /// Add a box annotation for an image and return its id.
    pub fn add_annotation(&mut self, image_id: u32, category_id: u32, bbox: &PixelBox) -> u32 {
        let annotation_id = self.next_annotation_id;
        self.next_annotation_id += 1;
        self.coco.annotations.push(Annotation {
            id: annotation_id,
            image_id,
            category_id,
            bbox: bbox.to_array(),
            area: bbox.area(),
            iscrowd: 0,
        });
        annotation_id
    }

    pub fn build(self) -> CocoFile {
        self.coco
    }
}
