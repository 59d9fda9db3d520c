#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Writes a solid RGB PNG, creating parent directories.
pub fn write_rgb(path: &Path, width: u32, height: u32, color: [u8; 3]) {
    create_parent(path);
    RgbImage::from_pixel(width, height, Rgb(color))
        .save(path)
        .expect("write rgb image");
}

/// Writes a solid single-channel PNG.
pub fn write_gray(path: &Path, width: u32, height: u32, value: u8) {
    create_parent(path);
    GrayImage::from_pixel(width, height, Luma([value]))
        .save(path)
        .expect("write gray image");
}

/// Writes `json` as `name` under `dir` and returns its path.
pub fn write_json(dir: &Path, name: &str, json: &str) -> PathBuf {
    let path = dir.join(name);
    create_parent(&path);
    fs::write(&path, json).expect("write json");
    path
}

/// A COCO document with one image per `(id, file_name)`, one `cat` category
/// and one box per image.
pub fn coco_json(images: &[(i64, &str)]) -> String {
    let image_entries: Vec<_> = images
        .iter()
        .map(|(id, file)| serde_json::json!({"id": id, "file_name": file}))
        .collect();
    let annotations: Vec<_> = images
        .iter()
        .map(|(id, _)| {
            serde_json::json!({"id": id, "image_id": id, "category_id": 1, "bbox": [0, 0, 1, 1]})
        })
        .collect();
    serde_json::json!({
        "images": image_entries,
        "categories": [{"id": 1, "name": "cat"}],
        "annotations": annotations,
    })
    .to_string()
}

fn create_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
}
