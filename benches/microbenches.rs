//! Criterion microbenches for datalens parsing, normalization and caching.
//!
//! Run with: `cargo bench`

use std::path::Path;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::hint::black_box;

use datalens::cache::{ImageCache, LruCache};
use datalens::dataset::{CocoJsonDataset, ImageId};
use datalens::hub::{normalize_rows, HubRow};
use image::RgbImage;
use serde_json::{json, Value};

fn coco_fixture(images: usize) -> String {
    let image_entries: Vec<Value> = (0..images)
        .map(|id| json!({"id": id, "file_name": format!("{id:06}.jpg"), "width": 640, "height": 480}))
        .collect();
    let annotations: Vec<Value> = (0..images * 4)
        .map(|id| {
            json!({"id": id, "image_id": id / 4, "category_id": id % 3, "bbox": [1.0, 2.0, 30.0, 40.0]})
        })
        .collect();
    json!({
        "images": image_entries,
        "categories": [{"id": 0, "name": "person"}, {"id": 1, "name": "car"}, {"id": 2, "name": "dog"}],
        "annotations": annotations,
    })
    .to_string()
}

fn hub_rows(count: usize) -> Vec<HubRow> {
    const NAMES: [&str; 4] = ["person", "car", "dog", "bicycle"];
    (0..count)
        .map(|idx| {
            let objects: Vec<Value> = (0..3)
                .map(|obj| json!({"category": NAMES[(idx + obj) % NAMES.len()], "bbox": [0, 0, 8, 8]}))
                .collect();
            let row = json!({"image_id": idx, "objects": objects});
            HubRow::new(row.as_object().cloned().unwrap_or_default())
        })
        .collect()
}

fn bench_coco_parse(c: &mut Criterion) {
    let fixture = coco_fixture(500);
    let mut group = c.benchmark_group("coco_parse");
    group.throughput(Throughput::Bytes(fixture.len() as u64));

    group.bench_function("from_coco_str", |b| {
        b.iter(|| {
            let ds = CocoJsonDataset::from_coco_str(black_box(&fixture), Path::new(".")).unwrap();
            black_box(ds)
        })
    });

    group.finish();
}

fn bench_hub_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub_normalize");
    group.throughput(Throughput::Elements(300));

    group.bench_function("row_oriented_objects", |b| {
        b.iter_batched(
            || hub_rows(300),
            |rows| black_box(normalize_rows(None, rows)),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_lru(c: &mut Criterion) {
    let image = Arc::new(RgbImage::new(1, 1));
    let mut group = c.benchmark_group("lru");
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("add_evicting", |b| {
        b.iter(|| {
            let mut cache: ImageCache<ImageId> = LruCache::new(250);
            for id in 0..10_000i64 {
                cache.add(ImageId::from(id), Arc::clone(&image));
            }
            black_box(cache.len())
        })
    });

    group.bench_function("add_if_room", |b| {
        b.iter(|| {
            let mut cache: ImageCache<ImageId> = LruCache::new(250);
            for id in 0..10_000i64 {
                cache.add_if_room(ImageId::from(id), Arc::clone(&image));
            }
            black_box(cache.len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_coco_parse, bench_hub_normalize, bench_lru);
criterion_main!(benches);
