//! Dataset summaries for the `inspect` command.
//!
//! Works on the normalized [`Dataset`], so every source variant reports the
//! same way.

mod report;

pub use report::{InspectReport, LabelCount, LabelsSection, SummarySection};

use std::collections::{BTreeSet, HashMap};

use crate::dataset::Dataset;

/// Options for dataset inspection.
#[derive(Clone, Debug)]
pub struct InspectOptions {
    /// Number of labels listed before the rest are folded into "(other)".
    pub top_labels: usize,
    /// Width of histogram bars, in characters.
    pub bar_width: usize,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            top_labels: 10,
            bar_width: 20,
        }
    }
}

/// Summarizes `dataset`, named `name` in the report header.
pub fn inspect_dataset(name: &str, dataset: &Dataset, opts: &InspectOptions) -> InspectReport {
    InspectReport {
        name: name.to_string(),
        summary: compute_summary(dataset),
        labels: compute_labels(dataset, opts.top_labels),
        bar_width: opts.bar_width,
    }
}

fn compute_summary(dataset: &Dataset) -> SummarySection {
    let annotated: BTreeSet<_> = dataset
        .annotations
        .values()
        .map(|ann| &ann.image_id)
        .filter(|id| dataset.images.contains_key(*id))
        .collect();

    SummarySection {
        images: dataset.images.len(),
        categories: dataset.categories.len(),
        annotations: dataset.annotations.len(),
        annotated_images: annotated.len(),
        sized_images: dataset
            .images
            .values()
            .filter(|image| image.width.is_some() && image.height.is_some())
            .count(),
    }
}

fn compute_labels(dataset: &Dataset, top_n: usize) -> LabelsSection {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for ann in dataset.annotations.values() {
        let label = dataset
            .category_name(ann.category_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("<missing cat {}>", ann.category_id.as_i64()));
        *counts.entry(label).or_default() += 1;
    }

    // Count descending, then name, so output is stable.
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total_distinct = sorted.len();
    let other_count = sorted.iter().skip(top_n).map(|(_, count)| count).sum();
    sorted.truncate(top_n);

    LabelsSection {
        top_n,
        total_distinct,
        total_annotations: dataset.annotations.len(),
        entries: sorted
            .into_iter()
            .map(|(label, count)| LabelCount { label, count })
            .collect(),
        other_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{AnnotationRecord, CategoryRecord, ImageLocation, ImageRecord};
    use serde_json::json;

    fn sample() -> Dataset {
        let mut dataset = Dataset::default();
        for (id, sized) in [(1i64, true), (2, false), (3, true)] {
            let mut image = ImageRecord::new(id, ImageLocation::File(format!("{id}.jpg")));
            if sized {
                image = image.with_size(64, 48);
            }
            dataset.images.insert(image.id.clone(), image);
        }
        for (id, name) in [(1i64, "person"), (2, "car")] {
            let category = CategoryRecord::new(id, name);
            dataset.categories.insert(category.id, category);
        }
        for (id, image, category) in [(1i64, 1i64, 1i64), (2, 1, 1), (3, 2, 2), (4, 9, 7)] {
            let ann = AnnotationRecord::new(id, image, category, json!([0, 0, 1, 1]));
            dataset.annotations.insert(ann.id.clone(), ann);
        }
        dataset
    }

    #[test]
    fn summary_counts() {
        let report = inspect_dataset("sample", &sample(), &InspectOptions::default());
        assert_eq!(report.summary.images, 3);
        assert_eq!(report.summary.categories, 2);
        assert_eq!(report.summary.annotations, 4);
        assert_eq!(report.summary.annotated_images, 2);
        assert_eq!(report.summary.sized_images, 2);
    }

    #[test]
    fn labels_sorted_with_missing_categories_named() {
        let report = inspect_dataset("sample", &sample(), &InspectOptions::default());
        let labels: Vec<_> = report
            .labels
            .entries
            .iter()
            .map(|entry| (entry.label.as_str(), entry.count))
            .collect();
        assert_eq!(labels, vec![("person", 2), ("<missing cat 7>", 1), ("car", 1)]);
    }

    #[test]
    fn labels_beyond_top_n_fold_into_other() {
        let opts = InspectOptions {
            top_labels: 1,
            ..Default::default()
        };
        let report = inspect_dataset("sample", &sample(), &opts);
        assert_eq!(report.labels.entries.len(), 1);
        assert_eq!(report.labels.other_count, 2);
        assert_eq!(report.labels.total_distinct, 3);
    }
}
