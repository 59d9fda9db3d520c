//! Inspect report types and terminal formatting.

use std::fmt;

use serde::Serialize;

/// The result of inspecting a dataset.
#[derive(Clone, Debug, Serialize)]
pub struct InspectReport {
    /// Name of the dataset source.
    pub name: String,
    pub summary: SummarySection,
    pub labels: LabelsSection,
    #[serde(skip)]
    pub(crate) bar_width: usize,
}

/// Summary counts for the dataset.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SummarySection {
    pub images: usize,
    pub categories: usize,
    pub annotations: usize,
    /// Images referenced by at least one annotation.
    pub annotated_images: usize,
    /// Images whose width and height are known without decoding.
    pub sized_images: usize,
}

/// Label distribution section.
#[derive(Clone, Debug, Serialize)]
pub struct LabelsSection {
    pub top_n: usize,
    pub total_distinct: usize,
    pub total_annotations: usize,
    /// Most frequent labels, count descending.
    pub entries: Vec<LabelCount>,
    /// Annotations whose label is not among `entries`.
    pub other_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset: {}", self.name)?;
        writeln!(f)?;
        self.fmt_summary(f)?;
        writeln!(f)?;
        self.fmt_labels(f)
    }
}

impl InspectReport {
    fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f, "Summary")?;
        writeln!(f, "  Images:       {:>10}", format_number(s.images))?;
        writeln!(f, "  Categories:   {:>10}", format_number(s.categories))?;
        writeln!(f, "  Annotations:  {:>10}", format_number(s.annotations))?;
        writeln!(
            f,
            "  Annotated:    {:>10} ({})",
            format_number(s.annotated_images),
            fmt_percent(s.annotated_images, s.images)
        )?;
        writeln!(
            f,
            "  Known size:   {:>10} ({})",
            format_number(s.sized_images),
            fmt_percent(s.sized_images, s.images)
        )
    }

    fn fmt_labels(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = &self.labels;
        if l.total_distinct > l.top_n {
            writeln!(f, "Labels (top {} of {})", l.top_n, l.total_distinct)?;
        } else {
            writeln!(f, "Labels ({})", l.total_distinct)?;
        }

        if l.entries.is_empty() {
            return writeln!(f, "  No annotations found.");
        }

        let max_count = l.entries.iter().map(|e| e.count).max().unwrap_or(1);
        for entry in &l.entries {
            self.fmt_label_row(f, &truncate_label(&entry.label, 20), entry.count, max_count)?;
        }
        if l.other_count > 0 {
            self.fmt_label_row(f, "(other)", l.other_count, max_count)?;
        }
        Ok(())
    }

    fn fmt_label_row(
        &self,
        f: &mut fmt::Formatter<'_>,
        label: &str,
        count: usize,
        max_count: usize,
    ) -> fmt::Result {
        writeln!(
            f,
            "  {:<20} {:>8} {:>6}  {}",
            label,
            format_number(count),
            fmt_percent(count, self.labels.total_annotations),
            render_bar(count, max_count, self.bar_width)
        )
    }
}

fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn fmt_percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", numerator as f64 * 100.0 / denominator as f64)
    }
}

fn render_bar(count: usize, max_count: usize, width: usize) -> String {
    if max_count == 0 || width == 0 {
        return String::new();
    }
    let filled = (count * width / max_count).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_string();
    }
    let kept: String = label.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}
