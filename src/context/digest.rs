//! Turns recent hazard reports into the bounded context block the assistant
//! is grounded on.

use std::fmt::Write as _;

use chrono::SecondsFormat;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::ContextConfig;
use crate::db::{HazardCategory, HazardReport};

/// Occurrences of each known category. Always carries every known label,
/// zero when unused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    counts: [u64; HazardCategory::COUNT],
}

impl CategoryCounts {
    pub fn record(&mut self, category: HazardCategory) {
        self.counts[category.index()] += 1;
    }

    pub fn get(&self, category: HazardCategory) -> u64 {
        self.counts[category.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (HazardCategory, u64)> + '_ {
        HazardCategory::ALL
            .into_iter()
            .map(|category| (category, self.get(category)))
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

impl Serialize for CategoryCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (category, count) in self.iter() {
            map.serialize_entry(category.as_str(), &count)?;
        }
        map.end()
    }
}

/// Derived per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDigest {
    /// One line per report, most recent first, at most `max_highlights` lines.
    pub summary_text: String,
    /// Counts over every input report, not just the highlighted ones.
    pub category_counts: CategoryCounts,
}

impl ContextDigest {
    pub fn highlight_lines(&self) -> impl Iterator<Item = &str> {
        self.summary_text.lines()
    }

    /// The block embedded in the assistant prompt: highlights, then counts.
    pub fn render_context_block(&self) -> String {
        let mut block = String::from("Recent safety reports (most recent first):\n");
        for line in self.highlight_lines() {
            block.push_str(line);
            block.push('\n');
        }
        block.push_str("\nAggregate counts in last batch:");
        for (category, count) in self.category_counts.iter() {
            let _ = write!(block, "\n- {}: {}", category.as_str(), count);
        }
        block
    }
}

/// Builds the digest for `reports`, which are expected newest first.
///
/// Pure: the same input always yields the same digest.
pub fn summarize(reports: &[HazardReport], config: &ContextConfig) -> ContextDigest {
    let mut category_counts = CategoryCounts::default();
    for report in reports {
        if let Some(category) = report.known_category() {
            category_counts.record(category);
        }
    }

    let summary_text = reports
        .iter()
        .take(config.max_highlights)
        .map(format_highlight)
        .collect::<Vec<_>>()
        .join("\n");

    ContextDigest {
        summary_text,
        category_counts,
    }
}

fn format_highlight(report: &HazardReport) -> String {
    format!(
        "- {}: {} near ({}, {}) :: {}",
        report
            .reported_at
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default(),
        single_line(&report.category),
        format_coordinate(report.lat),
        format_coordinate(report.lng),
        single_line(&report.description)
    )
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Five decimals for real coordinates; anything else is shown as-is.
fn format_coordinate(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.5}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn report(id: i64, category: &str, description: &str) -> HazardReport {
        let base = Utc.with_ymd_and_hms(2024, 11, 20, 21, 0, 0).unwrap();
        HazardReport {
            id,
            lat: 35.0 + id as f64 * 0.001,
            lng: -97.0,
            category: category.to_string(),
            description: description.to_string(),
            reported_at: Some(base - Duration::minutes(id)),
        }
    }

    #[test]
    fn empty_input_yields_zeroed_counts() {
        let digest = summarize(&[], &ContextConfig::default());
        assert_eq!(digest.summary_text, "");
        for category in HazardCategory::ALL {
            assert_eq!(digest.category_counts.get(category), 0);
        }
        assert_eq!(digest.category_counts.iter().count(), 3);
    }

    #[test]
    fn unrecognized_categories_are_listed_but_not_counted() {
        let reports = vec![report(1, "Pothole", "deep"), report(2, "slippery", "case differs")];
        let digest = summarize(&reports, &ContextConfig::default());
        assert_eq!(digest.category_counts.total(), 0);
        assert_eq!(digest.highlight_lines().count(), 2);
        assert!(digest.summary_text.contains("Pothole near"));
    }

    #[test]
    fn highlights_are_capped_but_counts_cover_everything() {
        let reports: Vec<HazardReport> = (0..12)
            .map(|i| report(i, if i % 2 == 0 { "Slippery" } else { "Isolated" }, "x"))
            .collect();
        let digest = summarize(&reports, &ContextConfig::default());

        assert_eq!(digest.highlight_lines().count(), 8);
        assert_eq!(digest.category_counts.get(HazardCategory::Slippery), 6);
        assert_eq!(digest.category_counts.get(HazardCategory::Isolated), 6);
        assert_eq!(digest.category_counts.get(HazardCategory::LowLighting), 0);

        // The newest eight survive, in input order.
        let first = digest.highlight_lines().next().unwrap();
        assert!(first.starts_with("- 2024-11-20T21:00:00Z: Slippery"));
    }

    #[test]
    fn highlight_line_format() {
        let line = format_highlight(&HazardReport {
            id: 7,
            lat: 35.123456789,
            lng: -97.1,
            category: "Low Lighting".into(),
            description: "lamp out by the library".into(),
            reported_at: Some(Utc.with_ymd_and_hms(2024, 1, 5, 23, 15, 9).unwrap()),
        });
        assert_eq!(
            line,
            "- 2024-01-05T23:15:09Z: Low Lighting near (35.12346, -97.10000) :: lamp out by the library"
        );
    }

    #[test]
    fn missing_timestamp_renders_empty() {
        let mut undated = report(3, "Isolated", "back lot");
        undated.reported_at = None;
        let digest = summarize(&[report(0, "Slippery", "icy ramp"), undated], &ContextConfig::default());

        assert_eq!(digest.highlight_lines().count(), 2);
        assert_eq!(
            digest.highlight_lines().nth(1).unwrap(),
            "- : Isolated near (35.00300, -97.00000) :: back lot"
        );
        assert_eq!(digest.category_counts.get(HazardCategory::Isolated), 1);
    }

    #[test]
    fn multiline_descriptions_stay_on_one_line() {
        let reports = vec![report(0, "Slippery", "wet tiles\nnear the\r\nentrance")];
        let digest = summarize(&reports, &ContextConfig::default());
        assert_eq!(digest.highlight_lines().count(), 1);
        assert!(digest.summary_text.ends_with(":: wet tiles near the  entrance"));
    }

    #[test]
    fn non_finite_coordinates_fall_back_to_display() {
        assert_eq!(format_coordinate(f64::NAN), "NaN");
        assert_eq!(format_coordinate(f64::INFINITY), "inf");
        assert_eq!(format_coordinate(-0.5), "-0.50000");
    }

    #[test]
    fn repeated_runs_are_identical() {
        let reports: Vec<HazardReport> =
            (0..10).map(|i| report(i, "Low Lighting", "dim")).collect();
        let config = ContextConfig::default();
        assert_eq!(summarize(&reports, &config), summarize(&reports, &config));
    }

    #[test]
    fn context_block_lists_highlights_then_counts() {
        let reports = vec![report(0, "Slippery", "icy ramp"), report(1, "Isolated", "no lights")];
        let block = summarize(&reports, &ContextConfig::default()).render_context_block();
        let expected = "Recent safety reports (most recent first):\n\
             - 2024-11-20T21:00:00Z: Slippery near (35.00000, -97.00000) :: icy ramp\n\
             - 2024-11-20T20:59:00Z: Isolated near (35.00100, -97.00000) :: no lights\n\
             \n\
             Aggregate counts in last batch:\n\
             - Slippery: 1\n\
             - Low Lighting: 0\n\
             - Isolated: 1";
        assert_eq!(block, expected);
    }

    #[test]
    fn counts_serialize_with_display_labels() {
        let mut counts = CategoryCounts::default();
        counts.record(HazardCategory::LowLighting);
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Slippery": 0, "Low Lighting": 1, "Isolated": 0})
        );
    }
}
