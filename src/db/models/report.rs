//! Hazard report data models.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ReportError;

pub type ReportId = i64;

/// Category recorded when a submission does not name one.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// The hazard labels the assistant knows how to count.
///
/// Reports keep their category as free text; this enum only exists for the
/// labels that carry meaning downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HazardCategory {
    Slippery = 0,
    LowLighting = 1,
    Isolated = 2,
}

impl HazardCategory {
    pub const COUNT: usize = 3;

    pub const ALL: [HazardCategory; Self::COUNT] = [
        HazardCategory::Slippery,
        HazardCategory::LowLighting,
        HazardCategory::Isolated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HazardCategory::Slippery => "Slippery",
            HazardCategory::LowLighting => "Low Lighting",
            HazardCategory::Isolated => "Isolated",
        }
    }

    /// Exact, case-sensitive match against the known labels.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == label)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// A stored hazard report. Callers always receive owned copies.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardReport {
    pub id: ReportId,
    pub lat: f64,
    pub lng: f64,
    pub category: String,
    pub description: String,
    /// `None` for older rows whose timestamp is missing or unreadable.
    pub reported_at: Option<DateTime<Utc>>,
}

impl HazardReport {
    pub fn known_category(&self) -> Option<HazardCategory> {
        HazardCategory::from_label(&self.category)
    }
}

/// Input for submitting a report. The timestamp is never client supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReport {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default, alias = "type")]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewReport {
    pub fn new(lat: f64, lng: f64, category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            lat: Some(lat),
            lng: Some(lng),
            category: Some(category.into()),
            description: Some(description.into()),
        }
    }

    /// Both coordinates, or a validation error naming what is missing.
    pub fn coordinates(&self) -> Result<(f64, f64), ReportError> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Ok((lat, lng)),
            _ => Err(ReportError::validation("lat and lng are required")),
        }
    }

    pub fn category_or_default(&self) -> String {
        self.category
            .clone()
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string())
    }
}
