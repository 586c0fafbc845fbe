pub mod report;

pub use report::{HazardCategory, HazardReport, NewReport, ReportId, UNKNOWN_CATEGORY};
