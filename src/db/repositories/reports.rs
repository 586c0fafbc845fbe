use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, types::ValueRef, Row};

use crate::db::{
    helpers::{format_timestamp, parse_datetime, to_i64, to_u64},
    models::{HazardReport, NewReport, ReportId},
    Database,
};
use crate::error::ReportError;
use crate::{log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// A NULL, non-text or unparseable timestamp reads as missing rather than failing the query.
fn read_timestamp(row: &Row, id: ReportId) -> Result<Option<DateTime<Utc>>> {
    let raw = match row.get_ref("timestamp")? {
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Null => return Ok(None),
        other => {
            log_warn!("Report {id} has a non-text timestamp ({:?})", other.data_type());
            return Ok(None);
        }
    };

    match parse_datetime(&raw, "timestamp") {
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) => {
            log_warn!("Report {id}: {err:#}");
            Ok(None)
        }
    }
}

fn row_to_report(row: &Row) -> Result<HazardReport> {
    let id: ReportId = row.get("id")?;
    let reported_at = read_timestamp(row, id)?;

    Ok(HazardReport {
        id,
        lat: row.get("lat")?,
        lng: row.get("lng")?,
        category: row.get::<_, Option<String>>("type")?.unwrap_or_default(),
        description: row
            .get::<_, Option<String>>("description")?
            .unwrap_or_default(),
        reported_at,
    })
}

fn collect_reports(rows: &mut rusqlite::Rows<'_>) -> Result<Vec<HazardReport>> {
    let mut reports = Vec::new();
    while let Some(row) = rows.next()? {
        reports.push(row_to_report(row)?);
    }
    Ok(reports)
}

impl Database {
    /// Validates and stores a report, stamping it with the current time.
    pub async fn insert_report(&self, input: NewReport) -> Result<HazardReport, ReportError> {
        let (lat, lng) = input.coordinates()?;
        let category = input.category_or_default();
        let description = input.description.unwrap_or_default();

        self.execute(move |conn| {
            let reported_at = Utc::now();
            conn.execute(
                "INSERT INTO reports (lat, lng, type, description, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![lat, lng, category, description, format_timestamp(&reported_at)],
            )
            .context("failed to insert report")?;

            Ok(HazardReport {
                id: conn.last_insert_rowid(),
                lat,
                lng,
                category,
                description,
                reported_at: Some(reported_at),
            })
        })
        .await
        .map(|report| {
            log_info!(
                "Stored report {} ({}) at ({}, {})",
                report.id,
                report.category,
                report.lat,
                report.lng
            );
            report
        })
        .map_err(|err| {
            log_error!("Report insert failed: {err:#}");
            ReportError::Storage(err)
        })
    }

    /// Up to `limit` reports, newest first; ties go to the later insert.
    pub async fn fetch_recent_reports(&self, limit: usize) -> Result<Vec<HazardReport>, ReportError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, lat, lng, type, description, timestamp
                 FROM reports
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?1",
            )?;
            let mut rows = stmt.query(params![to_i64(limit)?])?;
            collect_reports(&mut rows)
        })
        .await
        .map_err(|err| {
            log_error!("Recent report read failed: {err:#}");
            ReportError::Storage(err)
        })
    }

    /// Every stored report in insertion order.
    pub async fn fetch_all_reports(&self) -> Result<Vec<HazardReport>, ReportError> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, lat, lng, type, description, timestamp
                 FROM reports
                 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([])?;
            collect_reports(&mut rows)
        })
        .await
        .map_err(|err| {
            log_error!("Report listing failed: {err:#}");
            ReportError::Storage(err)
        })
    }

    pub async fn count_reports(&self) -> Result<u64, ReportError> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
            to_u64(count, "report count")
        })
        .await
        .map_err(|err| {
            log_error!("Report count failed: {err:#}");
            ReportError::Storage(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, TimeZone};
    use tempfile::{tempdir, TempDir};

    use super::*;

    fn open_temp_db() -> (TempDir, Database) {
        let dir = tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("reports.db")).expect("open database");
        (dir, db)
    }

    async fn seed_raw(db: &Database, category: &'static str, timestamp: String) {
        db.execute(move |conn| {
            conn.execute(
                "INSERT INTO reports (lat, lng, type, description, timestamp)
                 VALUES (35.0, -97.0, ?1, '', ?2)",
                params![category, timestamp],
            )?;
            Ok(())
        })
        .await
        .expect("seed row");
    }

    #[tokio::test]
    async fn insert_then_fetch_latest_round_trips_fields() {
        let (_dir, db) = open_temp_db();
        let before = Utc::now();

        let stored = db
            .insert_report(NewReport::new(35.0, -97.0, "Slippery", "icy ramp"))
            .await
            .expect("insert");

        let latest = db.fetch_recent_reports(1).await.expect("fetch");
        assert_eq!(latest.len(), 1);
        let report = &latest[0];
        assert_eq!(report, &stored);
        assert_eq!(report.lat, 35.0);
        assert_eq!(report.lng, -97.0);
        assert_eq!(report.category, "Slippery");
        assert_eq!(report.description, "icy ramp");
        assert!(report.reported_at.expect("stamped") >= before);
    }

    #[tokio::test]
    async fn missing_coordinates_store_nothing() {
        let (_dir, db) = open_temp_db();

        let missing_lng = NewReport {
            lat: Some(35.0),
            ..NewReport::default()
        };
        let err = db.insert_report(missing_lng).await.expect_err("lng missing");
        assert!(err.is_validation());

        let missing_lat = NewReport {
            lng: Some(-97.0),
            ..NewReport::default()
        };
        assert!(db.insert_report(missing_lat).await.is_err());

        assert_eq!(db.count_reports().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn omitted_category_and_description_get_defaults() {
        let (_dir, db) = open_temp_db();
        let stored = db
            .insert_report(NewReport {
                lat: Some(1.0),
                lng: Some(2.0),
                ..NewReport::default()
            })
            .await
            .expect("insert");
        assert_eq!(stored.category, "Unknown");
        assert_eq!(stored.description, "");
    }

    #[tokio::test]
    async fn recent_reports_are_capped_and_newest_first() {
        let (_dir, db) = open_temp_db();
        for i in 0..5 {
            db.insert_report(NewReport::new(35.0, -97.0 + f64::from(i), "Isolated", format!("r{i}")))
                .await
                .expect("insert");
        }

        let recent = db.fetch_recent_reports(3).await.expect("fetch");
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].description, "r4");
        assert!(recent
            .windows(2)
            .all(|pair| pair[0].reported_at >= pair[1].reported_at));

        assert!(db.fetch_recent_reports(0).await.expect("fetch none").is_empty());
        assert_eq!(db.fetch_recent_reports(50).await.expect("fetch all").len(), 5);
    }

    #[tokio::test]
    async fn equal_timestamps_fall_back_to_insert_order() {
        let (_dir, db) = open_temp_db();
        let instant = Utc.with_ymd_and_hms(2024, 2, 1, 20, 0, 0).unwrap();
        seed_raw(&db, "Slippery", format_timestamp(&instant)).await;
        seed_raw(&db, "Isolated", format_timestamp(&instant)).await;
        seed_raw(&db, "Low Lighting", format_timestamp(&(instant - Duration::hours(1)))).await;

        let recent = db.fetch_recent_reports(10).await.expect("fetch");
        let order: Vec<&str> = recent.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(order, vec!["Isolated", "Slippery", "Low Lighting"]);
    }

    #[tokio::test]
    async fn empty_store_reads_cleanly() {
        let (_dir, db) = open_temp_db();
        assert!(db.fetch_recent_reports(20).await.expect("recent").is_empty());
        assert!(db.fetch_all_reports().await.expect("all").is_empty());
    }

    #[tokio::test]
    async fn legacy_rows_with_nulls_read_as_empty_strings() {
        let (_dir, db) = open_temp_db();
        db.execute(|conn| {
            conn.execute(
                "INSERT INTO reports (lat, lng, type, description, timestamp)
                 VALUES (35.5, -97.5, NULL, NULL, '2023-11-05T22:10:00.000001')",
                [],
            )?;
            Ok(())
        })
        .await
        .expect("seed legacy row");

        let all = db.fetch_all_reports().await.expect("all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].category, "");
        assert_eq!(all[0].description, "");
        assert!(all[0].reported_at.is_some());
    }

    #[tokio::test]
    async fn rows_without_a_usable_timestamp_still_read() {
        let (_dir, db) = open_temp_db();
        db.insert_report(NewReport::new(35.0, -97.0, "Slippery", "icy ramp"))
            .await
            .expect("insert");
        db.execute(|conn| {
            conn.execute_batch(
                "INSERT INTO reports (lat, lng, type, description, timestamp)
                 VALUES (35.1, -97.1, 'Isolated', 'no stamp', NULL);
                 INSERT INTO reports (lat, lng, type, description, timestamp)
                 VALUES (35.2, -97.2, 'Low Lighting', 'garbled', 'last tuesday');
                 INSERT INTO reports (lat, lng, type, description, timestamp)
                 VALUES (35.3, -97.3, 'Isolated', 'numeric', 1700000000);",
            )?;
            Ok(())
        })
        .await
        .expect("seed undated rows");

        let all = db.fetch_all_reports().await.expect("all");
        assert_eq!(all.len(), 4);
        assert!(all[0].reported_at.is_some());
        assert!(all[1..].iter().all(|report| report.reported_at.is_none()));

        let recent = db.fetch_recent_reports(20).await.expect("recent");
        assert_eq!(recent.len(), 4);
        assert_eq!(recent.last().map(|r| r.description.as_str()), Some("no stamp"));

        let digest = crate::context::summarize(&recent, &crate::context::ContextConfig::default());
        assert_eq!(digest.highlight_lines().count(), 4);
        assert!(digest.summary_text.contains("- : Isolated near (35.10000, -97.10000) :: no stamp"));
        assert_eq!(digest.category_counts.total(), 4);
    }

    #[tokio::test]
    async fn concurrent_inserts_are_all_durable() {
        let (_dir, db) = open_temp_db();

        let mut handles = Vec::new();
        for i in 0..16 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.insert_report(NewReport::new(
                    35.0 + f64::from(i) / 1000.0,
                    -97.0,
                    "Slippery",
                    format!("concurrent {i}"),
                ))
                .await
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            let report = handle.await.expect("join").expect("insert");
            ids.insert(report.id);
        }

        assert_eq!(ids.len(), 16);
        assert_eq!(db.count_reports().await.expect("count"), 16);
        assert_eq!(db.fetch_all_reports().await.expect("all").len(), 16);
    }

    #[tokio::test]
    async fn storage_faults_surface_as_storage_errors() {
        let (_dir, db) = open_temp_db();
        db.execute(|conn| {
            conn.execute_batch("DROP TABLE reports")?;
            Ok(())
        })
        .await
        .expect("drop table");

        let err = db
            .insert_report(NewReport::new(1.0, 2.0, "Isolated", ""))
            .await
            .expect_err("table is gone");
        assert!(matches!(err, ReportError::Storage(_)));
        assert!(db.fetch_recent_reports(5).await.is_err());
    }
}
