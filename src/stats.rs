use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::category::Category;

/// The result of processing one (city, category) unit. `Empty` (no matching
/// table on the page) is not a failure - some cities legitimately lack a
/// category's data.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Success { tables: usize, rows: usize },
    Empty,
    InvalidInput { detail: String },
    NetworkError { detail: String },
    HttpStatus { code: u16 },
    Blocked,
    ParseError { detail: String },
    WriteError { detail: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Outcome::Success { .. } | Outcome::Empty)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Empty => "empty",
            Outcome::InvalidInput { .. } => "invalid_input",
            Outcome::NetworkError { .. } => "network_error",
            Outcome::HttpStatus { .. } => "http_status",
            Outcome::Blocked => "blocked",
            Outcome::ParseError { .. } => "parse_error",
            Outcome::WriteError { .. } => "write_error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitResult {
    pub city: String,
    pub country: String,
    pub category: Category,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryStats {
    pub processed: usize,
    pub successful: usize,
    pub empty: usize,
    pub failed: usize,
    pub tables: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub total_cities: usize,
    pub units_processed: usize,
    pub units_successful: usize,
    pub units_empty: usize,
    pub units_failed: usize,
    pub tables_extracted: usize,
    pub rows_written: usize,
}

/// Full session report: summary counters, per-category breakdown, and the
/// chronological outcome list including every failure.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub summary: SessionSummary,
    pub categories: BTreeMap<String, CategoryStats>,
    pub units: Vec<UnitResult>,
}

/// Accumulates one outcome per processed (city, category) unit. Can be
/// queried mid-run for a partial report and at end-of-run for the final one.
pub struct StatsTracker {
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    total_cities: usize,
    units: Vec<UnitResult>,
}

impl StatsTracker {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ended_at: None,
            total_cities: 0,
            units: Vec::new(),
        }
    }

    pub fn set_total_cities(&mut self, count: usize) {
        self.total_cities = count;
    }

    pub fn record(&mut self, city: &str, country: &str, category: Category, outcome: Outcome) {
        self.units.push(UnitResult {
            city: city.to_string(),
            country: country.to_string(),
            category,
            at: Utc::now(),
            outcome,
        });
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn units_processed(&self) -> usize {
        self.units.len()
    }

    pub fn report(&self) -> SessionReport {
        let mut categories: BTreeMap<String, CategoryStats> = BTreeMap::new();
        let mut successful = 0;
        let mut empty = 0;
        let mut failed = 0;
        let mut tables_total = 0;
        let mut rows_total = 0;

        for unit in &self.units {
            let entry = categories.entry(unit.category.as_str().to_string()).or_default();
            entry.processed += 1;
            match &unit.outcome {
                Outcome::Success { tables, rows } => {
                    successful += 1;
                    entry.successful += 1;
                    entry.tables += tables;
                    entry.rows += rows;
                    tables_total += tables;
                    rows_total += rows;
                }
                Outcome::Empty => {
                    empty += 1;
                    entry.empty += 1;
                }
                _ => {
                    failed += 1;
                    entry.failed += 1;
                }
            }
        }

        let end = self.ended_at.unwrap_or_else(Utc::now);
        let duration_secs = (end - self.started_at).num_milliseconds() as f64 / 1000.0;

        SessionReport {
            summary: SessionSummary {
                started_at: self.started_at,
                ended_at: self.ended_at,
                duration_secs,
                total_cities: self.total_cities,
                units_processed: self.units.len(),
                units_successful: successful,
                units_empty: empty,
                units_failed: failed,
                tables_extracted: tables_total,
                rows_written: rows_total,
            },
            categories,
            units: self.units.clone(),
        }
    }

    /// Write the report as `scraping_report.json` plus a human-readable
    /// `scraping_report.txt` into the session directory.
    pub fn write_report(&self, session_dir: &Path) -> Result<()> {
        let report = self.report();

        let json_path = session_dir.join("scraping_report.json");
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize session report")?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;

        let text_path = session_dir.join("scraping_report.txt");
        std::fs::write(&text_path, render_text_report(&report))
            .with_context(|| format!("Failed to write {}", text_path.display()))?;

        Ok(())
    }
}

fn render_text_report(report: &SessionReport) -> String {
    let mut out = String::new();
    let s = &report.summary;

    let _ = writeln!(out, "SCRAPING SESSION REPORT");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out);
    let _ = writeln!(out, "Start Time: {}", s.started_at.to_rfc3339());
    if let Some(end) = s.ended_at {
        let _ = writeln!(out, "End Time: {}", end.to_rfc3339());
    }
    let _ = writeln!(out, "Duration: {}", format_duration(s.duration_secs));
    let _ = writeln!(out);
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{}", "-".repeat(20));
    let _ = writeln!(out, "Cities: {}", s.total_cities);
    let _ = writeln!(out, "Units Processed: {}", s.units_processed);
    let _ = writeln!(out, "Units Successful: {}", s.units_successful);
    let _ = writeln!(out, "Units Empty: {}", s.units_empty);
    let _ = writeln!(out, "Units Failed: {}", s.units_failed);
    let _ = writeln!(out, "Tables Extracted: {}", s.tables_extracted);
    let _ = writeln!(out, "Rows Written: {}", s.rows_written);
    let _ = writeln!(out);

    let _ = writeln!(out, "PER CATEGORY");
    let _ = writeln!(out, "{}", "-".repeat(20));
    for (name, stats) in &report.categories {
        let _ = writeln!(
            out,
            "{}: {} processed, {} successful, {} empty, {} failed, {} rows",
            name, stats.processed, stats.successful, stats.empty, stats.failed, stats.rows
        );
    }

    let failures: Vec<&UnitResult> = report.units.iter().filter(|u| u.outcome.is_failure()).collect();
    if !failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "FAILURES");
        let _ = writeln!(out, "{}", "-".repeat(20));
        for unit in failures {
            let detail = match &unit.outcome {
                Outcome::InvalidInput { detail } => detail.clone(),
                Outcome::NetworkError { detail } => detail.clone(),
                Outcome::HttpStatus { code } => format!("HTTP {}", code),
                Outcome::ParseError { detail } => detail.clone(),
                Outcome::WriteError { detail } => detail.clone(),
                Outcome::Blocked => "blocked page".to_string(),
                _ => String::new(),
            };
            let _ = writeln!(
                out,
                "[{}] {}, {} / {}: {} {}",
                unit.at.to_rfc3339(),
                unit.city,
                unit.country,
                unit.category,
                unit.outcome.label(),
                detail
            );
        }
    }

    out
}

fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1} seconds", seconds)
    } else if seconds < 3600.0 {
        format!("{:.1} minutes", seconds / 60.0)
    } else {
        format!("{:.1} hours", seconds / 3600.0)
    }
}
