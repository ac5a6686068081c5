use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::catalog::CityRecord;
use crate::category::Category;
use crate::record::StandardRecord;

/// Output formats for session files. JSON output is JSON Lines so that
/// repeated writes for the same city/category are plain appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Both,
}

impl Format {
    fn wants_csv(&self) -> bool {
        matches!(self, Format::Csv | Format::Both)
    }

    fn wants_json(&self) -> bool {
        matches!(self, Format::Json | Format::Both)
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "json" | "jsonl" => Ok(Format::Json),
            "both" => Ok(Format::Both),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Owns a scraping session's output directory and writes per-(city,
/// category) record files into it. Repeat writes for the same city and
/// category append, so partial failures never lose earlier progress and
/// re-running a session is safe.
pub struct SessionWriter {
    session_dir: PathBuf,
    format: Format,
}

impl SessionWriter {
    /// Create a timestamped session directory under `output_dir` and drop a
    /// `meta.json` describing the session into it.
    pub fn create(output_dir: &Path, format: Format, started_at: DateTime<Utc>) -> Result<Self> {
        let session_name = started_at.format("%Y%m%d_%H%M%S").to_string();
        let session_dir = output_dir.join(session_name);
        fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create session directory: {}", session_dir.display()))?;

        let meta = serde_json::json!({
            "started_at": started_at.to_rfc3339(),
            "format": match format {
                Format::Csv => "csv",
                Format::Json => "json",
                Format::Both => "both",
            },
        });
        fs::write(session_dir.join("meta.json"), serde_json::to_string_pretty(&meta)?)
            .with_context(|| format!("Failed to write meta.json in {}", session_dir.display()))?;

        Ok(Self { session_dir, format })
    }

    /// Open an existing session directory without touching its metadata.
    pub fn open(session_dir: &Path, format: Format) -> Result<Self> {
        fs::create_dir_all(session_dir)
            .with_context(|| format!("Failed to create session directory: {}", session_dir.display()))?;
        Ok(Self {
            session_dir: session_dir.to_path_buf(),
            format,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Append records to the city/category file(s), creating them on first
    /// use. Returns the number of records written.
    pub fn write(&self, city: &CityRecord, category: Category, records: &[StandardRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let stem = file_stem(city, category);

        if self.format.wants_csv() {
            self.append_csv(&self.session_dir.join(format!("{}.csv", stem)), records)?;
        }
        if self.format.wants_json() {
            self.append_jsonl(&self.session_dir.join(format!("{}.jsonl", stem)), records)?;
        }

        debug!(
            "Wrote {} records for {} / {}",
            records.len(),
            city.city,
            category
        );
        Ok(records.len())
    }

    fn append_csv(&self, path: &Path, records: &[StandardRecord]) -> Result<()> {
        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            wtr.write_record(StandardRecord::COLUMNS)?;
        }

        for record in records {
            let imported_at = record.imported_at.to_rfc3339();
            wtr.write_record([
                record.city.as_str(),
                record.country.as_str(),
                record.region.as_str(),
                record.category.as_str(),
                record.table_caption.as_str(),
                imported_at.as_str(),
                record.item.as_str(),
                record.value.as_deref().unwrap_or(""),
                record.value2.as_deref().unwrap_or(""),
                record.value3.as_deref().unwrap_or(""),
                record.note.as_deref().unwrap_or(""),
                record.data_type.as_str(),
            ])?;
        }

        wtr.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
        Ok(())
    }

    fn append_jsonl(&self, path: &Path, records: &[StandardRecord]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        for record in records {
            let json = serde_json::to_string(record).context("Failed to serialize record")?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
        }

        file.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
        Ok(())
    }
}

fn file_stem(city: &CityRecord, category: Category) -> String {
    let raw = format!("{}_{}_{}", city.country, city.city, category.as_str());
    sanitize_filename(&raw.replace(' ', "_"))
}

/// Sanitize a string for safe use as a file name segment.
pub fn sanitize_filename(name: &str) -> String {
    const INVALID: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let mut cleaned: String = name
        .chars()
        .map(|c| if INVALID.contains(&c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(|c| c == ' ' || c == '.').to_string();

    if cleaned.chars().count() > 200 {
        cleaned = cleaned.chars().take(200).collect();
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, PartialRecord};

    fn paris() -> CityRecord {
        CityRecord {
            city: "Paris".to_string(),
            country: "France".to_string(),
            region: String::new(),
            slug_or_url: "paris".to_string(),
        }
    }

    fn record(item: &str) -> StandardRecord {
        crate::record::assemble(
            PartialRecord {
                item: item.to_string(),
                value: Some("1.0".to_string()),
                value2: None,
                value3: None,
                note: None,
                data_type: DataType::Numeric,
            },
            &paris(),
            Category::Climate,
            "Temperature",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("France_Paris_climate"), "France_Paris_climate");
        assert_eq!(sanitize_filename("a/b:c*d"), "a_b_c_d");
        assert_eq!(sanitize_filename("  spaced.  "), "spaced");
    }

    #[test]
    fn test_write_appends_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionWriter::open(dir.path(), Format::Csv).unwrap();

        writer.write(&paris(), Category::Climate, &[record("January"), record("February")]).unwrap();
        writer.write(&paris(), Category::Climate, &[record("March")]).unwrap();

        let path = dir.path().join("France_Paris_climate.csv");
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        // Header once, then the union of both calls' records
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("city,country,region,category"));
        assert!(lines[1].contains("January"));
        assert!(lines[3].contains("March"));
    }

    #[test]
    fn test_write_jsonl_appends() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionWriter::open(dir.path(), Format::Json).unwrap();

        writer.write(&paris(), Category::Climate, &[record("January")]).unwrap();
        writer.write(&paris(), Category::Climate, &[record("February")]).unwrap();

        let content = std::fs::read_to_string(dir.path().join("France_Paris_climate.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
        let first: StandardRecord = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first.item, "January");
    }

    #[test]
    fn test_create_writes_meta() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionWriter::create(dir.path(), Format::Csv, Utc::now()).unwrap();
        assert!(writer.session_dir().join("meta.json").exists());
    }

    #[test]
    fn test_empty_write_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionWriter::open(dir.path(), Format::Both).unwrap();
        writer.write(&paris(), Category::Crime, &[]).unwrap();
        assert!(!dir.path().join("France_Paris_crime.csv").exists());
    }
}
