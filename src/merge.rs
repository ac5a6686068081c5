use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the combined dataset written into the session directory.
pub const MERGED_FILENAME: &str = "ALL_DATA_CONCATENATED.csv";

/// Extra column recording which per-city file each merged row came from.
const SOURCE_FILE_COLUMN: &str = "source_file";

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no CSV files found under {0}")]
    NoFilesFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone)]
pub struct MergeSummary {
    pub files_merged: usize,
    pub rows_written: usize,
    pub columns: Vec<String>,
    pub output_path: PathBuf,
}

/// Concatenate every per-city CSV under the session directory into one
/// combined file. The combined column set is the union of all input
/// headers (sorted for reproducibility); rows from files missing a column
/// get that column empty. Row count equals the sum of input row counts.
pub fn merge_session(session_dir: &Path) -> Result<MergeSummary, MergeError> {
    let mut files = Vec::new();
    collect_csv_files(session_dir, &mut files)?;
    files.sort();

    if files.is_empty() {
        return Err(MergeError::NoFilesFound(session_dir.to_path_buf()));
    }

    info!("Found {} CSV files under {}", files.len(), session_dir.display());

    // First pass: union of all headers.
    let mut columns: BTreeSet<String> = BTreeSet::new();
    let mut readable = Vec::new();
    for path in &files {
        match csv::Reader::from_path(path) {
            Ok(mut reader) => match reader.headers() {
                Ok(headers) => {
                    columns.extend(headers.iter().map(str::to_string));
                    readable.push(path.clone());
                }
                Err(e) => warn!("Skipping {}: unreadable header ({})", path.display(), e),
            },
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    if readable.is_empty() {
        return Err(MergeError::NoFilesFound(session_dir.to_path_buf()));
    }

    let mut columns: Vec<String> = columns.into_iter().collect();
    columns.push(SOURCE_FILE_COLUMN.to_string());

    let output_path = session_dir.join(MERGED_FILENAME);
    let mut wtr = csv::Writer::from_path(&output_path)?;
    wtr.write_record(&columns)?;

    // Second pass: project every row onto the unified schema.
    let mut rows_written = 0;
    for path in &readable {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let index_of: Vec<Option<usize>> = columns
            .iter()
            .map(|col| headers.iter().position(|h| h == col))
            .collect();
        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        for result in reader.records() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping malformed row in {}: {}", path.display(), e);
                    continue;
                }
            };

            let projected: Vec<&str> = columns
                .iter()
                .zip(&index_of)
                .map(|(col, idx)| {
                    if col == SOURCE_FILE_COLUMN {
                        source_name.as_str()
                    } else {
                        idx.and_then(|i| row.get(i)).unwrap_or("")
                    }
                })
                .collect();
            wtr.write_record(&projected)?;
            rows_written += 1;
        }
        debug!("Merged {}", path.display());
    }

    wtr.flush()?;
    info!("Merged {} rows into {}", rows_written, output_path.display());

    Ok(MergeSummary {
        files_merged: readable.len(),
        rows_written,
        columns,
        output_path,
    })
}

/// Recursively collect `*.csv` paths, skipping a pre-existing combined file.
fn collect_csv_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), std::io::Error> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_csv_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            && path.file_name().is_some_and(|name| name != MERGED_FILENAME)
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_unions_columns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), "city,item,value\nParis,Meal,15.00\n").unwrap();
        std::fs::write(dir.path().join("b.csv"), "city,item,note\nLyon,Crime,Low\nLyon,Safety,High\n").unwrap();

        let summary = merge_session(dir.path()).unwrap();
        assert_eq!(summary.files_merged, 2);
        assert_eq!(summary.rows_written, 3);
        assert_eq!(
            summary.columns,
            vec!["city", "item", "note", "value", "source_file"]
        );

        let content = std::fs::read_to_string(summary.output_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "city,item,note,value,source_file");
        // Missing columns filled empty, source file appended
        assert_eq!(lines[1], "Paris,Meal,,15.00,a.csv");
        assert_eq!(lines[2], "Lyon,Crime,Low,,b.csv");
    }

    #[test]
    fn test_merge_recurses_and_skips_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.csv"), "item\nMeal\n").unwrap();
        std::fs::write(dir.path().join(MERGED_FILENAME), "item\nStale\n").unwrap();

        let summary = merge_session(dir.path()).unwrap();
        assert_eq!(summary.files_merged, 1);
        assert_eq!(summary.rows_written, 1);
    }

    #[test]
    fn test_merge_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(merge_session(dir.path()), Err(MergeError::NoFilesFound(_))));
    }
}
