use anyhow::{Context, Result};
use csv::StringRecord;
use std::path::{Path, PathBuf};

use crate::error::LogError;
use crate::model::{ConfigHeader, NodeEntry, RunConfig};

pub const CSV_SUBDIR: &str = "csv";
pub const CONFIG_FILE: &str = "config.csv";
pub const RESULT_FILE: &str = "result.csv";
pub const DETAIL_FILE: &str = "latency.csv";
pub const DETAIL_HEADER: [&str; 5] = [
    "Hash",
    "Sent_By",
    "Sent_Timestamp",
    "Average_Duration",
    "Recv_By",
];
pub const MISSING_MARKER: &str = "MISSING";

pub const PROFILE_ENV: &str = "DELIVERY_LATENCY_PROFILE";
pub const WORKERS_ENV: &str = "DELIVERY_LATENCY_WORKERS";
pub const MAX_DEFAULT_WORKERS: usize = 8;

pub fn profile_enabled() -> bool {
    std::env::var(PROFILE_ENV)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn node_log_path(csv_dir: &Path, node_id: &str) -> PathBuf {
    csv_dir.join(format!("{}.csv", node_id))
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn expect_columns(path: &Path, record: &StringRecord, expected: usize) -> Result<(), LogError> {
    if record.len() != expected {
        return Err(LogError::MalformedRow {
            path: path.to_path_buf(),
            line: line_of(record),
            expected,
            actual: record.len(),
        });
    }
    Ok(())
}

/// Reads `config.csv`: `nodeCount,duration`, one ignored header row, then
/// `nodeName,nodeId` rows. A repeated node id keeps its last name.
pub fn read_config(csv_dir: &Path) -> Result<RunConfig> {
    let path = csv_dir.join(CONFIG_FILE);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut records = reader.records();

    let first = match records.next() {
        Some(r) => r.with_context(|| format!("read {}", path.display()))?,
        None => return Err(LogError::MissingConfigHeader { path }.into()),
    };
    expect_columns(&path, &first, 2)?;
    let header: ConfigHeader = first
        .deserialize(None)
        .map_err(|e| LogError::InvalidConfigValue {
            path: path.clone(),
            line: line_of(&first),
            reason: e.to_string(),
        })?;

    match records.next() {
        Some(r) => {
            r.with_context(|| format!("read {}", path.display()))?;
        }
        None => return Err(LogError::MissingConfigHeader { path }.into()),
    }

    let node_count = header.node_count.trim().parse::<usize>().ok();
    if node_count.is_none() {
        log::debug!(
            "{}: node count '{}' is not an integer",
            path.display(),
            header.node_count
        );
    }
    let mut config = RunConfig {
        node_count,
        duration: header.duration,
        ..Default::default()
    };
    for record in records {
        let record = record.with_context(|| format!("read {}", path.display()))?;
        expect_columns(&path, &record, 2)?;
        let entry: NodeEntry = record
            .deserialize(None)
            .map_err(|e| LogError::InvalidConfigValue {
                path: path.clone(),
                line: line_of(&record),
                reason: e.to_string(),
            })?;
        config.nodes.insert(entry.id, entry.name);
    }

    if let Some(declared) = config.node_count.filter(|n| *n != config.nodes.len()) {
        log::debug!(
            "{}: header declares {} nodes, {} listed",
            path.display(),
            declared,
            config.nodes.len()
        );
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(body: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), body).unwrap();
        dir
    }

    #[test]
    fn reads_nodes_keyed_by_id() {
        let dir = write_config("2,60\nworkers\nalpha,A\nbeta,B\n");
        let config = read_config(dir.path()).unwrap();
        assert_eq!(config.node_count, Some(2));
        assert_eq!(config.duration, "60");
        assert_eq!(config.nodes.get("A").map(String::as_str), Some("alpha"));
        assert_eq!(config.nodes.get("B").map(String::as_str), Some("beta"));
    }

    #[test]
    fn repeated_node_id_keeps_last_name() {
        let dir = write_config("1,10\nname,id\nfirst,A\nsecond,A\n");
        let config = read_config(dir.path()).unwrap();
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.nodes["A"], "second");
    }

    #[test]
    fn first_row_is_kept_as_text() {
        let dir = write_config("two,60s\nname,id\nalpha,A\nbeta,B\n");
        let config = read_config(dir.path()).unwrap();
        assert_eq!(config.node_count, None);
        assert_eq!(config.duration, "60s");
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.expected_receivers(), 1);
    }

    #[test]
    fn missing_header_row_is_an_error() {
        let dir = write_config("1,10\n");
        let err = read_config(dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LogError>(),
            Some(LogError::MissingConfigHeader { .. })
        ));
    }

    #[test]
    fn wrong_column_count_reports_line() {
        let dir = write_config("1,10\nname,id\nalpha,A,extra\n");
        let err = read_config(dir.path()).unwrap_err();
        match err.downcast_ref::<LogError>() {
            Some(LogError::MalformedRow {
                line,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(*line, 3);
                assert_eq!(*expected, 2);
                assert_eq!(*actual, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_config_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config(dir.path()).is_err());
    }
}
