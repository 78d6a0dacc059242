use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{node_log_path, DETAIL_HEADER, MISSING_MARKER};
use crate::error::LogError;
use crate::model::{Direction, EventRow, NodeEvents, Outcome, Receipt, ResultRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPolicy {
    Fail,
    Skip,
}

/// Immediate child directories of `root`, one per test run, sorted by name.
pub fn scan_runs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(anyhow!("log path not found: {}", root.display()));
    }

    let mut runs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("list {}", root.display()))?;
        if entry.file_type().is_dir() {
            runs.push(entry.into_path());
        }
    }
    Ok(runs)
}

/// Reads `{node_id}.csv`. A log that cannot be opened or read (missing,
/// permission denied, a directory) yields empty maps with `unreadable` set;
/// a malformed row is fatal under [`RowPolicy::Fail`].
pub fn read_node_log(csv_dir: &Path, node_id: &str, policy: RowPolicy) -> Result<NodeEvents> {
    let path = node_log_path(csv_dir, node_id);
    let file = match fs::File::open(&path) {
        Ok(f) => f,
        Err(e) => {
            log::warn!("missing: {} ({})", path.display(), e);
            return Ok(NodeEvents::unreadable(node_id));
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);
    let mut events = NodeEvents::new(node_id);

    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) if e.is_io_error() => {
                log::warn!("unreadable: {} ({})", path.display(), e);
                return Ok(NodeEvents::unreadable(node_id));
            }
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        if idx == 0 {
            continue;
        }
        match parse_event(&path, &record) {
            Ok(row) => {
                let id = row.message_id();
                match row.direction() {
                    Direction::In => events.record_inbound(id, row.timestamp),
                    Direction::Out => events.record_outbound(id, row.timestamp),
                }
            }
            Err(e) if policy == RowPolicy::Skip && e.is_row_fault() => {
                log::warn!("skipping row: {}", e);
                events.skipped_rows += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(events)
}

fn parse_event(path: &Path, record: &csv::StringRecord) -> Result<EventRow, LogError> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    if record.len() != EventRow::COLUMNS {
        return Err(LogError::MalformedRow {
            path: path.to_path_buf(),
            line,
            expected: EventRow::COLUMNS,
            actual: record.len(),
        });
    }
    record
        .deserialize::<EventRow>(None)
        .map_err(|_| LogError::InvalidTimestamp {
            path: path.to_path_buf(),
            line,
            value: record.get(1).unwrap_or_default().to_string(),
        })
}

/// Renders a latency the way it appears in `result.csv`: `50.0`, `12.5`.
pub fn format_latency(v: f64) -> String {
    format!("{:?}", v)
}

/// Overwrites `path` with one `sendTimestamp,messageId,latency|MISSING` row
/// per outbound message.
pub fn write_result(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    for row in rows {
        let outcome = match row.outcome {
            Outcome::Latency { avg_ms, .. } => format_latency(avg_ms),
            Outcome::Missing => MISSING_MARKER.to_string(),
        };
        writer
            .write_record([
                row.send_timestamp.to_string().as_str(),
                row.message_id.as_str(),
                outcome.as_str(),
            ])
            .with_context(|| format!("write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

fn format_receipts(send_timestamp: i64, receipts: &[Receipt]) -> String {
    receipts
        .iter()
        .map(|r| format!("{}({})", r.node_id, r.timestamp - send_timestamp))
        .collect::<Vec<_>>()
        .join(",")
}

/// Overwrites `path` with one row per outbound message naming its sender and
/// each receiver with that receiver's own latency.
pub fn write_detail(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer
        .write_record(DETAIL_HEADER)
        .with_context(|| format!("write {}", path.display()))?;
    for row in rows {
        let average = match row.outcome {
            Outcome::Latency { avg_ms, .. } => format!("{:.2}", avg_ms),
            Outcome::Missing => MISSING_MARKER.to_string(),
        };
        writer
            .write_record([
                row.message_id.as_str(),
                row.sent_by.as_str(),
                row.send_timestamp.to_string().as_str(),
                average.as_str(),
                format_receipts(row.send_timestamp, &row.receipts).as_str(),
            ])
            .with_context(|| format!("write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}
