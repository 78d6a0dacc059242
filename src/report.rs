use anyhow::Result;
use prettytable::{Cell, Row, Table};
use std::io::{self, Write};

use crate::config::{DETAIL_FILE, RESULT_FILE};
use crate::io_utils::{format_latency, write_detail, write_result};
use crate::model::RunAnalysis;
use crate::stats::{statistics_from_vec, Statistics};

/// Totals over every run that was reported.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub runs_analyzed: usize,
    pub runs_skipped: usize,
    pub total_latency: f64,
    pub resolved: usize,
}

impl BatchSummary {
    pub fn add(&mut self, run: &RunAnalysis) {
        self.runs_analyzed += 1;
        self.total_latency += run.total_latency;
        self.resolved += run.resolved;
    }

    pub fn mean_latency(&self) -> Option<f64> {
        if self.resolved == 0 {
            None
        } else {
            Some(self.total_latency / self.resolved as f64)
        }
    }
}

/// Overwrites the run's `result.csv` and `latency.csv`, then prints its
/// summary lines to stdout.
pub fn emit_run(run: &RunAnalysis, show_table: bool) -> Result<()> {
    write_result(&run.csv_dir.join(RESULT_FILE), &run.rows)?;
    write_detail(&run.csv_dir.join(DETAIL_FILE), &run.rows)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    print_run_summary(&mut out, run)?;
    if show_table && run.resolved > 0 {
        build_run_table(run).print(&mut out)?;
    }
    Ok(())
}

pub fn print_run_summary(out: &mut impl Write, run: &RunAnalysis) -> io::Result<()> {
    writeln!(out, "{}", "-".repeat(80))?;
    writeln!(out, "analyze: {}", run.csv_dir.display())?;
    if let Some(mean) = run.mean_latency() {
        writeln!(out, "avg delivery latency: {} ms", format_latency(mean))?;
    }
    writeln!(out, "error count: {}", run.unreadable_logs)?;
    writeln!(out, "missing message count: {}", run.missing)?;
    writeln!(
        out,
        "partially delivered message count: {} (expected {} receivers)",
        run.partial, run.expected_receivers
    )?;
    writeln!(
        out,
        "sent {} / received {} rows, {} messages resolved",
        run.sent_rows, run.received_rows, run.resolved
    )?;
    if run.send_collisions > 0 {
        writeln!(out, "duplicate sends merged: {}", run.send_collisions)?;
    }
    if run.skipped_rows > 0 {
        writeln!(out, "malformed rows skipped: {}", run.skipped_rows)?;
    }
    Ok(())
}

pub fn print_batch_summary(out: &mut impl Write, batch: &BatchSummary) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(80))?;
    writeln!(
        out,
        "{} runs analyzed, {} runs skipped",
        batch.runs_analyzed, batch.runs_skipped
    )?;
    if let Some(mean) = batch.mean_latency() {
        writeln!(out, "overall avg delivery latency: {} ms", format_latency(mean))?;
    }
    Ok(())
}

pub fn build_table_title() -> Table {
    let mut table = Table::new();
    table.set_titles(Row::new(
        ["name", "Avg", "Min", "P15", "P25", "P50", "P75", "P90", "P95", "P99", "Max", "Cnt"]
            .iter()
            .map(|t| Cell::new(t))
            .collect(),
    ));
    table
}

pub fn build_run_table(run: &RunAnalysis) -> Table {
    let mut table = build_table_title();
    table.add_row(row_from_stats(
        "delivery latency (ms)",
        &statistics_from_vec(run.latencies()),
        CellFormat::Fixed2,
    ));
    table.add_row(row_from_stats(
        "receivers per message",
        &statistics_from_vec(run.receiver_counts()),
        CellFormat::Count,
    ));
    table
}

#[derive(Debug, Clone, Copy)]
enum CellFormat {
    /// Always two decimals.
    Fixed2,
    /// Integral values without decimals, others with two.
    Count,
}

impl CellFormat {
    fn render(self, v: f64) -> String {
        if v.is_nan() {
            return "nan".to_string();
        }
        match self {
            CellFormat::Fixed2 => format!("{:.2}", v),
            CellFormat::Count if v.fract().abs() < 1e-9 => format!("{}", v as i64),
            CellFormat::Count => format!("{:.2}", v),
        }
    }
}

fn row_from_stats(name: &str, s: &Statistics, fmt: CellFormat) -> Row {
    let mut cells = vec![Cell::new(name)];
    cells.extend(s.values().iter().map(|v| Cell::new(&fmt.render(*v))));
    cells.push(Cell::new(&s.cnt.to_string()));
    Row::new(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageId, Outcome, ResultRow};

    fn run_with(latencies: &[(f64, usize)]) -> RunAnalysis {
        let mut run = RunAnalysis::default();
        for (i, (avg_ms, receivers)) in latencies.iter().enumerate() {
            run.rows.push(ResultRow {
                send_timestamp: i as i64,
                message_id: MessageId::new("e", &i.to_string()),
                outcome: Outcome::Latency {
                    avg_ms: *avg_ms,
                    receivers: *receivers,
                },
                sent_by: "A".to_string(),
                receipts: Vec::new(),
            });
            run.total_latency += avg_ms;
            run.resolved += 1;
        }
        run
    }

    #[test]
    fn table_has_latency_and_fanout_rows() {
        let table = build_run_table(&run_with(&[(10.0, 1), (30.0, 3)]));
        assert_eq!(table.len(), 2);
        let latency = table.get_row(0).unwrap();
        assert_eq!(latency.get_cell(1).unwrap().get_content(), "20.00");
        assert_eq!(latency.get_cell(11).unwrap().get_content(), "2");
        let fanout = table.get_row(1).unwrap();
        assert_eq!(fanout.get_cell(2).unwrap().get_content(), "1");
        assert_eq!(fanout.get_cell(10).unwrap().get_content(), "3");
    }

    fn summary_text(run: &RunAnalysis) -> String {
        let mut out = Vec::new();
        print_run_summary(&mut out, run).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn resolved_run_prints_mean() {
        let text = summary_text(&run_with(&[(50.0, 1)]));
        assert!(text.contains("avg delivery latency: 50.0 ms\n"));
        assert!(text.contains("error count: 0\n"));
        assert!(text.contains("missing message count: 0\n"));
    }

    #[test]
    fn run_without_resolved_messages_omits_mean() {
        let mut run = RunAnalysis::default();
        run.rows.push(ResultRow {
            send_timestamp: 100,
            message_id: MessageId::new("e1", "d1"),
            outcome: Outcome::Missing,
            sent_by: "A".to_string(),
            receipts: Vec::new(),
        });
        run.missing = 1;
        run.unreadable_logs = 1;

        let text = summary_text(&run);
        assert!(!text.contains("avg delivery latency"));
        assert!(text.contains("error count: 1\n"));
        assert!(text.contains("missing message count: 1\n"));
    }

    #[test]
    fn count_cells_drop_integral_decimals() {
        assert_eq!(CellFormat::Count.render(3.0), "3");
        assert_eq!(CellFormat::Count.render(2.5), "2.50");
        assert_eq!(CellFormat::Fixed2.render(3.0), "3.00");
        assert_eq!(CellFormat::Fixed2.render(f64::NAN), "nan");
    }

    #[test]
    fn batch_mean_weights_by_message() {
        let mut batch = BatchSummary::default();
        batch.add(&run_with(&[(10.0, 1)]));
        batch.add(&run_with(&[(40.0, 1), (40.0, 1)]));
        batch.add(&RunAnalysis::default());
        assert_eq!(batch.runs_analyzed, 3);
        assert_eq!(batch.mean_latency(), Some(30.0));
    }
}
