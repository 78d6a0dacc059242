use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::analyzer::SendConflict;
use crate::config::{MAX_DEFAULT_WORKERS, WORKERS_ENV};
use crate::io_utils::RowPolicy;
use crate::run_processing::RunErrorPolicy;

#[derive(Parser, Debug)]
#[command(about = "Compute message delivery latency from load-test node logs")]
pub struct Args {
    /// Directory whose subdirectories are test runs, each with a csv/ folder
    pub root: Option<PathBuf>,

    /// Which send wins when several nodes log one for the same message
    #[arg(long = "send-conflict", value_enum, default_value_t = SendConflictArg::KeepLast)]
    pub send_conflict: SendConflictArg,

    /// What a run that cannot be analyzed does to the rest of the batch
    #[arg(long = "on-run-error", value_enum, default_value_t = RunErrorArg::Abort)]
    pub on_run_error: RunErrorArg,

    /// Whether a malformed log row fails the run or is skipped
    #[arg(long = "malformed-rows", value_enum, default_value_t = RowPolicyArg::Fail)]
    pub malformed_rows: RowPolicyArg,

    /// Worker threads (default: available cores, at most 8)
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,

    /// Do not print the per-run percentile table
    #[arg(long = "no-table")]
    pub no_table: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendConflictArg {
    KeepLast,
    KeepFirst,
    Error,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunErrorArg {
    Abort,
    Skip,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowPolicyArg {
    Fail,
    Skip,
}

impl From<SendConflictArg> for SendConflict {
    fn from(v: SendConflictArg) -> Self {
        match v {
            SendConflictArg::KeepLast => SendConflict::KeepLast,
            SendConflictArg::KeepFirst => SendConflict::KeepFirst,
            SendConflictArg::Error => SendConflict::Error,
        }
    }
}

impl From<RunErrorArg> for RunErrorPolicy {
    fn from(v: RunErrorArg) -> Self {
        match v {
            RunErrorArg::Abort => RunErrorPolicy::Abort,
            RunErrorArg::Skip => RunErrorPolicy::Skip,
        }
    }
}

impl From<RowPolicyArg> for RowPolicy {
    fn from(v: RowPolicyArg) -> Self {
        match v {
            RowPolicyArg::Fail => RowPolicy::Fail,
            RowPolicyArg::Skip => RowPolicy::Skip,
        }
    }
}

impl Args {
    /// `--jobs`, then the workers env var, then core count capped at 8.
    pub fn worker_count(&self) -> usize {
        if let Some(n) = self.jobs {
            return n.max(1);
        }
        if let Ok(v) = std::env::var(WORKERS_ENV) {
            if let Ok(n) = v.parse::<usize>() {
                return n.max(1);
            }
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .clamp(1, MAX_DEFAULT_WORKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_original_behaviour() {
        let args = Args::parse_from(["delivery_latency", "/tmp/runs"]);
        assert_eq!(args.root, Some(PathBuf::from("/tmp/runs")));
        assert_eq!(args.send_conflict, SendConflictArg::KeepLast);
        assert_eq!(args.on_run_error, RunErrorArg::Abort);
        assert_eq!(args.malformed_rows, RowPolicyArg::Fail);
        assert!(!args.no_table);
    }

    #[test]
    fn root_is_optional_at_parse_time() {
        let args = Args::parse_from(["delivery_latency"]);
        assert!(args.root.is_none());
    }

    #[test]
    fn parses_policies_and_jobs() {
        let args = Args::parse_from([
            "delivery_latency",
            "runs",
            "--send-conflict",
            "keep-first",
            "--on-run-error",
            "skip",
            "--malformed-rows",
            "skip",
            "-j",
            "3",
        ]);
        assert_eq!(SendConflict::from(args.send_conflict), SendConflict::KeepFirst);
        assert_eq!(RunErrorPolicy::from(args.on_run_error), RunErrorPolicy::Skip);
        assert_eq!(RowPolicy::from(args.malformed_rows), RowPolicy::Skip);
        assert_eq!(args.worker_count(), 3);
    }
}
