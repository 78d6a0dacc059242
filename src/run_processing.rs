use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::analyzer::{correlate, merge_nodes, SendConflict};
use crate::config::{read_config, CSV_SUBDIR};
use crate::io_utils::{read_node_log, scan_runs, RowPolicy};
use crate::model::{NodeEvents, RunAnalysis};
use crate::report::{emit_run, BatchSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorPolicy {
    Abort,
    Skip,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub send_conflict: SendConflict,
    pub malformed_rows: RowPolicy,
    pub on_run_error: RunErrorPolicy,
    pub show_table: bool,
    pub profile: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            send_conflict: SendConflict::KeepLast,
            malformed_rows: RowPolicy::Fail,
            on_run_error: RunErrorPolicy::Abort,
            show_table: true,
            profile: false,
        }
    }
}

/// Reads one run's `csv/` directory and correlates its events. Nothing is
/// written here; see [`emit_run`].
pub fn analyze_run(run_dir: &Path, opts: &RunOptions) -> Result<RunAnalysis> {
    let csv_dir = run_dir.join(CSV_SUBDIR);
    let config = read_config(&csv_dir)?;

    let t_load = Instant::now();
    // par_iter over a BTreeMap keeps node-id order in the collected Vec.
    let nodes: Vec<NodeEvents> = config
        .nodes
        .par_iter()
        .map(|(id, _)| read_node_log(&csv_dir, id, opts.malformed_rows))
        .collect::<Result<_>>()?;
    if opts.profile {
        log::info!(
            "[profile] {}: load {} node logs: {:.3}s",
            csv_dir.display(),
            nodes.len(),
            t_load.elapsed().as_secs_f64()
        );
    }

    let merged = merge_nodes(nodes, opts.send_conflict)
        .with_context(|| format!("merge events of {}", csv_dir.display()))?;
    let mut run = correlate(&merged, config.expected_receivers());
    run.csv_dir = csv_dir;
    Ok(run)
}

/// Analyzes every run under `root` in parallel, then writes and reports them
/// one by one in path order. Under [`RunErrorPolicy::Abort`] the first failing
/// run stops the batch and later runs are left untouched.
pub fn analyze_batch(root: &Path, opts: &RunOptions) -> Result<BatchSummary> {
    let runs = scan_runs(root)?;
    log::info!("{} runs found under {}", runs.len(), root.display());

    let t_analyze = Instant::now();
    let analyses: Vec<(PathBuf, Result<RunAnalysis>)> = runs
        .into_par_iter()
        .map(|dir| {
            let result = analyze_run(&dir, opts);
            (dir, result)
        })
        .collect();
    if opts.profile {
        log::info!(
            "[profile] analyze runs: {:.3}s",
            t_analyze.elapsed().as_secs_f64()
        );
    }

    let mut batch = BatchSummary::default();
    for (dir, result) in analyses {
        let outcome = result.and_then(|run| {
            emit_run(&run, opts.show_table)?;
            Ok(run)
        });
        match outcome {
            Ok(run) => batch.add(&run),
            Err(e) => match opts.on_run_error {
                RunErrorPolicy::Abort => {
                    return Err(e.context(format!("analyze run {}", dir.display())));
                }
                RunErrorPolicy::Skip => {
                    log::error!("skipping run {}: {:#}", dir.display(), e);
                    batch.runs_skipped += 1;
                }
            },
        }
    }
    Ok(batch)
}
