use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Instant;

use delivery_latency_rs::args::Args;
use delivery_latency_rs::config::profile_enabled;
use delivery_latency_rs::report::print_batch_summary;
use delivery_latency_rs::run_processing::{analyze_batch, RunOptions};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let profile = profile_enabled();
    let t0 = Instant::now();

    let args = Args::parse();
    let Some(root) = args.root.clone() else {
        eprintln!("please give a path");
        std::process::exit(1);
    };
    println!("start to analyze: {}", root.display());

    let workers = args.worker_count();
    log::debug!("using {} worker threads", workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| anyhow!("failed to build worker pool: {}", e))?;

    let opts = RunOptions {
        send_conflict: args.send_conflict.into(),
        malformed_rows: args.malformed_rows.into(),
        on_run_error: args.on_run_error.into(),
        show_table: !args.no_table,
        profile,
    };
    let batch = pool.install(|| analyze_batch(&root, &opts))?;
    print_batch_summary(&mut std::io::stdout().lock(), &batch)?;

    if profile {
        log::info!("[profile] total main: {:.3}s", t0.elapsed().as_secs_f64());
    }
    Ok(())
}
