//! # Tracer Bench - Main Entry Point
//!
//! Samples the latency of masking interruptions and of yielding the
//! processor on every CPU core, and reports machine-wide statistics.
//!
//! ## Flow
//!
//! 1. **Parse arguments** and **initialize logging**
//! 2. **Build the engine**: one worker per CPU core (or `--units`), pinned
//!    unless `--no-pin` is given
//! 3. **Percentile pass**: when `--percentile` is given, a single-threaded
//!    pass whose result is reported with every run
//! 4. **Runs**: `--runs` sampling runs, each printed as a summary table
//! 5. **Results**: the collected runs are written as JSON with `--output-file`
//!
//! ## Error Handling
//!
//! A failing run stops the program unless `--continue-on-error` is given, in
//! which case the remaining runs still execute and are reported.

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Instant;
use tracer_bench::{
    cli::Args,
    logging,
    utils::{self, create_progress_indicator, format_stat, print_table_row, print_table_separator},
    BenchmarkResults, BenchmarkRunner, Controller, GlobalStats, HostProbe, PerCpuExecutor,
    ProbeKind, ResultsManager,
};
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG overrides the level chosen with -v/-q.
    let _log_guard = logging::init(args.log_level(), args.log_file.as_deref())
        .context("Failed to initialize logging")?;

    info!("Starting Tracer Bench {}", tracer_bench::VERSION);
    debug!("Configuration: {:?}", args);

    utils::validate_sample_count(args.nr_samples)?;
    if let Some(units) = args.units {
        utils::validate_units(units)?;
    }

    let executor = match args.units {
        Some(units) => PerCpuExecutor::with_units(units),
        None => PerCpuExecutor::detect(),
    };
    let executor = if args.no_pin { executor.unpinned() } else { executor };
    let pinned = executor.is_pinned();

    let runner = BenchmarkRunner::new(HostProbe).with_executor(executor);
    let controller = Controller::with_config(runner, args.run_config());
    let config = controller.config();
    info!(
        "{} workers ({}), {} samples per kind, top-{} retained",
        controller.runner().units(),
        if pinned { "pinned" } else { "unpinned" },
        config.sample_count,
        config.topk_capacity
    );

    let mut results_manager = ResultsManager::new(args.output_file.as_deref());

    if let Some(p) = args.percentile {
        controller
            .trigger_percentile(p)
            .with_context(|| format!("Percentile pass p{} failed", p))?;
    }

    let run_id = utils::generate_run_id();
    let total_runs = args.runs as usize;

    for index in 0..total_runs {
        info!(
            "Run {}/{} {}",
            index + 1,
            total_runs,
            create_progress_indicator(index, total_runs, 20)
        );

        let started = Instant::now();
        match controller.trigger_run() {
            Ok(()) => {
                let stats = controller.read_results();
                print_summary(&stats);
                results_manager.add_results(BenchmarkResults::new(
                    run_id.as_str(),
                    index,
                    config,
                    pinned,
                    stats,
                    started.elapsed(),
                ));
            }
            Err(e) => {
                error!("Run {} failed: {}", index + 1, e);
                if !args.continue_on_error {
                    return Err(e.into());
                }
            }
        }
    }

    results_manager.finalize()?;

    info!("Tracer Bench completed successfully");
    Ok(())
}

/// Print one row per probe kind with every computed figure.
fn print_summary(stats: &GlobalStats) {
    let percentile_header = stats
        .percentile_rank
        .map_or_else(|| "Percentile".to_string(), |p| format!("P{}", p));
    let widths = [8, 12, 12, 12, 12, 12];

    println!();
    print_table_separator(&widths);
    print_table_row(
        &["Kind", "Median", "Average", "Max", "Max avg", percentile_header.as_str()],
        &widths,
    );
    print_table_separator(&widths);

    for kind in ProbeKind::ALL {
        let s = stats.kind(kind);
        let columns = [
            kind.name().to_string(),
            format_stat(s.median),
            format_stat(s.average),
            format_stat(s.max),
            format_stat(s.max_avg),
            format_stat(s.percentile),
        ];
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        print_table_row(&columns, &widths);
    }
    print_table_separator(&widths);

    if stats.overflowed() {
        println!("warning: a sum overflowed, averages are not reliable");
    }
}
