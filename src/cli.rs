use crate::metrics::RunConfig;
use clap::Parser;
use std::path::PathBuf;

/// Tracer Bench - per-CPU latency sampling of interrupt masking and preemption
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Samples per probe kind taken by every worker
    #[clap(short = 'n', long, default_value_t = crate::defaults::NR_SAMPLES, help_heading = "Sampling Options")]
    pub nr_samples: usize,

    /// Number of largest samples retained machine-wide per kind (0 disables max_avg)
    #[clap(short = 'k', long, default_value_t = crate::defaults::NR_HIGHEST, help_heading = "Sampling Options")]
    pub nr_highest: usize,

    /// Also compute this percentile (1-100) over a single-threaded pass
    #[clap(short = 'p', long, value_parser = clap::value_parser!(u32).range(1..=100), help_heading = "Sampling Options")]
    pub percentile: Option<u32>,

    /// Number of sampling runs to perform
    #[clap(short = 'r', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub runs: u32,

    /// Run this many unpinned workers instead of one per CPU core
    #[clap(short = 'u', long, help_heading = "Placement Options")]
    pub units: Option<usize>,

    /// Do not pin workers to their CPU cores
    #[clap(long, default_value_t = false, help_heading = "Placement Options")]
    pub no_pin: bool,

    /// Output file for results (JSON format)
    #[clap(short = 'o', long)]
    pub output_file: Option<PathBuf>,

    /// Also write plain log lines to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Continue with the remaining runs even if one fails
    #[clap(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[clap(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(self.nr_samples, self.nr_highest)
    }

    /// Default log filter directive when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
