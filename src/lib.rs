//! # Tracer Bench Library
//!
//! Parallel latency sampling and aggregation. One worker per processing unit
//! times a short probe operation many times, derives local statistics, and
//! the per-worker results are reduced into machine-wide figures.
//!
//! ## Measured Figures
//!
//! For every probe kind (`irq` and `preempt`):
//!
//! - **median**: median of the per-worker medians
//! - **average**: mean of the per-worker means
//! - **max**: largest sample seen on any worker
//! - **max_avg**: mean of the K largest samples seen machine-wide
//! - **percentile**: nearest-rank percentile over a single-threaded pass
//!
//! ## Architecture Overview
//!
//! - `stats`: order statistics and overflow-checked summation
//! - `topk`: bounded retainer for the K largest values
//! - `probe`: the timed operations and per-kind containers
//! - `gate`: the broadcast latch releasing all workers at once
//! - `executor`: one pinned OS thread per processing unit
//! - `worker`: the per-worker sampling state machine
//! - `reducer`: cross-worker reduction
//! - `benchmark`: the run orchestrator
//! - `control`: named configuration and result access
//! - `results`: JSON result documents
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use tracer_bench::{BenchmarkRunner, FnProbe, PerCpuExecutor, ProbeKind, RunConfig};
//!
//! fn main() -> Result<(), tracer_bench::BenchError> {
//!     let probe = FnProbe(|kind: ProbeKind| match kind {
//!         ProbeKind::Irq => 40u64,
//!         ProbeKind::Preempt => 90,
//!     });
//!     let runner = BenchmarkRunner::new(probe).with_executor(PerCpuExecutor::with_units(4));
//!
//!     let stats = runner.run(&RunConfig::new(10_000, 100))?;
//!     println!("irq median: {:?}", stats.kind(ProbeKind::Irq).median);
//!     Ok(())
//! }
//! ```

/// Run orchestration
///
/// Contains [`BenchmarkRunner`], which validates a configuration, allocates
/// the per-run state, drives every worker through one run and reduces their
/// results. Also home of the [`benchmark::BufferAllocator`] seam.
pub mod benchmark;

/// Command-line interface and configuration
pub mod cli;

/// Named configuration writes and result reads over the last run
pub mod control;

pub mod error;

/// Per-unit worker threads
///
/// The [`executor::UnitExecutor`] trait and its OS-thread implementation,
/// which starts one worker per CPU core and pins it there.
pub mod executor;

pub mod gate;

/// Log output formatting and subscriber setup
pub mod logging;

/// Statistics data model
///
/// Run configuration, per-worker statistics and the machine-wide result of
/// a run, addressable by `<kind>/<field>` paths.
pub mod metrics;

pub mod probe;

pub mod reducer;

/// Result collection, aggregation, and output formatting
///
/// Manages the collection and presentation of run results with:
/// - Structured JSON output with metadata
/// - A summary across repeated runs
/// - System information collection for reproducibility
pub mod results;

pub mod stats;

pub mod topk;

pub mod utils;

pub mod worker;

/// Main run engine
pub use benchmark::{BenchmarkRunner, BufferAllocator, HeapAllocator};

pub use control::Controller;

pub use error::BenchError;

pub use executor::{PerCpuExecutor, UnitExecutor};

/// Statistics types returned by a run
pub use metrics::{GlobalStats, LocalStats, RunConfig, Statistics};

#[cfg(unix)]
pub use probe::HostProbe;
pub use probe::{FnProbe, PerKind, Probe, ProbeKind};

/// Result collection and management
pub use results::{BenchmarkResults, ResultsManager};

pub use topk::TopK;

/// The current version of the crate
///
/// Populated from Cargo.toml and recorded in result documents.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Default number of samples per probe kind per worker
    ///
    /// 10,000 samples keep a run well under a second on typical hardware
    /// while giving stable medians.
    pub const NR_SAMPLES: usize = 10000;

    /// Default top-K capacity
    ///
    /// The mean of the 100 largest samples machine-wide.
    pub const NR_HIGHEST: usize = 100;
}
