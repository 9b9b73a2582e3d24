//! # Control Surface
//!
//! [`Controller`] is the process-wide face of the engine: it keeps the
//! current [`RunConfig`] and the most recent [`GlobalStats`], triggers runs
//! and percentile requests, and answers reads.
//!
//! Configuration and results can be addressed by name, mirroring a
//! file-like interface where each value is its own entry:
//!
//! | Name              | Access | Meaning                                |
//! |-------------------|--------|----------------------------------------|
//! | `nr_samples`      | rw     | samples per kind per worker            |
//! | `nr_highest`      | rw     | top-K capacity                         |
//! | `<kind>/<field>`  | r      | e.g. `irq/median`, `preempt/max_avg`   |
//!
//! Written configuration is only validated by the next run. Reads return
//! the last stored result; they are not ordered against a run in flight on
//! another thread.

use crate::benchmark::BenchmarkRunner;
use crate::error::{BenchError, Result};
use crate::metrics::{GlobalStats, RunConfig};
use crate::probe::{PerKind, Probe, ProbeKind};
use parking_lot::RwLock;
use tracing::{debug, info};

/// Name of the sample count entry.
pub const NR_SAMPLES: &str = "nr_samples";
/// Name of the top-K capacity entry.
pub const NR_HIGHEST: &str = "nr_highest";

pub struct Controller<P> {
    runner: BenchmarkRunner<P>,
    config: RwLock<RunConfig>,
    results: RwLock<GlobalStats>,
}

impl<P: Probe> Controller<P> {
    pub fn new(runner: BenchmarkRunner<P>) -> Self {
        Self::with_config(runner, RunConfig::default())
    }

    pub fn with_config(runner: BenchmarkRunner<P>, config: RunConfig) -> Self {
        Self {
            runner,
            config: RwLock::new(config),
            results: RwLock::new(GlobalStats::default()),
        }
    }

    pub fn runner(&self) -> &BenchmarkRunner<P> {
        &self.runner
    }

    pub fn config(&self) -> RunConfig {
        *self.config.read()
    }

    pub fn set_config(&self, sample_count: usize, topk_capacity: usize) {
        *self.config.write() = RunConfig::new(sample_count, topk_capacity);
        debug!(
            "Configuration set: {}={} {}={}",
            NR_SAMPLES, sample_count, NR_HIGHEST, topk_capacity
        );
    }

    /// Set one configuration entry from its textual value.
    pub fn write_config(&self, name: &str, value: &str) -> Result<()> {
        let parsed: usize = value.trim().parse().map_err(|_| {
            BenchError::invalid_config(format!("{} expects a non-negative integer, got {:?}", name, value))
        })?;

        let mut config = self.config.write();
        match name {
            NR_SAMPLES => config.sample_count = parsed,
            NR_HIGHEST => config.topk_capacity = parsed,
            _ => {
                return Err(BenchError::invalid_config(format!(
                    "unknown configuration entry {:?}",
                    name
                )))
            }
        }
        debug!("Configuration entry {} set to {}", name, parsed);
        Ok(())
    }

    pub fn read_config(&self, name: &str) -> Option<usize> {
        let config = self.config.read();
        match name {
            NR_SAMPLES => Some(config.sample_count),
            NR_HIGHEST => Some(config.topk_capacity),
            _ => None,
        }
    }

    /// Run with the current configuration and store the result.
    ///
    /// On failure the previous result is left untouched.
    pub fn trigger_run(&self) -> Result<()> {
        let config = self.config();
        let global = self.runner.run(&config)?;

        let mut results = self.results.write();
        let percentile = results.stats.map(|_, stats| stats.percentile);
        let rank = results.percentile_rank;
        *results = global;
        results.percentile_rank = rank;
        for kind in ProbeKind::ALL {
            results.stats[kind].percentile = percentile[kind];
        }
        Ok(())
    }

    /// Compute the `p`-th percentile of fresh samples and store it.
    pub fn trigger_percentile(&self, p: u32) -> Result<()> {
        let config = self.config();
        let values: PerKind<u64> = self.runner.percentile_run(p, &config)?;

        let mut results = self.results.write();
        results.percentile_rank = Some(p);
        for (kind, value) in values.iter() {
            results.stats[kind].percentile = Some(*value);
        }
        info!("Stored p{} for {} samples", p, config.sample_count);
        Ok(())
    }

    pub fn read_results(&self) -> GlobalStats {
        *self.results.read()
    }

    /// Read one result field by its `<kind>/<field>` path.
    pub fn read_field(&self, path: &str) -> Option<u64> {
        self.results.read().field(path)
    }
}
