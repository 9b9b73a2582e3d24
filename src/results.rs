//! # Result Documents
//!
//! Every completed run becomes a [`BenchmarkResults`] record. The
//! [`ResultsManager`] collects the records of one invocation and, on
//! [`ResultsManager::finalize`], writes a single pretty-printed JSON document
//! with metadata, the individual runs and a summary across runs.

use crate::metrics::{GlobalStats, RunConfig};
use crate::probe::{PerKind, ProbeKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One completed sampling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    /// Identifier shared by every run of one invocation.
    pub run_id: String,
    /// Position of this run within the invocation, starting at 0.
    pub run_index: usize,
    pub config: RunConfig,
    pub units: usize,
    pub pinned: bool,
    pub stats: GlobalStats,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub run_duration: Duration,
}

impl BenchmarkResults {
    pub fn new(
        run_id: impl Into<String>,
        run_index: usize,
        config: RunConfig,
        pinned: bool,
        stats: GlobalStats,
        run_duration: Duration,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            run_index,
            config,
            units: stats.units,
            pinned,
            stats,
            timestamp: chrono::Utc::now(),
            run_duration,
        }
    }
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub rust_version: String,
    pub benchmark_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: crate::utils::get_cpu_cores(),
            rust_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Spread of one kind's figures across the runs of an invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSummary {
    pub lowest_median: Option<u64>,
    pub highest_median: Option<u64>,
    pub highest_max: Option<u64>,
}

/// Summary across all runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallSummary {
    pub total_runs: usize,
    /// Runs whose statistics were computed from an overflowed sum.
    pub overflowed_runs: usize,
    pub kinds: PerKind<KindSummary>,
}

/// Benchmark metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct BenchmarkMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub total_runs: usize,
    pub system_info: SystemInfo,
}

/// The document written by [`ResultsManager::finalize`].
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalBenchmarkResults {
    pub metadata: BenchmarkMetadata,
    pub results: Vec<BenchmarkResults>,
    pub summary: OverallSummary,
}

/// Collects run results and writes them out once at the end.
pub struct ResultsManager {
    output_file: Option<PathBuf>,
    results: Vec<BenchmarkResults>,
}

impl ResultsManager {
    /// Without an output file, results are only logged.
    pub fn new(output_file: Option<&Path>) -> Self {
        Self {
            output_file: output_file.map(Path::to_path_buf),
            results: Vec::new(),
        }
    }

    pub fn add_results(&mut self, results: BenchmarkResults) {
        debug!(
            "Adding results for run {} ({} units)",
            results.run_index, results.units
        );
        if results.stats.overflowed() {
            warn!(
                "Run {} summed past u64::MAX; its averages are not reliable",
                results.run_index
            );
        }
        self.results.push(results);
    }

    pub fn results(&self) -> &[BenchmarkResults] {
        &self.results
    }

    pub fn summary(&self) -> OverallSummary {
        let kinds = PerKind::from_fn(|kind| self.kind_summary(kind));
        OverallSummary {
            total_runs: self.results.len(),
            overflowed_runs: self.results.iter().filter(|r| r.stats.overflowed()).count(),
            kinds,
        }
    }

    fn kind_summary(&self, kind: ProbeKind) -> KindSummary {
        let medians = self.results.iter().filter_map(|r| r.stats.kind(kind).median);
        KindSummary {
            lowest_median: medians.clone().min(),
            highest_median: medians.max(),
            highest_max: self
                .results
                .iter()
                .filter_map(|r| r.stats.kind(kind).max)
                .max(),
        }
    }

    /// Write the final document, if an output file was configured.
    pub fn finalize(&self) -> Result<()> {
        info!("Finalizing results of {} runs", self.results.len());

        let Some(output_file) = &self.output_file else {
            return Ok(());
        };

        let document = FinalBenchmarkResults {
            metadata: BenchmarkMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                total_runs: self.results.len(),
                system_info: SystemInfo::default(),
            },
            results: self.results.clone(),
            summary: self.summary(),
        };

        let json = serde_json::to_string_pretty(&document).context("Failed to serialize results")?;
        std::fs::write(output_file, json)
            .with_context(|| format!("Failed to write results to {:?}", output_file))?;

        info!("Results written to: {:?}", output_file);
        Ok(())
    }
}
