//! # Statistics Data Model
//!
//! Plain data carried between the engine's stages:
//!
//! - [`RunConfig`]: sample count and top-K capacity, validated once per run
//! - [`LocalStats`]: what one worker derives from its own samples
//! - [`Statistics`]: the reported figures for one probe kind
//! - [`GlobalStats`]: the machine-wide result of a run
//!
//! All durations are `u64` nanoseconds.

use crate::error::{BenchError, Result};
use crate::probe::{PerKind, ProbeKind};
use serde::{Deserialize, Serialize};

/// Parameters of one sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Probe invocations per kind per worker (`nr_samples`).
    pub sample_count: usize,
    /// Number of largest samples retained machine-wide per kind (`nr_highest`).
    pub topk_capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sample_count: crate::defaults::NR_SAMPLES,
            topk_capacity: crate::defaults::NR_HIGHEST,
        }
    }
}

impl RunConfig {
    pub fn new(sample_count: usize, topk_capacity: usize) -> Self {
        Self {
            sample_count,
            topk_capacity,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_count == 0 {
            return Err(BenchError::invalid_config("number of samples cannot be zero"));
        }
        Ok(())
    }

    /// Capacity actually used for the retainers: a worker can never
    /// contribute more than it sampled.
    pub fn effective_topk(&self) -> usize {
        self.topk_capacity.min(self.sample_count)
    }
}

/// Statistics one worker computes over its private samples of one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStats {
    pub median: u64,
    pub average: u64,
    pub max: u64,
    pub overflowed: bool,
}

/// Names of the reported fields, as exposed by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatField {
    Median,
    Average,
    Max,
    MaxAvg,
    Percentile,
}

impl StatField {
    pub const ALL: [StatField; 5] = [
        StatField::Median,
        StatField::Average,
        StatField::Max,
        StatField::MaxAvg,
        StatField::Percentile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StatField::Median => "median",
            StatField::Average => "average",
            StatField::Max => "max",
            StatField::MaxAvg => "max_avg",
            StatField::Percentile => "percentile",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }
}

/// Reported figures for one probe kind.
///
/// Every field is optional because each is produced by a different request:
/// a sampling run fills `median`, `average`, `max` and `max_avg`, a
/// percentile request fills `percentile`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub median: Option<u64>,
    pub average: Option<u64>,
    pub max: Option<u64>,
    /// Mean of the largest samples retained across all workers.
    pub max_avg: Option<u64>,
    pub percentile: Option<u64>,
    /// Set when any summation feeding these figures overflowed.
    pub overflowed: bool,
}

impl Statistics {
    pub fn get(&self, field: StatField) -> Option<u64> {
        match field {
            StatField::Median => self.median,
            StatField::Average => self.average,
            StatField::Max => self.max,
            StatField::MaxAvg => self.max_avg,
            StatField::Percentile => self.percentile,
        }
    }
}

/// Machine-wide result of the most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Number of workers whose statistics were reduced.
    pub units: usize,
    /// Percentile requested by the last percentile run, if any.
    pub percentile_rank: Option<u32>,
    pub stats: PerKind<Statistics>,
}

impl GlobalStats {
    pub fn kind(&self, kind: ProbeKind) -> &Statistics {
        &self.stats[kind]
    }

    /// Look up a field by its `<kind>/<field>` path, e.g. `irq/median`.
    pub fn field(&self, path: &str) -> Option<u64> {
        let (kind, field) = path.split_once('/')?;
        let kind = ProbeKind::from_name(kind)?;
        let field = StatField::from_name(field)?;
        self.stats[kind].get(field)
    }

    pub fn overflowed(&self) -> bool {
        self.stats.iter().any(|(_, stats)| stats.overflowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.sample_count, 10_000);
        assert_eq!(config.topk_capacity, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_config_validation() {
        assert!(matches!(
            RunConfig::new(0, 10).validate(),
            Err(BenchError::InvalidConfig(_))
        ));
        assert!(RunConfig::new(1, 0).validate().is_ok());
    }

    #[test]
    fn test_effective_topk_is_capped_by_samples() {
        assert_eq!(RunConfig::new(5, 100).effective_topk(), 5);
        assert_eq!(RunConfig::new(500, 100).effective_topk(), 100);
        assert_eq!(RunConfig::new(5, 0).effective_topk(), 0);
    }

    #[test]
    fn test_field_paths() {
        let mut global = GlobalStats::default();
        global.stats.irq.median = Some(3);
        global.stats.preempt.max_avg = Some(9);

        assert_eq!(global.field("irq/median"), Some(3));
        assert_eq!(global.field("preempt/max_avg"), Some(9));
        assert_eq!(global.field("preempt/median"), None);
        assert_eq!(global.field("irq"), None);
        assert_eq!(global.field("nmi/median"), None);
        assert_eq!(global.field("irq/p99"), None);
    }

    #[test]
    fn test_overflow_flag_is_any_kind() {
        let mut global = GlobalStats::default();
        assert!(!global.overflowed());
        global.stats.preempt.overflowed = true;
        assert!(global.overflowed());
    }

    #[test]
    fn test_statistics_serialize_with_kind_names() {
        let global = GlobalStats::default();
        let json = serde_json::to_value(global).unwrap();
        assert!(json["stats"]["irq"].is_object());
        assert!(json["stats"]["preempt"].is_object());
    }
}
