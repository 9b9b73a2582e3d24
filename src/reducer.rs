//! # Cross-Worker Reduction
//!
//! Combines the workers' local statistics and the shared retainers into one
//! [`GlobalStats`]:
//!
//! | Figure    | Reduction                                         |
//! |-----------|---------------------------------------------------|
//! | `median`  | median of the per-worker medians                  |
//! | `average` | truncated mean of the per-worker averages         |
//! | `max`     | maximum of the per-worker maxima                  |
//! | `max_avg` | mean of the values held by the kind's retainer    |
//!
//! The median is second order: raw samples are never pooled machine-wide,
//! which keeps memory bounded by `units` rather than `units * N`.
//!
//! The mean of means equals the pooled mean only because every worker takes
//! the same number of samples in a run. Callers must not feed it local
//! statistics computed over different sample counts.

use crate::error::{BenchError, Result};
use crate::metrics::{GlobalStats, LocalStats, Statistics};
use crate::probe::{PerKind, ProbeKind};
use crate::stats::{self, CheckedSum};
use crate::topk::TopK;
use tracing::debug;

/// Reduce one probe kind.
pub fn reduce_kind(locals: &[LocalStats], retainer: &TopK<u64>) -> Result<Statistics> {
    let mut medians = Vec::new();
    medians
        .try_reserve_exact(locals.len())
        .map_err(|_| BenchError::AllocationFailure {
            what: "worker medians",
            len: locals.len(),
        })?;
    medians.extend(locals.iter().map(|s| s.median));

    let median = stats::median_and_max(&mut medians)?.median;
    let averages: CheckedSum = locals.iter().map(|s| s.average).collect();
    let max = locals.iter().map(|s| s.max).max();
    let max_avg = retainer.average();

    let overflowed = averages.overflowed()
        || locals.iter().any(|s| s.overflowed)
        || max_avg.map_or(false, |avg| avg.overflowed);

    Ok(Statistics {
        median: Some(median),
        average: averages.average(),
        max,
        max_avg: max_avg.map(|avg| avg.value),
        percentile: None,
        overflowed,
    })
}

/// Reduce every kind over all workers of a run.
pub fn reduce(workers: &[PerKind<LocalStats>], retainers: &PerKind<TopK<u64>>) -> Result<GlobalStats> {
    let stats = PerKind::try_from_fn(|kind: ProbeKind| {
        let locals: Vec<LocalStats> = workers.iter().map(|w| w[kind]).collect();
        debug!(
            "{} medians: {:?}",
            kind,
            locals.iter().map(|s| s.median).collect::<Vec<_>>()
        );
        reduce_kind(&locals, &retainers[kind])
    })?;

    Ok(GlobalStats {
        units: workers.len(),
        percentile_rank: None,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(median: u64, average: u64, max: u64) -> LocalStats {
        LocalStats {
            median,
            average,
            max,
            overflowed: false,
        }
    }

    fn retainer(values: &[u64], k: usize) -> TopK<u64> {
        let mut topk = TopK::try_new(k).unwrap();
        topk.contribute(values.iter().copied());
        topk
    }

    #[test]
    fn test_reduce_kind_uniform_workers() {
        let locals = vec![local(3, 3, 5); 4];
        let stats = reduce_kind(&locals, &retainer(&[5, 4, 5, 4, 5, 4, 5, 4], 2)).unwrap();

        assert_eq!(stats.median, Some(3));
        assert_eq!(stats.average, Some(3));
        assert_eq!(stats.max, Some(5));
        assert_eq!(stats.max_avg, Some(5));
        assert_eq!(stats.percentile, None);
        assert!(!stats.overflowed);
    }

    #[test]
    fn test_reduce_kind_second_order_median() {
        let locals = vec![local(10, 12, 40), local(2, 4, 90), local(6, 7, 8), local(4, 5, 6)];
        let stats = reduce_kind(&locals, &retainer(&[], 4)).unwrap();

        // medians sorted: 2 4 6 10 -> (4 + 6) / 2
        assert_eq!(stats.median, Some(5));
        // (12 + 4 + 7 + 5) / 4 = 7
        assert_eq!(stats.average, Some(7));
        assert_eq!(stats.max, Some(90));
        assert_eq!(stats.max_avg, None);
    }

    #[test]
    fn test_reduce_kind_propagates_overflow() {
        let mut flagged = local(1, 1, 1);
        flagged.overflowed = true;
        let stats = reduce_kind(&[local(1, 1, 1), flagged], &retainer(&[1], 1)).unwrap();
        assert!(stats.overflowed);

        let stats = reduce_kind(&[local(1, u64::MAX, 1), local(1, 1, 1)], &retainer(&[1], 1)).unwrap();
        assert!(stats.overflowed);
    }

    #[test]
    fn test_reduce_requires_workers() {
        assert!(matches!(
            reduce_kind(&[], &retainer(&[], 1)),
            Err(BenchError::EmptySampleSet)
        ));
    }

    #[test]
    fn test_reduce_all_kinds() {
        let workers = vec![
            PerKind::new(local(3, 3, 5), local(30, 31, 50)),
            PerKind::new(local(1, 2, 9), local(10, 11, 12)),
        ];
        let retainers = PerKind::new(retainer(&[9, 5], 2), retainer(&[50, 12], 2));

        let global = reduce(&workers, &retainers).unwrap();
        assert_eq!(global.units, 2);
        assert_eq!(global.stats.irq.median, Some(2));
        assert_eq!(global.stats.irq.max, Some(9));
        assert_eq!(global.stats.irq.max_avg, Some(7));
        assert_eq!(global.stats.preempt.median, Some(20));
        assert_eq!(global.stats.preempt.average, Some(21));
        assert_eq!(global.stats.preempt.max_avg, Some(31));
    }
}
