//! # Order Statistics
//!
//! Integer order statistics over nanosecond samples. All values are `u64`
//! nanosecond counts and all divisions truncate.
//!
//! ## Estimators
//!
//! - **Median**: middle element for odd lengths, truncated mean of the two
//!   middle elements for even lengths.
//! - **Percentile**: nearest-rank, *not* interpolated. The position is
//!   `floor(n * p / 100)` clamped into `[0, n - 1]`, so `p = 100` selects the
//!   maximum through the clamp rather than through the formula. This differs
//!   from interpolating estimators at the boundaries and is intentional: the
//!   reported value is always a sample that was actually observed.
//! - **Average**: truncated mean computed through [`CheckedSum`], which flags
//!   overflow instead of aborting.
//!
//! Functions that need ordering sort the caller's buffer in place; the
//! buffer is the worker's private sample set and is not needed in arrival
//! order afterwards.

use crate::error::{BenchError, Result};
use tracing::warn;

/// Sort samples ascending. Stability is irrelevant for plain integers.
pub fn sort(samples: &mut [u64]) {
    samples.sort_unstable();
}

/// Median and maximum of a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MedianMax {
    pub median: u64,
    pub max: u64,
}

/// Sort `samples` in place and return its median and maximum.
///
/// For even lengths the median is the truncated average of the two middle
/// elements, computed without an intermediate sum so it cannot overflow.
pub fn median_and_max(samples: &mut [u64]) -> Result<MedianMax> {
    if samples.is_empty() {
        return Err(BenchError::EmptySampleSet);
    }

    sort(samples);

    let n = samples.len();
    let pos = n / 2;
    let max = samples[n - 1];
    let median = if n % 2 == 1 {
        samples[pos]
    } else {
        midpoint(samples[pos - 1], samples[pos])
    };

    Ok(MedianMax { median, max })
}

/// `floor((a + b) / 2)` without overflow.
fn midpoint(a: u64, b: u64) -> u64 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}

/// Validate a percentile request.
pub fn validate_percentile(p: u32) -> Result<()> {
    if p == 0 || p > 100 {
        return Err(BenchError::invalid_config(format!(
            "percentile {} is outside [1, 100]",
            p
        )));
    }
    Ok(())
}

/// Index selected by the nearest-rank estimator for `n` samples.
///
/// `n` must be at least 1.
pub fn percentile_position(p: u32, n: usize) -> usize {
    let last = n.saturating_sub(1);
    match n.checked_mul(p as usize) {
        Some(scaled) => (scaled / 100).min(last),
        None => {
            warn!("percentile position overflowed for n={} p={}, using maximum", n, p);
            last
        }
    }
}

/// Sort `samples` in place and return the `p`-th percentile.
///
/// Requires `1 <= p <= 100` and a non-empty sample set.
pub fn percentile(p: u32, samples: &mut [u64]) -> Result<u64> {
    validate_percentile(p)?;
    if samples.is_empty() {
        return Err(BenchError::EmptySampleSet);
    }

    let pos = percentile_position(p, samples.len());
    sort(samples);
    Ok(samples[pos])
}

/// Overflow-checked running sum.
///
/// Additions wrap on overflow (the value a two's complement adder would
/// produce) and set a sticky flag. The first overflow is logged.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckedSum {
    total: u64,
    count: u64,
    overflowed: bool,
}

impl CheckedSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: u64) {
        let (total, overflow) = self.total.overflowing_add(value);
        if overflow && !self.overflowed {
            warn!(
                "sum overflowed after {} values, continuing with wrapped total",
                self.count
            );
        }
        self.total = total;
        self.count += 1;
        self.overflowed |= overflow;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Truncated mean, `None` when nothing was added.
    pub fn average(&self) -> Option<u64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total / self.count)
        }
    }
}

impl Extend<u64> for CheckedSum {
    fn extend<I: IntoIterator<Item = u64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<u64> for CheckedSum {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut sum = Self::new();
        sum.extend(iter);
        sum
    }
}

/// Truncated mean of a sample set together with its overflow diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Average {
    pub value: u64,
    pub overflowed: bool,
}

pub fn average(samples: &[u64]) -> Result<Average> {
    let sum: CheckedSum = samples.iter().copied().collect();
    let value = sum.average().ok_or(BenchError::EmptySampleSet)?;
    Ok(Average {
        value,
        overflowed: sum.overflowed(),
    })
}
