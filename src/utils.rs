//! # Utility Functions and Helper Module
//!
//! Helpers shared by the binary and the result writer: human-readable
//! duration formatting, command-line parameter validation, system detection
//! and console table output.
//!
//! ## Key Functionality Categories
//!
//! - **Formatting**: Human-readable display of nanosecond durations
//! - **Validation**: Front-end checks with clear error messages
//! - **System Information**: CPU detection
//! - **Display Helpers**: Table formatting and progress indicators
//!
//! ## Usage Examples
//!
//! ```rust
//! use tracer_bench::utils::*;
//! use std::time::Duration;
//!
//! let duration_str = format_duration(Duration::from_micros(1500));
//! assert_eq!(duration_str, "1.50ms");
//!
//! # fn main() -> anyhow::Result<()> {
//! validate_sample_count(10_000)?;
//! # Ok(())
//! # }
//! ```

use anyhow::{bail, Result};
use std::time::Duration;
use uuid::Uuid;

/// Generate a unique identifier for an invocation
///
/// Every run of one invocation carries the same identifier in the result
/// document, so repeated runs can be grouped after the fact.
///
/// ## Returns
/// String representation of a UUID v4 (e.g., "550e8400-e29b-41d4-a716-446655440000")
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Convert nanoseconds to a human-readable duration string
///
/// Convenience wrapper around [`format_duration`] for the raw `u64`
/// nanosecond values the engine reports.
///
/// ## Examples
///
/// ```rust
/// # use tracer_bench::utils::format_duration_ns;
/// assert_eq!(format_duration_ns(500), "500ns");
/// assert_eq!(format_duration_ns(1500), "1.50μs");
/// assert_eq!(format_duration_ns(1500000), "1.50ms");
/// ```
pub fn format_duration_ns(ns: u64) -> String {
    format_duration(Duration::from_nanos(ns))
}

/// Format a duration in a human-readable way
///
/// Converts a Duration to a human-readable string, automatically selecting
/// the most appropriate unit based on the magnitude.
///
/// ## Unit Selection Logic
///
/// - **Nanoseconds**: < 1,000 ns (e.g., "500ns")
/// - **Microseconds**: < 1,000,000 ns (e.g., "1.50μs")
/// - **Milliseconds**: < 1,000,000,000 ns (e.g., "25.75ms")
/// - **Seconds**: < 60 seconds (e.g., "5.25s")
/// - **Minutes and Hours**: For longer durations (e.g., "5m 30s", "2h 15m 30s")
///
/// ## Examples
///
/// ```rust
/// # use tracer_bench::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_nanos(1250)), "1.25μs");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format an optional statistic, using `-` when it was not computed.
pub fn format_stat(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), format_duration_ns)
}

/// Validate the number of samples per kind
///
/// ## Validation Rules
///
/// - **Minimum**: 1 sample (statistics over zero samples are undefined)
/// - **Maximum**: 100,000,000 samples per kind per worker, which keeps the
///   per-worker buffers under 1.6 GB
pub fn validate_sample_count(sample_count: usize) -> Result<()> {
    if sample_count == 0 {
        bail!("Number of samples must be greater than 0");
    }

    if sample_count > 100_000_000 {
        bail!(
            "Number of samples too large: {} (maximum 100,000,000)",
            sample_count
        );
    }

    Ok(())
}

/// Validate a requested unit count
///
/// More units than CPU cores is allowed, since the workers are then simply
/// time-shared, but zero units cannot produce any statistics.
pub fn validate_units(units: usize) -> Result<()> {
    if units == 0 {
        bail!("Number of units must be greater than 0");
    }

    if units > 4096 {
        bail!("Number of units too large: {} (maximum 4096)", units);
    }

    Ok(())
}

/// Get the number of available CPU cores
///
/// Used by `PerCpuExecutor::detect` as the unit count when the platform does
/// not expose core ids for pinning, and recorded as `cpu_cores` in the system
/// information of result documents.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

/// Format a table row with column alignment and separators.
pub fn format_table_row(columns: &[&str], widths: &[usize]) -> String {
    let mut row = String::from("|");
    for (i, column) in columns.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(10);
        row.push_str(&format!(" {:width$} |", column, width = width));
    }
    row
}

/// Format a horizontal table separator matching `widths`.
pub fn format_table_separator(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for &width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line
}

/// Print a formatted table row
///
/// ## Examples
///
/// ```rust
/// # use tracer_bench::utils::{print_table_row, print_table_separator};
/// let widths = [8, 10, 10];
/// print_table_separator(&widths);
/// print_table_row(&["Kind", "Median", "Max"], &widths);
/// print_table_separator(&widths);
/// print_table_row(&["irq", "42ns", "1.20μs"], &widths);
/// print_table_separator(&widths);
/// ```
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    println!("{}", format_table_row(columns, widths));
}

/// Print a table separator
///
/// ## Visual Example
///
/// ```text
/// +----------+------------+------------+
/// | Kind     | Median     | Max        |
/// +----------+------------+------------+
/// | irq      | 42ns       | 1.20μs     |
/// +----------+------------+------------+
/// ```
pub fn print_table_separator(widths: &[usize]) {
    println!("{}", format_table_separator(widths));
}

/// Create a progress bar-like indicator
///
/// ## Edge Cases
///
/// - **Zero Total**: Returns all filled blocks to avoid division by zero
/// - **Overflow**: Caps progress at 100% even if current > total
///
/// ## Examples
///
/// ```rust
/// # use tracer_bench::utils::create_progress_indicator;
/// assert_eq!(create_progress_indicator(0, 100, 10), "░░░░░░░░░░");
/// assert_eq!(create_progress_indicator(50, 100, 10), "█████░░░░░");
/// assert_eq!(create_progress_indicator(100, 100, 10), "██████████");
/// ```
pub fn create_progress_indicator(current: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return "█".repeat(width);
    }

    let progress = (current as f64 / total as f64).min(1.0);
    let filled = ((progress * width as f64) as usize).min(width);
    let empty = width - filled;

    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}
