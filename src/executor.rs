//! # Per-Unit Execution
//!
//! The lifecycle primitive that gives every processing unit its own worker
//! thread. An executor knows how many units the machine offers and how to
//! place a thread on each of them; it knows nothing about sampling.
//!
//! ## Worker Contract
//!
//! A [`UnitWorker`] is driven the same way on every unit:
//!
//! 1. The executor starts one thread per unit (named `ktracer/<unit>`), pins
//!    it to its core when placement is known, and then reports the outcome of
//!    registration once through [`UnitWorker::registered`].
//! 2. Each thread calls [`UnitWorker::run`] for as long as
//!    [`UnitWorker::should_run`] returns `true`. A worker that has finished
//!    clears its own predicate so it is not invoked again.
//! 3. The executor joins every thread before returning.
//!
//! If a thread cannot be started, the threads that did start still see
//! `registered(Registration::Failed)` and are joined, and the registration
//! error is returned.

use crate::error::{BenchError, Result};
use core_affinity::CoreId;
use std::thread;
use tracing::{debug, info, warn};

/// Outcome of starting the workers, reported once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Every unit has a running worker.
    Complete,
    /// At least one worker could not be started.
    Failed,
}

/// Callback side of the per-unit contract.
pub trait UnitWorker: Sync {
    /// Whether the thread for `unit` should invoke [`UnitWorker::run`] again.
    fn should_run(&self, unit: usize) -> bool;

    /// One invocation on the thread dedicated to `unit`.
    fn run(&self, unit: usize);

    /// Called from the executor's thread once all workers were started, or
    /// once starting one of them failed.
    fn registered(&self, outcome: Registration);
}

/// Runs a [`UnitWorker`] once on each processing unit.
pub trait UnitExecutor: Send + Sync {
    /// Number of processing units (and therefore workers per run).
    fn units(&self) -> usize;

    /// Start one worker per unit, drive it to completion and join it.
    fn run_on_each_unit(&self, worker: &dyn UnitWorker) -> Result<()>;
}

/// One OS thread per CPU, optionally pinned with `core_affinity`.
#[derive(Debug, Clone)]
pub struct PerCpuExecutor {
    placement: Vec<Option<CoreId>>,
}

impl PerCpuExecutor {
    /// One unit per core reported by the OS, each pinned to its core.
    ///
    /// Falls back to one unpinned unit per logical CPU when the platform does not
    /// expose core ids.
    pub fn detect() -> Self {
        match core_affinity::get_core_ids() {
            Some(ids) if !ids.is_empty() => {
                info!("Using {} CPU cores with pinned workers", ids.len());
                Self {
                    placement: ids.into_iter().map(Some).collect(),
                }
            }
            _ => {
                let units = crate::utils::get_cpu_cores();
                info!(
                    "CPU affinity not supported, running {} unpinned workers",
                    units
                );
                Self::with_units(units)
            }
        }
    }

    /// A fixed number of unpinned units.
    pub fn with_units(units: usize) -> Self {
        Self {
            placement: vec![None; units],
        }
    }

    /// Drop core placement, keeping the unit count.
    pub fn unpinned(self) -> Self {
        Self::with_units(self.placement.len())
    }

    pub fn is_pinned(&self) -> bool {
        self.placement.iter().any(Option::is_some)
    }
}

impl UnitExecutor for PerCpuExecutor {
    fn units(&self) -> usize {
        self.placement.len()
    }

    fn run_on_each_unit(&self, worker: &dyn UnitWorker) -> Result<()> {
        let mut failure = None;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.placement.len());

            for (unit, core) in self.placement.iter().copied().enumerate() {
                let spawned = thread::Builder::new()
                    .name(format!("ktracer/{}", unit))
                    .spawn_scoped(scope, move || unit_thread(worker, unit, core));

                match spawned {
                    Ok(handle) => handles.push((unit, handle)),
                    Err(source) => {
                        failure = Some(BenchError::WorkerRegistration { unit, source });
                        break;
                    }
                }
            }

            worker.registered(if failure.is_none() {
                Registration::Complete
            } else {
                Registration::Failed
            });

            for (unit, handle) in handles {
                if handle.join().is_err() && failure.is_none() {
                    failure = Some(BenchError::WorkerFailed { unit });
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn unit_thread(worker: &dyn UnitWorker, unit: usize, core: Option<CoreId>) {
    if let Some(core) = core {
        if core_affinity::set_for_current(core) {
            debug!("Worker {} pinned to CPU core {}", unit, core.id);
        } else {
            warn!("Failed to pin worker {} to CPU core {}", unit, core.id);
        }
    }

    while worker.should_run(unit) {
        worker.run(unit);
    }
}
