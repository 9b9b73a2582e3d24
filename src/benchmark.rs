//! # Run Orchestrator
//!
//! [`BenchmarkRunner`] is the only entry point the control surface calls
//! into. It owns the probe, the per-unit executor, the buffer allocator and
//! the start gate, and drives one run at a time through the following steps:
//!
//! 1. **Validation**: the [`RunConfig`] is checked before anything is
//!    allocated, so a rejected configuration costs no allocator calls.
//! 2. **Allocation**: a fresh [`RunState`] is built holding one sample buffer
//!    per worker per kind and one retainer per kind. Every buffer is reserved
//!    up front; a single failure aborts the run before any worker starts.
//! 3. **Sampling**: the gate is re-armed, one [`Sampler`] is handed to the
//!    executor and the gate opens once every worker is registered.
//! 4. **Reduction**: once every worker is joined, local statistics and the
//!    retainers are reduced into a [`GlobalStats`].
//! 5. **Teardown**: the run state is dropped whether the run succeeded or
//!    not.
//!
//! Runs are serialised by a run-level lock; two callers triggering a run at
//! the same time get two complete, consecutive runs.
//!
//! [`BenchmarkRunner::percentile_run`] is a separate, single-threaded pass
//! that samples inline on the calling thread and shares no state with
//! [`BenchmarkRunner::run`].

use crate::error::{BenchError, Result};
use crate::executor::{PerCpuExecutor, UnitExecutor};
use crate::gate::StartGate;
use crate::metrics::{GlobalStats, LocalStats, RunConfig};
use crate::probe::{PerKind, Probe, ProbeKind};
use crate::reducer;
use crate::stats;
use crate::topk::TopK;
use crate::utils::format_duration;
use crate::worker::{Retainers, Sampler, WorkerSlot};
use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, info};

/// Source of every buffer a run needs.
///
/// Buffers are returned empty with room for at least `len` values and are
/// never grown afterwards.
pub trait BufferAllocator: Send + Sync {
    fn buffer(&self, what: &'static str, len: usize) -> Result<Vec<u64>>;
}

/// Allocates from the global heap, reporting failure instead of aborting.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn buffer(&self, what: &'static str, len: usize) -> Result<Vec<u64>> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| BenchError::AllocationFailure { what, len })?;
        Ok(buffer)
    }
}

/// Everything allocated for a single run.
struct RunState {
    slots: Vec<WorkerSlot>,
    retainers: Retainers,
}

impl RunState {
    fn allocate(
        allocator: &dyn BufferAllocator,
        units: usize,
        sample_count: usize,
        topk: usize,
    ) -> Result<Self> {
        let retainers = PerKind::try_from_fn(|_| {
            let storage = allocator.buffer("top-k retainer", topk)?;
            Ok::<_, BenchError>(Mutex::new(TopK::from_storage(topk, storage)?))
        })?;

        let mut slots = Vec::with_capacity(units);
        for unit in 0..units {
            let samples = PerKind::try_from_fn(|_| allocator.buffer("sample set", sample_count))?;
            slots.push(WorkerSlot::new(unit, samples));
        }

        Ok(Self { slots, retainers })
    }

    fn reduce(self) -> Result<GlobalStats> {
        let mut locals: Vec<PerKind<LocalStats>> = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            let mut state = slot.into_state();
            if let Some(err) = state.take_error() {
                return Err(err);
            }
            match state.stats() {
                Some(stats) => locals.push(*stats),
                None => return Err(BenchError::WorkerFailed { unit: state.unit }),
            }
        }

        let retainers = self.retainers.map(|_, retainer| retainer.into_inner());
        reducer::reduce(&locals, &retainers)
    }
}

/// Drives sampling runs over every processing unit.
pub struct BenchmarkRunner<P> {
    probe: P,
    executor: Box<dyn UnitExecutor>,
    allocator: Box<dyn BufferAllocator>,
    gate: StartGate,
    run_lock: Mutex<()>,
}

impl<P: Probe> BenchmarkRunner<P> {
    /// A runner with one pinned worker per detected CPU core.
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            executor: Box::new(PerCpuExecutor::detect()),
            allocator: Box::new(HeapAllocator),
            gate: StartGate::new(),
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_executor(mut self, executor: impl UnitExecutor + 'static) -> Self {
        self.executor = Box::new(executor);
        self
    }

    pub fn with_allocator(mut self, allocator: impl BufferAllocator + 'static) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    /// Number of workers every run starts.
    pub fn units(&self) -> usize {
        self.executor.units()
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Sample on every unit and reduce the results machine-wide.
    pub fn run(&self, config: &RunConfig) -> Result<GlobalStats> {
        config.validate()?;
        let _running = self.run_lock.lock();

        let units = self.executor.units();
        if units == 0 {
            return Err(BenchError::invalid_config("no processing units available"));
        }
        let topk = config.effective_topk();

        info!(
            "Starting sampling run: {} units, {} samples per kind, top-{} retained",
            units, config.sample_count, topk
        );
        let started = Instant::now();

        let state = RunState::allocate(self.allocator.as_ref(), units, config.sample_count, topk)?;
        debug!("Allocated run state for {} workers", units);

        self.gate.reset();
        let sampler = Sampler::new(
            &self.probe,
            &self.gate,
            &state.slots,
            &state.retainers,
            config.sample_count,
            topk,
        );
        self.executor.run_on_each_unit(&sampler)?;

        let global = state.reduce()?;
        info!(
            "Sampling run completed in {}",
            format_duration(started.elapsed())
        );
        Ok(global)
    }

    /// Sample each kind `sample_count` times on the calling thread and return
    /// the `p`-th percentile per kind.
    pub fn percentile_run(&self, p: u32, config: &RunConfig) -> Result<PerKind<u64>> {
        stats::validate_percentile(p)?;
        config.validate()?;

        let mut samples = PerKind::try_from_fn(|_| {
            self.allocator.buffer("percentile sample set", config.sample_count)
        })?;

        for _ in 0..config.sample_count {
            for kind in ProbeKind::ALL {
                samples[kind].push(self.probe.invoke(kind));
            }
        }

        let result = PerKind::try_from_fn(|kind| stats::percentile(p, &mut samples[kind]))?;
        info!(
            "p{}: irq={}ns preempt={}ns over {} samples",
            p, result.irq, result.preempt, config.sample_count
        );
        Ok(result)
    }
}
