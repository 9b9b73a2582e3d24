//! # Per-Worker Sampler
//!
//! Each worker walks the same state machine once per run:
//!
//! ```text
//! Idle --gate opens--> Sampling --> LocalReduction --> Contributing --> Done
//!   \--gate cancelled------------------------------------------------->/
//! ```
//!
//! - **Idle**: parked at the [`StartGate`].
//! - **Sampling**: `N` probe invocations per kind into the worker's private,
//!   pre-allocated buffers. Kinds are interleaved per iteration.
//! - **LocalReduction**: median, average and max per kind. Computing the
//!   median sorts the buffer ascending.
//! - **Contributing**: the worker's own `K` largest samples (the tail of the
//!   sorted buffer) go into the shared retainer of each kind, one lock
//!   acquisition per kind.
//! - **Done**: the worker clears its run predicate so the executor does not
//!   invoke it again, and releases its sample buffers.
//!
//! Worker state lives in a [`WorkerSlot`] per unit, owned by the run and
//! handed to the worker by unit id. Only the worker itself touches its slot
//! while the run is in flight.

use crate::error::{BenchError, Result};
use crate::executor::{Registration, UnitWorker};
use crate::gate::{GateSignal, StartGate};
use crate::metrics::LocalStats;
use crate::probe::{PerKind, Probe, ProbeKind};
use crate::stats;
use crate::topk::TopK;
use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// Shared retainers, one per probe kind.
pub type Retainers = PerKind<Mutex<TopK<u64>>>;

/// Phase of one worker within the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerPhase {
    Idle,
    Sampling,
    LocalReduction,
    Contributing,
    Done,
}

/// Private state of the worker bound to one unit.
#[derive(Debug)]
pub struct WorkerState {
    pub unit: usize,
    pub phase: SamplerPhase,
    samples: PerKind<Vec<u64>>,
    stats: Option<PerKind<LocalStats>>,
    error: Option<BenchError>,
}

impl WorkerState {
    /// Local statistics, available once the worker reached `Done` after
    /// sampling.
    pub fn stats(&self) -> Option<&PerKind<LocalStats>> {
        self.stats.as_ref()
    }

    pub fn take_error(&mut self) -> Option<BenchError> {
        self.error.take()
    }
}

/// A worker's state plus its run predicate, padded to its own cache line.
#[derive(Debug)]
pub struct WorkerSlot {
    inner: CachePadded<SlotInner>,
}

#[derive(Debug)]
struct SlotInner {
    should_run: AtomicBool,
    state: Mutex<WorkerState>,
}

impl WorkerSlot {
    /// `samples` must be empty buffers with room for the configured sample
    /// count; sampling never reallocates them.
    pub fn new(unit: usize, samples: PerKind<Vec<u64>>) -> Self {
        Self {
            inner: CachePadded::new(SlotInner {
                should_run: AtomicBool::new(true),
                state: Mutex::new(WorkerState {
                    unit,
                    phase: SamplerPhase::Idle,
                    samples,
                    stats: None,
                    error: None,
                }),
            }),
        }
    }

    pub fn should_run(&self) -> bool {
        self.inner.should_run.load(Ordering::Acquire)
    }

    pub fn into_state(self) -> WorkerState {
        CachePadded::into_inner(self.inner).state.into_inner()
    }

    #[cfg(test)]
    fn phase(&self) -> SamplerPhase {
        self.inner.state.lock().phase
    }
}

/// Median, average and max of one sample set. Sorts `samples` ascending.
pub fn local_stats(samples: &mut [u64]) -> Result<LocalStats> {
    let avg = stats::average(samples)?;
    let mm = stats::median_and_max(samples)?;
    Ok(LocalStats {
        median: mm.median,
        average: avg.value,
        max: mm.max,
        overflowed: avg.overflowed,
    })
}

/// The `k` largest values of an ascending-sorted sample set.
pub fn local_top(sorted: &[u64], k: usize) -> &[u64] {
    &sorted[sorted.len() - k.min(sorted.len())..]
}

/// The sampling callback run on every unit.
pub struct Sampler<'run, P> {
    probe: &'run P,
    gate: &'run StartGate,
    slots: &'run [WorkerSlot],
    retainers: &'run Retainers,
    sample_count: usize,
    topk: usize,
}

impl<'run, P: Probe> Sampler<'run, P> {
    pub fn new(
        probe: &'run P,
        gate: &'run StartGate,
        slots: &'run [WorkerSlot],
        retainers: &'run Retainers,
        sample_count: usize,
        topk: usize,
    ) -> Self {
        Self {
            probe,
            gate,
            slots,
            retainers,
            sample_count,
            topk,
        }
    }

    fn collect(&self, samples: &mut PerKind<Vec<u64>>) {
        for _ in 0..self.sample_count {
            for kind in ProbeKind::ALL {
                samples[kind].push(self.probe.invoke(kind));
            }
        }
    }

    fn reduce_and_contribute(&self, state: &mut WorkerState) -> Result<()> {
        state.phase = SamplerPhase::LocalReduction;
        let samples = &mut state.samples;
        let local = PerKind::try_from_fn(|kind| local_stats(&mut samples[kind]))?;

        for (kind, stats) in local.iter() {
            debug!(
                "Worker {} {}: median={} average={} max={}",
                state.unit, kind, stats.median, stats.average, stats.max
            );
        }

        state.phase = SamplerPhase::Contributing;
        for kind in ProbeKind::ALL {
            let top = local_top(&state.samples[kind], self.topk);
            self.retainers[kind].lock().contribute(top.iter().copied());
        }

        state.stats = Some(local);
        Ok(())
    }

    fn finish(&self, slot: &SlotInner, state: &mut WorkerState) {
        state.phase = SamplerPhase::Done;
        state.samples = PerKind::default();
        slot.should_run.store(false, Ordering::Release);
    }
}

impl<'run, P: Probe> UnitWorker for Sampler<'run, P> {
    fn should_run(&self, unit: usize) -> bool {
        self.slots.get(unit).map_or(false, WorkerSlot::should_run)
    }

    fn run(&self, unit: usize) {
        let Some(slot) = self.slots.get(unit) else {
            return;
        };
        let slot = &*slot.inner;
        let mut state = slot.state.lock();

        trace!("Worker {} waiting at the start gate", unit);
        state.phase = SamplerPhase::Idle;
        if self.gate.wait() == GateSignal::Abort {
            debug!("Worker {} released without sampling", unit);
            self.finish(slot, &mut state);
            return;
        }

        state.phase = SamplerPhase::Sampling;
        self.collect(&mut state.samples);

        if let Err(err) = self.reduce_and_contribute(&mut state) {
            state.error = Some(err);
        }
        self.finish(slot, &mut state);
    }

    fn registered(&self, outcome: Registration) {
        match outcome {
            Registration::Complete => self.gate.open(),
            Registration::Failed => self.gate.cancel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FnProbe;

    fn buffers(n: usize) -> PerKind<Vec<u64>> {
        PerKind::from_fn(|_| Vec::with_capacity(n))
    }

    fn retainers(k: usize) -> Retainers {
        PerKind::from_fn(|_| Mutex::new(TopK::try_new(k).unwrap()))
    }

    #[test]
    fn test_local_stats() {
        let mut samples = vec![1, 5, 3, 2, 4];
        let stats = local_stats(&mut samples).unwrap();
        assert_eq!(
            stats,
            LocalStats {
                median: 3,
                average: 3,
                max: 5,
                overflowed: false
            }
        );
        assert_eq!(local_top(&samples, 2), &[4, 5]);
    }

    #[test]
    fn test_local_top_caps_at_length() {
        assert_eq!(local_top(&[1, 2], 5), &[1, 2]);
        assert!(local_top(&[1, 2], 0).is_empty());
    }

    #[test]
    fn test_single_worker_walks_to_done() {
        let probe = FnProbe(|kind: ProbeKind| match kind {
            ProbeKind::Irq => 7u64,
            ProbeKind::Preempt => 11,
        });
        let gate = StartGate::new();
        let slots = vec![WorkerSlot::new(0, buffers(4))];
        let shared = retainers(2);
        let sampler = Sampler::new(&probe, &gate, &slots, &shared, 4, 2);

        assert_eq!(slots[0].phase(), SamplerPhase::Idle);
        sampler.registered(Registration::Complete);
        assert!(sampler.should_run(0));
        sampler.run(0);
        assert!(!sampler.should_run(0));
        assert_eq!(slots[0].phase(), SamplerPhase::Done);

        let state = slots.into_iter().next().unwrap().into_state();
        let stats = state.stats().unwrap();
        assert_eq!(stats.irq.median, 7);
        assert_eq!(stats.preempt.max, 11);
        assert!(state.samples.irq.is_empty());

        assert_eq!(shared.irq.lock().len(), 2);
        assert_eq!(shared.preempt.lock().average().unwrap().value, 11);
    }

    #[test]
    fn test_cancelled_gate_skips_sampling() {
        let probe = FnProbe(|_: ProbeKind| -> u64 { panic!("probe must not run") });
        let gate = StartGate::new();
        let slots = vec![WorkerSlot::new(0, buffers(4))];
        let shared = retainers(2);
        let sampler = Sampler::new(&probe, &gate, &slots, &shared, 4, 2);

        sampler.registered(Registration::Failed);
        sampler.run(0);

        assert!(!sampler.should_run(0));
        assert!(shared.irq.lock().is_empty());
        let state = slots.into_iter().next().unwrap().into_state();
        assert!(state.stats().is_none());
    }

    #[test]
    fn test_unknown_unit_is_never_run() {
        let probe = FnProbe(|_: ProbeKind| 1u64);
        let gate = StartGate::new();
        let slots = vec![WorkerSlot::new(0, buffers(1))];
        let shared = retainers(1);
        let sampler = Sampler::new(&probe, &gate, &slots, &shared, 1, 1);
        assert!(!sampler.should_run(5));
    }
}
