use anyhow::Result;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracer_bench::{
    benchmark::BufferAllocator,
    executor::{Registration, UnitWorker},
    BenchError, BenchmarkRunner, FnProbe, HeapAllocator, PerCpuExecutor, Probe, ProbeKind,
    RunConfig, UnitExecutor,
};

const PATTERN: [u64; 5] = [1, 5, 3, 2, 4];

thread_local! {
    static CURSOR: Cell<[usize; 2]> = const { Cell::new([0, 0]) };
}

/// Every worker thread sees `1 5 3 2 4` repeating for `irq`, and the same
/// pattern scaled by 100 for `preempt`.
fn cycling(kind: ProbeKind) -> u64 {
    CURSOR.with(|cursor| {
        let mut next = cursor.get();
        let slot = match kind {
            ProbeKind::Irq => 0,
            ProbeKind::Preempt => 1,
        };
        let value = PATTERN[next[slot] % PATTERN.len()];
        next[slot] += 1;
        cursor.set(next);
        match kind {
            ProbeKind::Irq => value,
            ProbeKind::Preempt => value * 100,
        }
    })
}

type CyclingRunner = BenchmarkRunner<FnProbe<fn(ProbeKind) -> u64>>;

fn runner(units: usize) -> CyclingRunner {
    BenchmarkRunner::new(FnProbe(cycling as fn(ProbeKind) -> u64))
        .with_executor(PerCpuExecutor::with_units(units))
}

/// Four workers sampling `1 5 3 2 4` reduce to median 3, average 3, max 5,
/// and the pooled top-2 retainer ends up holding `{5, 5}`.
#[test]
fn four_workers_reduce_to_known_statistics() -> Result<()> {
    let global = runner(4).run(&RunConfig::new(5, 2))?;

    assert_eq!(global.units, 4);
    let irq = global.kind(ProbeKind::Irq);
    assert_eq!(irq.median, Some(3));
    assert_eq!(irq.average, Some(3));
    assert_eq!(irq.max, Some(5));
    assert_eq!(irq.max_avg, Some(5));

    let preempt = global.kind(ProbeKind::Preempt);
    assert_eq!(preempt.median, Some(300));
    assert_eq!(preempt.max_avg, Some(500));
    assert!(!global.overflowed());
    Ok(())
}

/// Hands out 1, 2, 3, ... per kind across all workers, so no two samples of
/// a kind are equal.
#[derive(Default)]
struct Counting {
    irq: AtomicU64,
    preempt: AtomicU64,
}

impl Probe for Counting {
    fn invoke(&self, kind: ProbeKind) -> u64 {
        let counter = match kind {
            ProbeKind::Irq => &self.irq,
            ProbeKind::Preempt => &self.preempt,
        };
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Four workers drawing 50 distinct values each pool `1..=200`; the top-10
/// retainer must hold `191..=200` whichever worker drew them.
#[test]
fn distinct_samples_pool_into_global_topk() -> Result<()> {
    let global = BenchmarkRunner::new(Counting::default())
        .with_executor(PerCpuExecutor::with_units(4))
        .run(&RunConfig::new(50, 10))?;

    for kind in ProbeKind::ALL {
        let stats = global.kind(kind);
        assert_eq!(stats.max, Some(200), "{:?}", kind);
        assert_eq!(stats.max_avg, Some(195), "{:?}", kind);
    }
    assert!(!global.overflowed());
    Ok(())
}

/// Identical probes and configuration give identical results run after run.
#[test]
fn repeated_runs_are_identical() -> Result<()> {
    let runner = runner(4);
    let config = RunConfig::new(25, 7);

    let first = runner.run(&config)?;
    for _ in 0..3 {
        assert_eq!(runner.run(&config)?, first);
    }
    Ok(())
}

/// Concurrent callers are serialised and each gets a complete run.
#[test]
fn concurrent_runs_are_serialised() -> Result<()> {
    let runner = runner(3);
    let config = RunConfig::new(10, 3);
    let expected = runner.run(&config)?;

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| runner.run(&config))).collect();
        for handle in handles {
            let global = handle.join().expect("caller thread panicked")?;
            assert_eq!(global, expected);
        }
        Ok::<_, BenchError>(())
    })?;
    Ok(())
}

#[derive(Clone, Default)]
struct CountingAllocator(Arc<AtomicUsize>);

impl BufferAllocator for CountingAllocator {
    fn buffer(&self, what: &'static str, len: usize) -> tracer_bench::error::Result<Vec<u64>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        HeapAllocator.buffer(what, len)
    }
}

/// A zero sample count is rejected before the allocator is ever called.
#[test]
fn zero_samples_rejected_before_allocation() {
    let allocator = CountingAllocator::default();
    let calls = Arc::clone(&allocator.0);
    let runner = runner(4).with_allocator(allocator);

    let err = runner.run(&RunConfig::new(0, 2)).unwrap_err();
    assert!(matches!(err, BenchError::InvalidConfig(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // one retainer per kind plus one buffer per worker per kind
    runner.run(&RunConfig::new(5, 2)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2 + 4 * 2);
}

/// Starts one worker, then reports that the second could not be started.
struct HalfStartedExecutor;

impl UnitExecutor for HalfStartedExecutor {
    fn units(&self) -> usize {
        2
    }

    fn run_on_each_unit(&self, worker: &dyn UnitWorker) -> tracer_bench::error::Result<()> {
        std::thread::scope(|s| {
            let started = s.spawn(|| {
                while worker.should_run(0) {
                    worker.run(0);
                }
            });
            worker.registered(Registration::Failed);
            started.join().expect("worker panicked");
        });
        Err(BenchError::WorkerRegistration {
            unit: 1,
            source: std::io::Error::new(std::io::ErrorKind::WouldBlock, "thread limit reached"),
        })
    }
}

/// Workers started before a registration failure are released and joined,
/// and the failure reaches the caller.
#[test]
fn registration_failure_releases_started_workers() {
    let probed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&probed);
    let runner = BenchmarkRunner::new(FnProbe(move |_: ProbeKind| {
        counter.fetch_add(1, Ordering::SeqCst);
        1u64
    }))
    .with_executor(HalfStartedExecutor);

    let err = runner.run(&RunConfig::new(5, 2)).unwrap_err();
    assert!(matches!(err, BenchError::WorkerRegistration { unit: 1, .. }));
    assert_eq!(probed.load(Ordering::SeqCst), 0);
}

/// The percentile pass uses the literal nearest-rank position.
#[test]
fn percentile_run_uses_nearest_rank() -> Result<()> {
    let runner = runner(1);
    let config = RunConfig::new(5, 2);

    // sorted 1 2 3 4 5: p100 clamps to index 4, p1 is floor(5 / 100) = 0
    let p100 = runner.percentile_run(100, &config)?;
    assert_eq!(p100[ProbeKind::Irq], 5);
    assert_eq!(p100[ProbeKind::Preempt], 500);

    let p1 = runner.percentile_run(1, &config)?;
    assert_eq!(p1[ProbeKind::Irq], 1);

    let p80 = runner.percentile_run(80, &config)?;
    assert_eq!(p80[ProbeKind::Irq], 5);
    Ok(())
}

#[test]
fn detected_executor_runs_on_every_core() -> Result<()> {
    let executor = PerCpuExecutor::detect();
    let units = executor.units();
    let global = BenchmarkRunner::new(FnProbe(|_: ProbeKind| 7u64))
        .with_executor(executor)
        .run(&RunConfig::new(100, 10))?;

    assert_eq!(global.units, units);
    assert_eq!(global.kind(ProbeKind::Irq).median, Some(7));
    assert_eq!(global.kind(ProbeKind::Preempt).max_avg, Some(7));
    Ok(())
}
