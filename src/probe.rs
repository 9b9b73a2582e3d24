//! # Probe Operations
//!
//! A probe is the short, repeatable action whose latency is measured. The
//! engine only needs "time one invocation and report the elapsed
//! nanoseconds"; what the action does is up to the [`Probe`] implementation.
//!
//! Two probe categories are measured side by side, [`ProbeKind::Irq`] and
//! [`ProbeKind::Preempt`]. Everything computed per category is stored in a
//! [`PerKind`] so that adding a category is a change in one place.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
#[cfg(unix)]
use tracing::warn;

/// Named probe categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Masking and unmasking asynchronous interruptions.
    Irq,
    /// Giving up and regaining the processor.
    Preempt,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 2] = [ProbeKind::Irq, ProbeKind::Preempt];

    /// Short name used in result paths (`irq/median`).
    pub fn name(&self) -> &'static str {
        match self {
            ProbeKind::Irq => "irq",
            ProbeKind::Preempt => "preempt",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per probe kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerKind<T> {
    pub irq: T,
    pub preempt: T,
}

impl<T> PerKind<T> {
    pub fn new(irq: T, preempt: T) -> Self {
        Self { irq, preempt }
    }

    /// Build by calling `f` once per kind, in [`ProbeKind::ALL`] order.
    pub fn from_fn(mut f: impl FnMut(ProbeKind) -> T) -> Self {
        let irq = f(ProbeKind::Irq);
        let preempt = f(ProbeKind::Preempt);
        Self { irq, preempt }
    }

    /// Like [`PerKind::from_fn`] but stops at the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(ProbeKind) -> Result<T, E>) -> Result<Self, E> {
        let irq = f(ProbeKind::Irq)?;
        let preempt = f(ProbeKind::Preempt)?;
        Ok(Self { irq, preempt })
    }

    pub fn map<U>(self, mut f: impl FnMut(ProbeKind, T) -> U) -> PerKind<U> {
        PerKind {
            irq: f(ProbeKind::Irq, self.irq),
            preempt: f(ProbeKind::Preempt, self.preempt),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProbeKind, &T)> {
        [(ProbeKind::Irq, &self.irq), (ProbeKind::Preempt, &self.preempt)].into_iter()
    }
}

impl<T> Index<ProbeKind> for PerKind<T> {
    type Output = T;

    fn index(&self, kind: ProbeKind) -> &T {
        match kind {
            ProbeKind::Irq => &self.irq,
            ProbeKind::Preempt => &self.preempt,
        }
    }
}

impl<T> IndexMut<ProbeKind> for PerKind<T> {
    fn index_mut(&mut self, kind: ProbeKind) -> &mut T {
        match kind {
            ProbeKind::Irq => &mut self.irq,
            ProbeKind::Preempt => &mut self.preempt,
        }
    }
}

/// Time one invocation of a probe.
///
/// Implementations are called concurrently from every worker, so they must
/// be `Sync` and must not rely on per-call exclusive state.
pub trait Probe: Sync {
    /// Run the probe of the given kind once and return the elapsed time in
    /// nanoseconds.
    fn invoke(&self, kind: ProbeKind) -> u64;
}

impl<P: Probe + ?Sized> Probe for &P {
    fn invoke(&self, kind: ProbeKind) -> u64 {
        (**self).invoke(kind)
    }
}

impl<P: Probe + ?Sized> Probe for Box<P> {
    fn invoke(&self, kind: ProbeKind) -> u64 {
        (**self).invoke(kind)
    }
}

/// Adapts a closure into a [`Probe`].
pub struct FnProbe<F>(pub F);

impl<F> Probe for FnProbe<F>
where
    F: Fn(ProbeKind) -> u64 + Sync,
{
    fn invoke(&self, kind: ProbeKind) -> u64 {
        (self.0)(kind)
    }
}

/// User-space probes timed against `CLOCK_MONOTONIC`.
///
/// - `Irq` blocks every signal for the calling thread and restores the
///   previous mask, the closest user-space counterpart of disabling and
///   re-enabling local interrupts.
/// - `Preempt` yields the processor with `sched_yield`.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

#[cfg(unix)]
impl HostProbe {
    fn now_ns() -> u64 {
        use nix::time::{clock_gettime, ClockId};

        // CLOCK_MONOTONIC is always available on supported targets.
        match clock_gettime(ClockId::CLOCK_MONOTONIC) {
            Ok(ts) => (ts.tv_sec() as u64)
                .wrapping_mul(1_000_000_000)
                .wrapping_add(ts.tv_nsec() as u64),
            Err(_) => 0,
        }
    }

    fn mask_signals() {
        use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow};

        let mut previous = SigSet::empty();
        let all = SigSet::all();
        if pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&all), Some(&mut previous)).is_ok() {
            if let Err(err) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&previous), None) {
                warn!("Failed to restore the signal mask, signals stay blocked: {}", err);
            }
        }
    }
}

#[cfg(unix)]
impl Probe for HostProbe {
    fn invoke(&self, kind: ProbeKind) -> u64 {
        let start = Self::now_ns();
        match kind {
            ProbeKind::Irq => Self::mask_signals(),
            ProbeKind::Preempt => std::thread::yield_now(),
        }
        Self::now_ns().saturating_sub(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ProbeKind::ALL {
            assert_eq!(ProbeKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ProbeKind::from_name("softirq"), None);
        assert_eq!(ProbeKind::Preempt.to_string(), "preempt");
    }

    #[test]
    fn test_per_kind_indexing() {
        let mut values = PerKind::new(1, 2);
        values[ProbeKind::Preempt] += 40;
        assert_eq!(values[ProbeKind::Irq], 1);
        assert_eq!(values[ProbeKind::Preempt], 42);

        let doubled = values.map(|_, v| v * 2);
        assert_eq!(doubled, PerKind::new(2, 84));

        let names: Vec<_> = values.iter().map(|(kind, _)| kind.name()).collect();
        assert_eq!(names, vec!["irq", "preempt"]);
    }

    #[test]
    fn test_try_from_fn_stops_on_error() {
        let mut calls = 0;
        let result: Result<PerKind<u32>, &str> = PerKind::try_from_fn(|kind| {
            calls += 1;
            match kind {
                ProbeKind::Irq => Err("boom"),
                ProbeKind::Preempt => Ok(1),
            }
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_fn_probe_dispatches_kind() {
        let probe = FnProbe(|kind: ProbeKind| match kind {
            ProbeKind::Irq => 10u64,
            ProbeKind::Preempt => 20,
        });
        assert_eq!(probe.invoke(ProbeKind::Irq), 10);
        assert_eq!((&probe).invoke(ProbeKind::Preempt), 20);
    }

    #[cfg(unix)]
    #[test]
    fn test_host_probe_measures_something_finite() {
        let probe = HostProbe;
        for kind in ProbeKind::ALL {
            // a single invocation of either probe finishes well under a second
            assert!(probe.invoke(kind) < 1_000_000_000);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_irq_probe_restores_signal_mask() {
        use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};

        let mut before = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_SETMASK, None, Some(&mut before)).unwrap();

        HostProbe.invoke(ProbeKind::Irq);

        let mut after = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_SETMASK, None, Some(&mut after)).unwrap();
        for signal in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGUSR1, Signal::SIGALRM] {
            assert_eq!(before.contains(signal), after.contains(signal), "{:?}", signal);
        }
    }
}
