//! # Start Gate
//!
//! A re-armable broadcast latch. Workers park in [`StartGate::wait`] until
//! the orchestrator calls [`StartGate::open`]; from then on every waiter,
//! including ones that arrive late, passes straight through. Opening does not
//! consume anything, so a single `open` releases any number of workers at
//! once and keeps their sampling start times close together.
//!
//! The gate can also be cancelled, which releases waiters with
//! [`GateSignal::Abort`] so that workers started before a failed
//! registration can exit without sampling.
//!
//! [`StartGate::reset`] closes the gate for the next run. It must only be
//! called once every worker of the previous run has finished.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Closed,
    Open,
    Cancelled,
}

/// What a worker should do once released from the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    /// Start sampling.
    Go,
    /// The run was abandoned before it started.
    Abort,
}

#[derive(Debug)]
pub struct StartGate {
    state: Mutex<GateState>,
    released: Condvar,
}

impl Default for StartGate {
    fn default() -> Self {
        Self::new()
    }
}

impl StartGate {
    /// Create a closed gate.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Closed),
            released: Condvar::new(),
        }
    }

    /// Release every current and future waiter with [`GateSignal::Go`].
    pub fn open(&self) {
        self.set(GateState::Open);
    }

    /// Release every current and future waiter with [`GateSignal::Abort`].
    pub fn cancel(&self) {
        self.set(GateState::Cancelled);
    }

    /// Close the gate again.
    pub fn reset(&self) {
        *self.state.lock() = GateState::Closed;
    }

    pub fn is_open(&self) -> bool {
        *self.state.lock() == GateState::Open
    }

    /// Block until the gate is opened or cancelled.
    pub fn wait(&self) -> GateSignal {
        let mut state = self.state.lock();
        while *state == GateState::Closed {
            self.released.wait(&mut state);
        }
        match *state {
            GateState::Open => GateSignal::Go,
            _ => GateSignal::Abort,
        }
    }

    fn set(&self, next: GateState) {
        let mut state = self.state.lock();
        *state = next;
        self.released.notify_all();
    }
}
