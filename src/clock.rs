//! Host scheduling collaborators.
//!
//! The engine consumes exactly two environment services: a recurring tick
//! and a run-soon callback slot. [`ManualClock`] drives both
//! deterministically from test or embedder code; [`LocalClock`] paces them
//! with channel tickers on the current thread, the cooperative
//! single-threaded model the engine assumes throughout.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossbeam_channel::{tick, Receiver, Select};

/// Recurring callback registered through [`Clock::schedule_recurring`].
pub type TickCallback = Box<dyn FnMut()>;

/// One-shot callback registered through [`Clock::schedule_soon`].
pub type SoonCallback = Box<dyn FnOnce()>;

/// Cancels its recurring schedule when dropped.
#[derive(Debug)]
pub struct ScheduleHandle {
    active: Rc<Cell<bool>>,
}

impl ScheduleHandle {
    /// Creates a live handle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Rc::new(Cell::new(true)),
        }
    }

    /// The shared liveness flag a clock implementation should poll before
    /// firing the associated callback.
    #[must_use]
    pub fn flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.active)
    }

    /// True until cancelled or dropped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Cancels the schedule without waiting for drop.
    pub fn cancel(&self) {
        self.active.set(false);
    }
}

impl Default for ScheduleHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

/// Environment scheduling services consumed by the engine.
///
/// `schedule_soon` callbacks run after the current unit of work completes,
/// before the next recurring tick; they are the asynchronous boundary
/// between a tick's diff/route phase and queue delivery.
pub trait Clock {
    /// Registers a callback fired roughly every `period` until the returned
    /// handle is dropped or cancelled.
    fn schedule_recurring(&self, period: Duration, callback: TickCallback) -> ScheduleHandle;

    /// Registers a callback to run soon, after the current unit of work.
    fn schedule_soon(&self, callback: SoonCallback);
}

struct ManualEntry {
    callback: TickCallback,
    active: Rc<Cell<bool>>,
}

/// Deterministic clock for tests and embedders that drive ticks themselves.
///
/// Nothing fires on its own: call [`fire_tick`] to run every active
/// recurring callback once and [`drain_soon`] to run queued soon-callbacks,
/// or [`advance`] for a full tick-then-deliver cycle.
///
/// [`fire_tick`]: ManualClock::fire_tick
/// [`drain_soon`]: ManualClock::drain_soon
/// [`advance`]: ManualClock::advance
#[derive(Default)]
pub struct ManualClock {
    state: RefCell<ManualState>,
}

#[derive(Default)]
struct ManualState {
    recurring: Vec<ManualEntry>,
    soon: VecDeque<SoonCallback>,
}

impl ManualClock {
    /// Creates a clock ready to be shared with an engine.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Fires every active recurring callback once, in registration order.
    pub fn fire_tick(&self) {
        // Take the entries out so callbacks may register new schedules.
        let mut entries = mem::take(&mut self.state.borrow_mut().recurring);
        entries.retain(|entry| entry.active.get());
        for entry in &mut entries {
            if entry.active.get() {
                (entry.callback)();
            }
        }
        let mut state = self.state.borrow_mut();
        let added = mem::take(&mut state.recurring);
        entries.extend(added);
        entries.retain(|entry| entry.active.get());
        state.recurring = entries;
    }

    /// Runs queued soon-callbacks until none remain, including ones queued
    /// by the callbacks themselves.
    pub fn drain_soon(&self) {
        loop {
            let next = self.state.borrow_mut().soon.pop_front();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    /// One full cycle: a tick followed by the callbacks it queued.
    pub fn advance(&self) {
        self.fire_tick();
        self.drain_soon();
    }

    /// Number of live recurring schedules.
    #[must_use]
    pub fn active_schedules(&self) -> usize {
        self.state
            .borrow()
            .recurring
            .iter()
            .filter(|entry| entry.active.get())
            .count()
    }

    /// Number of queued soon-callbacks.
    #[must_use]
    pub fn pending_soon(&self) -> usize {
        self.state.borrow().soon.len()
    }
}

impl Clock for ManualClock {
    fn schedule_recurring(&self, _period: Duration, callback: TickCallback) -> ScheduleHandle {
        let handle = ScheduleHandle::new();
        self.state.borrow_mut().recurring.push(ManualEntry {
            callback,
            active: handle.flag(),
        });
        handle
    }

    fn schedule_soon(&self, callback: SoonCallback) {
        self.state.borrow_mut().soon.push_back(callback);
    }
}

struct LocalEntry {
    callback: TickCallback,
    active: Rc<Cell<bool>>,
    ticker: Receiver<Instant>,
}

/// Blocking event loop pacing schedules on the current thread.
///
/// [`turn`] waits for the next recurring deadline, fires that one callback,
/// then runs the soon-callbacks it queued. Everything happens on the
/// calling thread; there is no worker.
///
/// [`turn`]: LocalClock::turn
#[derive(Default)]
pub struct LocalClock {
    state: RefCell<LocalState>,
}

#[derive(Default)]
struct LocalState {
    recurring: Vec<LocalEntry>,
    soon: VecDeque<SoonCallback>,
}

impl LocalClock {
    /// Creates a clock ready to be shared with an engine.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Blocks until the next recurring callback is due and fires it, then
    /// runs queued soon-callbacks.
    ///
    /// Returns `false` when nothing fired and no schedule remains active.
    pub fn turn(&self) -> bool {
        let mut entries = mem::take(&mut self.state.borrow_mut().recurring);
        entries.retain(|entry| entry.active.get());

        let fired = if entries.is_empty() {
            false
        } else {
            let index = {
                let mut select = Select::new();
                for entry in &entries {
                    select.recv(&entry.ticker);
                }
                let operation = select.select();
                let index = operation.index();
                let _ = operation.recv(&entries[index].ticker);
                index
            };
            (entries[index].callback)();
            true
        };

        self.restore(entries);
        self.drain_soon();
        fired
            || self
                .state
                .borrow()
                .recurring
                .iter()
                .any(|entry| entry.active.get())
    }

    /// Turns the loop while `keep_going` holds and schedules remain.
    pub fn run_while(&self, mut keep_going: impl FnMut() -> bool) {
        while keep_going() && self.turn() {}
    }

    /// Runs queued soon-callbacks until none remain.
    pub fn drain_soon(&self) {
        loop {
            let next = self.state.borrow_mut().soon.pop_front();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    fn restore(&self, mut entries: Vec<LocalEntry>) {
        let mut state = self.state.borrow_mut();
        let added = mem::take(&mut state.recurring);
        entries.extend(added);
        entries.retain(|entry| entry.active.get());
        state.recurring = entries;
    }
}

impl Clock for LocalClock {
    fn schedule_recurring(&self, period: Duration, callback: TickCallback) -> ScheduleHandle {
        let handle = ScheduleHandle::new();
        self.state.borrow_mut().recurring.push(LocalEntry {
            callback,
            active: handle.flag(),
            ticker: tick(period),
        });
        handle
    }

    fn schedule_soon(&self, callback: SoonCallback) {
        self.state.borrow_mut().soon.push_back(callback);
    }
}
