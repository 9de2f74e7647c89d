//! The observation engine: registry, scheduler pass, delivery queues, flush.
//!
//! This module owns the process-visible state: which records are tracked,
//! their latest snapshots, and the per-handler delivery queues. One engine
//! is one explicit context; independent engines coexist and never share
//! state.
//!
//! Everything runs on one logical thread. The only interleaving point is
//! the boundary between a tick's synchronous diff/route phase and the
//! asynchronous flush of queues, scheduled through the [`Clock`]
//! collaborator. Reentrant calls from inside a delivered batch are safe:
//! each queue is swapped out before its handler runs, and registry
//! mutations take effect for the next pass.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::change::{ChangeFields, ChangeRecord, ChangeType};
use crate::clock::{Clock, ScheduleHandle};
use crate::error::{ValidationError, WatchResult};
use crate::handler::{Handler, HandlerId};
use crate::record::{RecordKey, RecordRef};

use super::diff::diff;
use super::notifier::Notifier;
use super::registry::{AcceptTypes, RecordEntry, Registration};
use super::snapshot::Snapshot;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of the scheduled polling pass.
    ///
    /// A throughput/latency trade-off, not a correctness property.
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(40),
        }
    }
}

struct HandlerQueue {
    handler: Handler,
    pending: Vec<ChangeRecord>,
}

#[derive(Default)]
struct EngineState {
    records: IndexMap<RecordKey, RecordEntry>,
    queues: IndexMap<HandlerId, HandlerQueue>,
    ticker: Option<ScheduleHandle>,
    flush_scheduled: bool,
    ticks: u64,
    delivered: u64,
}

struct EngineShared {
    config: EngineConfig,
    clock: Rc<dyn Clock>,
    state: RefCell<EngineState>,
}

/// The detection-and-delivery engine.
///
/// Handles are cheap to clone and share one engine. The recurring schedule
/// starts with the first registration, is cancelled when the registry
/// empties, and restarts on re-observation. An idle engine performs no
/// work and consumes no timer.
#[derive(Clone)]
pub struct ObserverEngine {
    shared: Rc<EngineShared>,
}

impl ObserverEngine {
    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self::with_config(clock, EngineConfig::default())
    }

    /// Creates an engine with an explicit configuration.
    #[must_use]
    pub fn with_config(clock: Rc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            shared: Rc::new(EngineShared {
                config,
                clock,
                state: RefCell::new(EngineState::default()),
            }),
        }
    }

    /// Registers `handler` for changes to `record`.
    ///
    /// Re-registering an existing (handler, record) pair replaces its
    /// filter in place rather than creating a second registration. The
    /// first registration of a record captures its baseline snapshot
    /// synchronously, so properties that existed before observation began
    /// never produce spurious `add` records.
    pub fn observe(
        &self,
        record: &RecordRef,
        handler: &Handler,
        accept: AcceptTypes,
    ) -> WatchResult<()> {
        accept.validate()?;
        let key = RecordKey::of(record);
        let needs_ticker = {
            let mut state = self.shared.state.borrow_mut();
            let tick = state.ticks;
            let entry = state.records.entry(key).or_insert_with(|| {
                trace!(?key, "tracking record");
                RecordEntry {
                    record: Rc::clone(record),
                    snapshot: Snapshot::capture(record, tick),
                    registrations: Vec::new(),
                }
            });
            entry.upsert(handler, accept);
            state.ticker.is_none()
        };
        if needs_ticker {
            self.start_ticker();
        }
        debug!(handler = %handler.id(), "observe");
        Ok(())
    }

    /// Removes the (handler, record) registration; a no-op when absent.
    ///
    /// Removing a record's last registration discards its snapshot and
    /// removes it from scheduling; already-queued change records are not
    /// retracted.
    pub fn unobserve(&self, record: &RecordRef, handler: &Handler) {
        let key = RecordKey::of(record);
        let mut state = self.shared.state.borrow_mut();
        let Some(entry) = state.records.get_mut(&key) else {
            return;
        };
        if !entry.remove(handler) {
            return;
        }
        if entry.registrations.is_empty() {
            state.records.shift_remove(&key);
            trace!(?key, "record left registry");
        }
        if state.records.is_empty() {
            // Dropping the handle cancels the recurring schedule.
            state.ticker = None;
            debug!("scheduler idle");
        }
        Self::gc_queue(&mut state, handler.id());
        debug!(handler = %handler.id(), "unobserve");
    }

    /// Returns the notification capability bound to `record`.
    ///
    /// Non-extensible records cannot accept new instrumentation.
    pub fn get_notifier(&self, record: &RecordRef) -> WatchResult<Notifier> {
        if !record.is_extensible() {
            return Err(ValidationError::RecordNotExtensible.into());
        }
        Ok(Notifier::new(self.clone(), Rc::clone(record)))
    }

    /// Synchronously drains and returns the handler's queue.
    ///
    /// The only synchronous extraction path; an empty sequence when nothing
    /// is pending. The handler itself is not invoked.
    pub fn deliver_change_records(&self, handler: &Handler) -> Vec<ChangeRecord> {
        let mut state = self.shared.state.borrow_mut();
        let Some(queue) = state.queues.get_mut(&handler.id()) else {
            return Vec::new();
        };
        let batch = std::mem::take(&mut queue.pending);
        state.delivered += batch.len() as u64;
        Self::gc_queue(&mut state, handler.id());
        batch
    }

    /// Runs one full scheduled pass over every tracked record: capture a
    /// fresh snapshot, diff against the stored one, route the resulting
    /// changes, and supersede the stored snapshot.
    ///
    /// Public so embedders and tests can drive the engine without a timer.
    pub fn run_tick(&self) {
        let (tick, work) = {
            let mut state = self.shared.state.borrow_mut();
            state.ticks += 1;
            let work: Vec<(RecordKey, RecordRef)> = state
                .records
                .iter()
                .map(|(key, entry)| (*key, Rc::clone(&entry.record)))
                .collect();
            (state.ticks, work)
        };
        trace!(tick, records = work.len(), "tick");

        for (key, record) in work {
            // The record is user code; capture with no engine state borrowed.
            let fresh = Snapshot::capture(&record, tick);
            let mut state = self.shared.state.borrow_mut();
            let (registrations, changes) = {
                let Some(entry) = state.records.get_mut(&key) else {
                    // Unobserved since the pass began.
                    continue;
                };
                let changes = diff(&entry.snapshot, &fresh);
                entry.snapshot = fresh;
                if changes.is_empty() {
                    continue;
                }
                (entry.registrations.clone(), changes)
            };
            for change in changes {
                let change_record = ChangeRecord {
                    change_type: change.change_type,
                    name: change.name,
                    object: Rc::clone(&record),
                    old_value: change.old_value,
                    extra: IndexMap::new(),
                };
                Self::route(&mut state, &registrations, &change_record);
            }
        }

        self.schedule_flush_if_needed();
    }

    /// Appends a synthetic change record for `record`, bypassing the diff
    /// engine, and schedules a flush when anything was enqueued.
    ///
    /// Routed through the record's registrations like any other change; a
    /// record nobody observes, or a type nobody accepts, enqueues nothing
    /// and is not an error.
    pub(crate) fn enqueue_custom(
        &self,
        record: &RecordRef,
        change_type: ChangeType,
        fields: ChangeFields,
    ) -> WatchResult<()> {
        if change_type.as_str().is_empty() {
            return Err(ValidationError::EmptyChangeType.into());
        }
        let key = RecordKey::of(record);
        {
            let mut state = self.shared.state.borrow_mut();
            let Some(entry) = state.records.get(&key) else {
                return Ok(());
            };
            let registrations = entry.registrations.clone();
            let change_record = ChangeRecord {
                change_type,
                name: fields.name,
                object: Rc::clone(record),
                old_value: fields.old_value,
                extra: fields.extra,
            };
            let routed = Self::route(&mut state, &registrations, &change_record);
            trace!(routed, change_type = %change_record.change_type, "notify");
        }
        self.schedule_flush_if_needed();
        Ok(())
    }

    /// Number of completed scheduled passes.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.shared.state.borrow().ticks
    }

    /// Number of change records handed to handlers or drained on demand.
    #[must_use]
    pub fn delivered_changes(&self) -> u64 {
        self.shared.state.borrow().delivered
    }

    /// Number of records currently tracked.
    #[must_use]
    pub fn tracked_records(&self) -> usize {
        self.shared.state.borrow().records.len()
    }

    /// True when nothing is tracked and no timer is scheduled.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.shared.state.borrow();
        state.records.is_empty() && state.ticker.is_none()
    }

    fn start_ticker(&self) {
        let weak: Weak<EngineShared> = Rc::downgrade(&self.shared);
        let handle = self.shared.clock.schedule_recurring(
            self.shared.config.tick_interval,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    ObserverEngine { shared }.run_tick();
                }
            }),
        );
        self.shared.state.borrow_mut().ticker = Some(handle);
        debug!(interval = ?self.shared.config.tick_interval, "scheduler started");
    }

    /// Routes one change record to every registration accepting its type.
    /// Returns how many queues it reached.
    fn route(
        state: &mut EngineState,
        registrations: &[Registration],
        change_record: &ChangeRecord,
    ) -> usize {
        let mut routed = 0;
        for registration in registrations {
            if !registration.accept.accepts(&change_record.change_type) {
                continue;
            }
            let queue = state
                .queues
                .entry(registration.handler.id())
                .or_insert_with(|| HandlerQueue {
                    handler: registration.handler.clone(),
                    pending: Vec::new(),
                });
            queue.pending.push(change_record.clone());
            routed += 1;
        }
        routed
    }

    fn schedule_flush_if_needed(&self) {
        let needs = {
            let mut state = self.shared.state.borrow_mut();
            let pending = state.queues.values().any(|queue| !queue.pending.is_empty());
            if pending && !state.flush_scheduled {
                state.flush_scheduled = true;
                true
            } else {
                false
            }
        };
        if needs {
            let weak = Rc::downgrade(&self.shared);
            self.shared.clock.schedule_soon(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    ObserverEngine { shared }.flush();
                }
            }));
        }
    }

    /// Delivers every non-empty queue, one batch per handler per flush.
    ///
    /// Each queue is swapped out before its handler runs, so reentrant
    /// calls from inside a handler cannot corrupt the batch being
    /// delivered. Handler failures are not caught: they abort the rest of
    /// this flush, and the remaining queues keep their batches for the
    /// next one.
    fn flush(&self) {
        self.shared.state.borrow_mut().flush_scheduled = false;
        let handler_ids: Vec<HandlerId> = self
            .shared
            .state
            .borrow()
            .queues
            .iter()
            .filter(|(_, queue)| !queue.pending.is_empty())
            .map(|(id, _)| *id)
            .collect();
        trace!(handlers = handler_ids.len(), "flush");

        for handler_id in handler_ids {
            let Some((handler, batch)) = self.take_batch(handler_id) else {
                continue;
            };
            handler.invoke(&batch);
            let mut state = self.shared.state.borrow_mut();
            state.delivered += batch.len() as u64;
            Self::gc_queue(&mut state, handler_id);
        }
    }

    fn take_batch(&self, handler_id: HandlerId) -> Option<(Handler, Vec<ChangeRecord>)> {
        let mut state = self.shared.state.borrow_mut();
        let queue = state.queues.get_mut(&handler_id)?;
        if queue.pending.is_empty() {
            return None;
        }
        Some((queue.handler.clone(), std::mem::take(&mut queue.pending)))
    }

    /// Drops an empty queue once its handler holds no registration
    /// anywhere, so the queue table cannot grow without bound.
    fn gc_queue(state: &mut EngineState, handler_id: HandlerId) {
        let registered = state.records.values().any(|entry| {
            entry
                .registrations
                .iter()
                .any(|registration| registration.handler.id() == handler_id)
        });
        if registered {
            return;
        }
        let empty = state
            .queues
            .get(&handler_id)
            .is_some_and(|queue| queue.pending.is_empty());
        if empty {
            state.queues.shift_remove(&handler_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::record::ObjectRecord;
    use std::cell::RefCell;

    fn engine_with_clock() -> (Rc<ManualClock>, ObserverEngine) {
        let clock = ManualClock::new();
        let engine = ObserverEngine::new(clock.clone());
        (clock, engine)
    }

    fn capture_handler() -> (Handler, Rc<RefCell<Vec<ChangeRecord>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let handler = Handler::new(move |batch: &[ChangeRecord]| {
            sink.borrow_mut().extend_from_slice(batch);
        });
        (handler, seen)
    }

    #[test]
    fn scheduler_starts_on_first_observe_and_idles_when_empty() {
        let (clock, engine) = engine_with_clock();
        let record: RecordRef = ObjectRecord::new();
        let handler = Handler::new(|_| {});

        assert!(engine.is_idle());
        assert_eq!(clock.active_schedules(), 0);

        engine.observe(&record, &handler, AcceptTypes::All).unwrap();
        assert!(!engine.is_idle());
        assert_eq!(clock.active_schedules(), 1);
        assert_eq!(engine.tracked_records(), 1);

        engine.unobserve(&record, &handler);
        assert!(engine.is_idle());
        assert_eq!(clock.active_schedules(), 0);
        assert_eq!(engine.tracked_records(), 0);

        // Re-observation restarts the schedule.
        engine.observe(&record, &handler, AcceptTypes::All).unwrap();
        assert_eq!(clock.active_schedules(), 1);
    }

    #[test]
    fn baseline_snapshot_suppresses_preexisting_properties() {
        let (clock, engine) = engine_with_clock();
        let record: RecordRef = ObjectRecord::with_entries([("a", 1), ("b", 2)]);
        let (handler, seen) = capture_handler();

        engine.observe(&record, &handler, AcceptTypes::All).unwrap();
        clock.advance();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn a_tick_replaces_the_snapshot_even_without_changes() {
        let (clock, engine) = engine_with_clock();
        let object = ObjectRecord::with_entries([("a", 1)]);
        let record: RecordRef = object.clone();
        let (handler, seen) = capture_handler();

        engine.observe(&record, &handler, AcceptTypes::All).unwrap();
        clock.advance();
        clock.advance();
        assert!(seen.borrow().is_empty());

        object.set("a", 2);
        clock.advance();
        let batch = seen.borrow();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].old_value, Some(crate::value::Value::Int(1)));
    }

    #[test]
    fn observe_rejects_empty_type_names_in_the_filter() {
        let (_clock, engine) = engine_with_clock();
        let record: RecordRef = ObjectRecord::new();
        let handler = Handler::new(|_| {});

        let err = engine
            .observe(&record, &handler, AcceptTypes::only([""]))
            .unwrap_err();
        assert!(err.is_validation());
        // A failed observe must not start tracking.
        assert!(engine.is_idle());
    }

    #[test]
    fn unobserve_of_unknown_pairs_is_a_no_op() {
        let (_clock, engine) = engine_with_clock();
        let record: RecordRef = ObjectRecord::new();
        let handler = Handler::new(|_| {});

        engine.unobserve(&record, &handler);
        assert!(engine.is_idle());
    }

    #[test]
    fn delivered_counter_tracks_both_paths() {
        let (clock, engine) = engine_with_clock();
        let object = ObjectRecord::new();
        let record: RecordRef = object.clone();
        let (handler, _seen) = capture_handler();

        engine.observe(&record, &handler, AcceptTypes::All).unwrap();
        object.set("a", 1);
        clock.advance();
        assert_eq!(engine.delivered_changes(), 1);

        object.set("b", 2);
        engine.run_tick();
        let drained = engine.deliver_change_records(&handler);
        assert_eq!(drained.len(), 1);
        assert_eq!(engine.delivered_changes(), 2);
    }

    #[test]
    fn queue_is_dropped_once_empty_and_unregistered() {
        let (clock, engine) = engine_with_clock();
        let object = ObjectRecord::new();
        let record: RecordRef = object.clone();
        let (handler, _seen) = capture_handler();

        engine.observe(&record, &handler, AcceptTypes::All).unwrap();
        object.set("a", 1);
        engine.run_tick();
        engine.unobserve(&record, &handler);

        // Queued records survive unobserve.
        let batch = engine.deliver_change_records(&handler);
        assert_eq!(batch.len(), 1);
        assert!(engine.shared.state.borrow().queues.is_empty());

        clock.drain_soon();
    }
}
