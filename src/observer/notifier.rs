//! Per-record notification capability.

use std::fmt;
use std::rc::Rc;

use crate::change::{ChangeFields, ChangeType};
use crate::error::{ValidationError, WatchResult};
use crate::record::RecordRef;

use super::engine::ObserverEngine;

/// Capability for injecting synthetic change records for one record,
/// outside the polling cycle.
///
/// Obtained from [`ObserverEngine::get_notifier`]. The bound record is
/// force-set on every change record this capability enqueues; callers
/// cannot speak for other records through it.
#[derive(Clone)]
pub struct Notifier {
    engine: ObserverEngine,
    record: RecordRef,
}

impl Notifier {
    pub(crate) fn new(engine: ObserverEngine, record: RecordRef) -> Self {
        Self { engine, record }
    }

    /// The record this notifier is bound to.
    #[must_use]
    pub fn record(&self) -> &RecordRef {
        &self.record
    }

    /// Enqueues one synthetic change record, bypassing the diff engine.
    ///
    /// The record is appended directly to the queue of every registration
    /// on the bound record whose filter accepts `change_type`; with no
    /// accepting registration this is a silent no-op. Built-in types are
    /// permitted for deliberate synthesis; only an empty type is rejected.
    pub fn notify(
        &self,
        change_type: impl Into<ChangeType>,
        fields: ChangeFields,
    ) -> WatchResult<()> {
        self.engine
            .enqueue_custom(&self.record, change_type.into(), fields)
    }

    /// Runs `body`, then enqueues exactly one change record of
    /// `change_type` summarizing its net effect, built from the addendum
    /// fields `body` returns, which are also handed back to the caller.
    ///
    /// Intermediate changes `body` makes (through [`notify`] or by mutating
    /// the record) route to observers on their own terms. A failing body
    /// enqueues nothing and the failure propagates.
    ///
    /// [`notify`]: Notifier::notify
    pub fn perform_change<F>(
        &self,
        change_type: impl Into<ChangeType>,
        body: F,
    ) -> WatchResult<ChangeFields>
    where
        F: FnOnce() -> WatchResult<ChangeFields>,
    {
        let change_type = change_type.into();
        if change_type.as_str().is_empty() {
            return Err(ValidationError::EmptyChangeType.into());
        }
        let fields = body()?;
        self.engine
            .enqueue_custom(&self.record, change_type, fields.clone())?;
        Ok(fields)
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("record", &Rc::as_ptr(&self.record))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::WatchError;
    use crate::handler::Handler;
    use crate::observer::registry::AcceptTypes;
    use crate::record::ObjectRecord;
    use crate::value::Value;
    use std::cell::RefCell;

    fn observed_engine() -> (
        Rc<ManualClock>,
        ObserverEngine,
        RecordRef,
        Rc<RefCell<Vec<crate::change::ChangeRecord>>>,
    ) {
        let clock = ManualClock::new();
        let engine = ObserverEngine::new(clock.clone());
        let record: RecordRef = ObjectRecord::new();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let handler = Handler::new(move |batch: &[crate::change::ChangeRecord]| {
            sink.borrow_mut().extend_from_slice(batch);
        });
        engine.observe(&record, &handler, AcceptTypes::All).unwrap();
        (clock, engine, record, seen)
    }

    #[test]
    fn notify_binds_the_record_and_flushes_asynchronously() {
        let (clock, engine, record, seen) = observed_engine();
        let notifier = engine.get_notifier(&record).unwrap();

        notifier
            .notify("reconfigure", ChangeFields::named("x"))
            .unwrap();
        assert!(seen.borrow().is_empty());

        clock.drain_soon();
        let batch = seen.borrow();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].change_type.as_str(), "reconfigure");
        assert_eq!(batch[0].name.as_deref(), Some("x"));
        assert!(Rc::ptr_eq(&batch[0].object, &record));
    }

    #[test]
    fn notify_rejects_empty_types() {
        let (_clock, engine, record, _seen) = observed_engine();
        let notifier = engine.get_notifier(&record).unwrap();

        let err = notifier.notify("", ChangeFields::default()).unwrap_err();
        assert!(matches!(
            err,
            WatchError::Validation(ValidationError::EmptyChangeType)
        ));
    }

    #[test]
    fn notify_for_an_untracked_record_is_a_no_op() {
        let clock = ManualClock::new();
        let engine = ObserverEngine::new(clock.clone());
        let record: RecordRef = ObjectRecord::new();

        let notifier = engine.get_notifier(&record).unwrap();
        notifier
            .notify("reconfigure", ChangeFields::default())
            .unwrap();
        assert_eq!(clock.pending_soon(), 0);
    }

    #[test]
    fn perform_change_enqueues_one_summary_on_success() {
        let (clock, engine, record, seen) = observed_engine();
        let notifier = engine.get_notifier(&record).unwrap();

        let mut fields = ChangeFields::named("total");
        fields.old_value = Some(Value::Int(10));
        let returned = notifier
            .perform_change("recalculate", move || Ok(fields))
            .unwrap();
        assert_eq!(returned.name.as_deref(), Some("total"));

        clock.drain_soon();
        let batch = seen.borrow();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].change_type.as_str(), "recalculate");
        assert_eq!(batch[0].old_value, Some(Value::Int(10)));
    }

    #[test]
    fn perform_change_failure_enqueues_nothing() {
        let (clock, engine, record, seen) = observed_engine();
        let notifier = engine.get_notifier(&record).unwrap();

        let err = notifier
            .perform_change("recalculate", || {
                Err(WatchError::internal("body failed"))
            })
            .unwrap_err();
        assert!(err.is_internal());

        clock.drain_soon();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn get_notifier_requires_extensibility() {
        let clock = ManualClock::new();
        let engine = ObserverEngine::new(clock);
        let object = ObjectRecord::new();
        object.prevent_extensions();
        let record: RecordRef = object;

        let err = engine.get_notifier(&record).unwrap_err();
        assert!(matches!(
            err,
            WatchError::Validation(ValidationError::RecordNotExtensible)
        ));
    }
}
