//! # recwatch: change observation for dynamic records
//!
//! recwatch lets observers register interest in structural mutations of
//! dynamically-typed key-value containers ("records"): property addition,
//! value update, deletion, and loss of extensibility. The host provides no
//! mutation trap, so changes are detected after the fact by diffing
//! successive snapshots on a polling schedule and delivered to handlers in
//! ordered batches.
//!
//! ## Core Concepts
//!
//! - **Record**: any container exposing ordered keys, values, and an
//!   extensibility flag through the [`Record`] capability trait
//! - **Snapshot**: an immutable capture of one record at one pass
//! - **ChangeRecord**: one reported mutation event
//! - **Handler**: a callback receiving batches of change records
//! - **Notifier**: a per-record capability for synthetic change records
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recwatch::{AcceptTypes, Handler, ManualClock, ObjectRecord, ObserverEngine, RecordRef};
//!
//! let clock = ManualClock::new();
//! let engine = ObserverEngine::new(clock.clone());
//!
//! let object = ObjectRecord::new();
//! let record: RecordRef = object.clone();
//! let handler = Handler::new(|changes| println!("{changes:?}"));
//! engine.observe(&record, &handler, AcceptTypes::All)?;
//!
//! object.set("a", 1);
//! clock.advance(); // one tick plus the flush it schedules
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod change;
pub mod clock;
pub mod error;
pub mod handler;
pub mod record;
pub mod value;

// The engine
pub mod observer;

// Re-export primary types at crate root for convenience
pub use change::{ChangeFields, ChangeRecord, ChangeType};
pub use clock::{Clock, LocalClock, ManualClock, ScheduleHandle};
pub use error::{ValidationError, WatchError, WatchResult};
pub use handler::{Handler, HandlerId};
pub use observer::{
    diff, AcceptTypes, EngineConfig, Notifier, ObserverEngine, PropertyChange, Snapshot,
};
pub use record::{ObjectRecord, Record, RecordRef};
pub use value::Value;
