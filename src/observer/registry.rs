//! Registration bookkeeping for observed records.

use crate::change::ChangeType;
use crate::error::ValidationError;
use crate::handler::Handler;
use crate::record::RecordRef;

use super::snapshot::Snapshot;

/// Which change types a registration receives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AcceptTypes {
    /// Every type, built-in or custom.
    #[default]
    All,
    /// Only the listed types.
    Only(Vec<ChangeType>),
}

impl AcceptTypes {
    /// Builds a filter accepting only the listed types.
    pub fn only<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ChangeType>,
    {
        Self::Only(types.into_iter().map(Into::into).collect())
    }

    /// Whether a change of `change_type` passes this filter.
    #[must_use]
    pub fn accepts(&self, change_type: &ChangeType) -> bool {
        match self {
            Self::All => true,
            Self::Only(types) => types.contains(change_type),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Self::Only(types) = self {
            if types.iter().any(|change_type| change_type.as_str().is_empty()) {
                return Err(ValidationError::EmptyChangeType);
            }
        }
        Ok(())
    }
}

impl From<Vec<ChangeType>> for AcceptTypes {
    fn from(types: Vec<ChangeType>) -> Self {
        Self::Only(types)
    }
}

/// One (handler, filter) registration on a record.
#[derive(Debug, Clone)]
pub(crate) struct Registration {
    pub(crate) handler: Handler,
    pub(crate) accept: AcceptTypes,
}

/// Registry entry owning a record's latest snapshot and its registrations.
#[derive(Debug)]
pub(crate) struct RecordEntry {
    pub(crate) record: RecordRef,
    pub(crate) snapshot: Snapshot,
    pub(crate) registrations: Vec<Registration>,
}

impl RecordEntry {
    /// Adds a registration, or replaces the filter of an existing one for
    /// the same handler in place.
    pub(crate) fn upsert(&mut self, handler: &Handler, accept: AcceptTypes) {
        match self
            .registrations
            .iter_mut()
            .find(|registration| registration.handler.id() == handler.id())
        {
            Some(existing) => existing.accept = accept,
            None => self.registrations.push(Registration {
                handler: handler.clone(),
                accept,
            }),
        }
    }

    /// Removes the handler's registration; returns whether one existed.
    pub(crate) fn remove(&mut self, handler: &Handler) -> bool {
        let before = self.registrations.len();
        self.registrations
            .retain(|registration| registration.handler.id() != handler.id());
        self.registrations.len() != before
    }
}
