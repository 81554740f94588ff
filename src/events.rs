//! Lifecycle events and the observer dispatch contract
//!
//! Every mutating operation walks a fixed sequence of lifecycle events. An
//! event is first offered to the entity's own hook (see `ModelHooks`), then
//! to the attached dispatcher; for cancellable events a `false` from either
//! side vetoes the operation.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::Record;

/// Named lifecycle events fired during save/delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    BeforeValidation,
    BeforeValidationOnCreate,
    BeforeValidationOnUpdate,
    Validation,
    OnValidationFails,
    AfterValidationOnCreate,
    AfterValidationOnUpdate,
    AfterValidation,
    BeforeSave,
    BeforeCreate,
    BeforeUpdate,
    AfterCreate,
    AfterUpdate,
    AfterSave,
    NotSave,
    BeforeDelete,
    AfterDelete,
    NotSaved,
    NotDeleted,
}

impl LifecycleEvent {
    /// Canonical event name as seen by dispatchers
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::BeforeValidation => "beforeValidation",
            LifecycleEvent::BeforeValidationOnCreate => "beforeValidationOnCreate",
            LifecycleEvent::BeforeValidationOnUpdate => "beforeValidationOnUpdate",
            LifecycleEvent::Validation => "validation",
            LifecycleEvent::OnValidationFails => "onValidationFails",
            LifecycleEvent::AfterValidationOnCreate => "afterValidationOnCreate",
            LifecycleEvent::AfterValidationOnUpdate => "afterValidationOnUpdate",
            LifecycleEvent::AfterValidation => "afterValidation",
            LifecycleEvent::BeforeSave => "beforeSave",
            LifecycleEvent::BeforeCreate => "beforeCreate",
            LifecycleEvent::BeforeUpdate => "beforeUpdate",
            LifecycleEvent::AfterCreate => "afterCreate",
            LifecycleEvent::AfterUpdate => "afterUpdate",
            LifecycleEvent::AfterSave => "afterSave",
            LifecycleEvent::NotSave => "notSave",
            LifecycleEvent::BeforeDelete => "beforeDelete",
            LifecycleEvent::AfterDelete => "afterDelete",
            LifecycleEvent::NotSaved => "notSaved",
            LifecycleEvent::NotDeleted => "notDeleted",
        }
    }
}

/// Observer contract: `false` from `fire` vetoes a cancellable event
pub trait EventDispatcher: Send + Sync {
    fn fire(&self, event: LifecycleEvent, record: &Record) -> bool;
}

static EVENTS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Process-wide switch turning all lifecycle events off. Default: enabled.
pub fn disable_events(disabled: bool) {
    EVENTS_DISABLED.store(disabled, Ordering::Relaxed);
}

/// Whether lifecycle events are globally disabled. Read once at pipeline
/// entry and passed down, never consulted inside deep helpers.
pub fn events_disabled() -> bool {
    EVENTS_DISABLED.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(LifecycleEvent::BeforeValidation.as_str(), "beforeValidation");
        assert_eq!(LifecycleEvent::NotDeleted.as_str(), "notDeleted");
        assert_eq!(LifecycleEvent::AfterSave.as_str(), "afterSave");
    }

    #[test]
    fn test_global_switch_round_trip() {
        assert!(!events_disabled());
        disable_events(true);
        assert!(events_disabled());
        disable_events(false);
        assert!(!events_disabled());
    }
}
