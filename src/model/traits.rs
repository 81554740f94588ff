//! Model trait family
//!
//! `Model` binds a concrete entity type to its metadata key, table identity
//! and embedded `Record`. `ModelHooks` carries the per-instance lifecycle
//! hooks; each has a default implementation so entity types override only
//! what they need. Mass assignment resolves mutators through a static
//! dispatch table (`setter`) generated per concrete type instead of any
//! runtime reflection.

use std::collections::HashMap;

use crate::connection::{Row, TableRef};
use crate::error::OrmResult;
use crate::events::LifecycleEvent;
use crate::model::Record;
use crate::naming::uncamelize;
use crate::value::Value;

/// Per-instance lifecycle hooks. Cancellable hooks return `false` to veto
/// the operation; notification hooks are side-effecting only.
pub trait ModelHooks {
    fn before_validation(&mut self) -> bool {
        true
    }

    fn before_validation_on_create(&mut self) -> bool {
        true
    }

    fn before_validation_on_update(&mut self) -> bool {
        true
    }

    /// User-defined validators run here; append messages and return `false`
    /// to reject the operation
    fn validation(&mut self) -> bool {
        true
    }

    fn after_validation_on_create(&mut self) -> bool {
        true
    }

    fn after_validation_on_update(&mut self) -> bool {
        true
    }

    fn after_validation(&mut self) -> bool {
        true
    }

    fn before_save(&mut self) -> bool {
        true
    }

    fn before_create(&mut self) -> bool {
        true
    }

    fn before_update(&mut self) -> bool {
        true
    }

    fn before_delete(&mut self) -> bool {
        true
    }

    fn on_validation_fails(&mut self) {}

    fn after_create(&mut self) {}

    fn after_update(&mut self) {}

    fn after_save(&mut self) {}

    fn not_save(&mut self) {}

    fn after_delete(&mut self) {}

    fn not_saved(&mut self) {}

    fn not_deleted(&mut self) {}
}

/// Route a cancellable lifecycle event to the matching hook method
pub(crate) fn invoke_cancellable<M: ModelHooks>(model: &mut M, event: LifecycleEvent) -> bool {
    match event {
        LifecycleEvent::BeforeValidation => model.before_validation(),
        LifecycleEvent::BeforeValidationOnCreate => model.before_validation_on_create(),
        LifecycleEvent::BeforeValidationOnUpdate => model.before_validation_on_update(),
        LifecycleEvent::Validation => model.validation(),
        LifecycleEvent::AfterValidationOnCreate => model.after_validation_on_create(),
        LifecycleEvent::AfterValidationOnUpdate => model.after_validation_on_update(),
        LifecycleEvent::AfterValidation => model.after_validation(),
        LifecycleEvent::BeforeSave => model.before_save(),
        LifecycleEvent::BeforeCreate => model.before_create(),
        LifecycleEvent::BeforeUpdate => model.before_update(),
        LifecycleEvent::BeforeDelete => model.before_delete(),
        _ => true,
    }
}

/// Route a notification-only lifecycle event to the matching hook method
pub(crate) fn invoke_notification<M: ModelHooks>(model: &mut M, event: LifecycleEvent) {
    match event {
        LifecycleEvent::OnValidationFails => model.on_validation_fails(),
        LifecycleEvent::AfterCreate => model.after_create(),
        LifecycleEvent::AfterUpdate => model.after_update(),
        LifecycleEvent::AfterSave => model.after_save(),
        LifecycleEvent::NotSave => model.not_save(),
        LifecycleEvent::AfterDelete => model.after_delete(),
        LifecycleEvent::NotSaved => model.not_saved(),
        LifecycleEvent::NotDeleted => model.not_deleted(),
        _ => {}
    }
}

/// Core trait for persistable entity types
pub trait Model: ModelHooks + Sized {
    /// Metadata key for this entity type
    fn entity_name() -> &'static str;

    /// Default table name, derived from the entity name
    fn source() -> String {
        uncamelize(Self::entity_name())
    }

    /// Optional schema the table lives in
    fn schema() -> Option<String> {
        None
    }

    /// Name of the connection service this entity persists through
    fn connection_service() -> &'static str {
        "db"
    }

    /// Override the sequence used to generate identity values; defaults to
    /// `<source>_<identity>_seq` when `None`
    fn sequence_name() -> Option<String> {
        None
    }

    fn record(&self) -> &Record;

    fn record_mut(&mut self) -> &mut Record;

    /// Static mutator dispatch table: return the typed setter for an
    /// attribute name, or `None` to fall back to a direct attribute write
    fn setter(name: &str) -> Option<fn(&mut Self, Value)> {
        let _ = name;
        None
    }

    /// Effective table identity, honoring per-instance overrides
    fn table(&self) -> TableRef {
        let table = self
            .record()
            .source_override()
            .map(str::to_string)
            .unwrap_or_else(Self::source);
        let schema = self
            .record()
            .schema_override()
            .map(str::to_string)
            .or_else(Self::schema);
        TableRef { schema, table }
    }

    /// Mass-assign a data map onto declared attributes, preferring the
    /// typed setter when one exists
    fn assign(&mut self, data: Row) {
        for (name, value) in data {
            match Self::setter(&name) {
                Some(setter) => setter(self, value),
                None => self.record_mut().write_attribute(&name, value),
            }
        }
    }

    /// Build an instance from a raw row, optionally remapping through a
    /// column map. Hydrated instances are marked as persisted.
    fn hydrate(row: Row, column_map: Option<&HashMap<String, String>>) -> OrmResult<Self>
    where
        Self: Default,
    {
        let mut model = Self::default();
        *model.record_mut() = Record::hydrate(row, column_map)?;
        Ok(model)
    }

    fn read_attribute(&self, name: &str) -> Option<&Value> {
        self.record().read_attribute(name)
    }

    fn write_attribute(&mut self, name: &str, value: impl Into<Value>) {
        self.record_mut().write_attribute(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Robot {
        record: Record,
        normalized: bool,
    }

    impl ModelHooks for Robot {}

    impl Model for Robot {
        fn entity_name() -> &'static str {
            "Robot"
        }

        fn record(&self) -> &Record {
            &self.record
        }

        fn record_mut(&mut self) -> &mut Record {
            &mut self.record
        }

        fn setter(name: &str) -> Option<fn(&mut Self, Value)> {
            match name {
                "name" => Some(|robot, value| {
                    robot.normalized = true;
                    if let Value::String(s) = value {
                        robot.record.write_attribute("name", s.trim().to_string());
                    }
                }),
                _ => None,
            }
        }
    }

    #[test]
    fn test_default_source_uncamelizes() {
        assert_eq!(Robot::source(), "robot");
        assert_eq!(Robot::connection_service(), "db");
    }

    #[test]
    fn test_table_honors_instance_overrides() {
        let mut robot = Robot::default();
        assert_eq!(robot.table(), TableRef::new("robot"));
        robot.record_mut().set_source("legacy_robots");
        robot.record_mut().set_schema("factory");
        assert_eq!(robot.table(), TableRef::with_schema("factory", "legacy_robots"));
    }

    #[test]
    fn test_assign_prefers_setter() {
        let mut robot = Robot::default();
        let mut data = Row::new();
        data.insert("name".to_string(), Value::String("  Astro Boy ".to_string()));
        data.insert("year".to_string(), Value::Int(1952));
        robot.assign(data);

        assert!(robot.normalized);
        assert_eq!(robot.read_attribute("name"), Some(&Value::String("Astro Boy".to_string())));
        assert_eq!(robot.read_attribute("year"), Some(&Value::Int(1952)));
    }

    #[test]
    fn test_hydrate_marks_persisted() {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Int(1));
        let robot = Robot::hydrate(row, None).unwrap();
        assert!(robot.record().force_exists());
    }
}
