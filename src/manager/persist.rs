//! Save/delete state machines: existence resolution, the validation
//! pipeline and the low-level insert/update/delete executors

use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::{BoundClause, Connection, Row};
use crate::error::{OrmError, OrmResult};
use crate::events::{events_disabled, LifecycleEvent};
use crate::manager::EntityManager;
use crate::message::{Message, MessageKind};
use crate::model::{Model, Operation};
use crate::value::{bind, Value};

/// Resolve a column name to its application attribute name through the
/// column map, when one is declared
fn mapped<'a>(column: &'a str, column_map: Option<&'a HashMap<String, String>>) -> OrmResult<&'a str> {
    match column_map {
        Some(map) => map
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| OrmError::ColumnMap(column.to_string())),
        None => Ok(column),
    }
}

/// Unset test applied to primary-key and identity values: only SQL NULL
/// and the empty string count, a zero is a legitimate key value
fn key_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

impl EntityManager {
    /// Whether the entity's current attribute state corresponds to a
    /// persisted row. Builds and caches the unique-key clause on first use,
    /// short-circuits on `force_exists`, and memoizes the positive outcome.
    pub fn exists<M: Model>(&self, model: &mut M) -> OrmResult<bool> {
        let connection = self.connection_for(model)?;

        if model.record().unique_key().is_none() {
            let entity = M::entity_name();
            let primary_keys = self.metadata().primary_key_attributes(entity)?;
            // Entities without a primary key are never updatable
            if primary_keys.is_empty() {
                return Ok(false);
            }
            let bind_types = self.metadata().bind_types(entity)?;
            let column_map = self.metadata().column_map(entity)?;

            let mut fragments = Vec::with_capacity(primary_keys.len());
            let mut values = Vec::with_capacity(primary_keys.len());
            let mut types = Vec::with_capacity(primary_keys.len());
            let mut empty = 0usize;
            for column in &primary_keys {
                let attribute = mapped(column, column_map.as_ref())?;
                let value = model
                    .read_attribute(attribute)
                    .cloned()
                    .unwrap_or(Value::Null);
                if key_is_empty(&value) {
                    empty += 1;
                }
                fragments.push(format!("{} = ?", connection.escape_identifier(column)));
                types.push(
                    bind_types
                        .get(column)
                        .copied()
                        .ok_or_else(|| OrmError::UnknownColumn(column.clone()))?,
                );
                values.push(value);
            }

            if empty == primary_keys.len() {
                return Ok(false);
            }
            model.record_mut().set_unique_key(BoundClause {
                clause: fragments.join(" AND "),
                values,
                types,
            });
        }

        if model.record().force_exists() {
            return Ok(true);
        }

        let key = match model.record().unique_key() {
            Some(key) => key.clone(),
            None => return Ok(false),
        };
        let sql = format!(
            "SELECT COUNT(*) AS rowcount FROM {} WHERE {}",
            model.table().escaped(connection.as_ref()),
            key.clause
        );
        let row = connection.fetch_one(&sql, &key.values, &key.types)?;
        let exists = row
            .and_then(|row| row.get("rowcount").cloned())
            .map(|count| !count.is_empty())
            .unwrap_or(false);
        model.record_mut().set_force_exists(exists);
        Ok(exists)
    }

    /// The validation pipeline run before every insert/update, cancelling
    /// at the first failure. Not-null violations aggregate in one pass;
    /// everything else short-circuits.
    fn pre_save<M: Model>(&self, model: &mut M, is_create: bool, events_enabled: bool) -> OrmResult<bool> {
        if !self.fire_cancellable(model, LifecycleEvent::BeforeValidation, events_enabled) {
            self.cancel_operation(model, events_enabled);
            return Ok(false);
        }
        let staged = if is_create {
            LifecycleEvent::BeforeValidationOnCreate
        } else {
            LifecycleEvent::BeforeValidationOnUpdate
        };
        if !self.fire_cancellable(model, staged, events_enabled) {
            self.cancel_operation(model, events_enabled);
            return Ok(false);
        }

        if !self.check_foreign_keys(model, events_enabled)? {
            return Ok(false);
        }

        if !self.validate_not_null(model, is_create)? {
            self.fire_notification(model, LifecycleEvent::OnValidationFails, events_enabled);
            self.cancel_operation(model, events_enabled);
            return Ok(false);
        }

        if !self.fire_cancellable(model, LifecycleEvent::Validation, events_enabled) {
            self.fire_notification(model, LifecycleEvent::OnValidationFails, events_enabled);
            self.cancel_operation(model, events_enabled);
            return Ok(false);
        }

        let staged = if is_create {
            LifecycleEvent::AfterValidationOnCreate
        } else {
            LifecycleEvent::AfterValidationOnUpdate
        };
        for event in [staged, LifecycleEvent::AfterValidation, LifecycleEvent::BeforeSave] {
            if !self.fire_cancellable(model, event, events_enabled) {
                self.cancel_operation(model, events_enabled);
                return Ok(false);
            }
        }
        let staged = if is_create {
            LifecycleEvent::BeforeCreate
        } else {
            LifecycleEvent::BeforeUpdate
        };
        if !self.fire_cancellable(model, staged, events_enabled) {
            self.cancel_operation(model, events_enabled);
            return Ok(false);
        }
        Ok(true)
    }

    /// Check every metadata-declared not-null attribute, appending one
    /// `PresenceOf` message per violation. The identity attribute may be
    /// empty on create only.
    fn validate_not_null<M: Model>(&self, model: &mut M, is_create: bool) -> OrmResult<bool> {
        let entity = M::entity_name();
        let not_null = self.metadata().not_null_attributes(entity)?;
        let numeric = self.metadata().numeric_attributes(entity)?;
        let column_map = self.metadata().column_map(entity)?;
        let identity = self.metadata().identity_field(entity)?;

        let mut passed = true;
        for column in &not_null {
            if is_create && identity.as_deref() == Some(column.as_str()) {
                continue;
            }
            let attribute = mapped(column, column_map.as_ref())?.to_string();
            let violated = match model.read_attribute(&attribute) {
                None => true,
                Some(value) => {
                    if numeric.contains(column) {
                        !value.is_numeric()
                    } else {
                        value.is_empty()
                    }
                }
            };
            if violated {
                model.record_mut().append_message(Message::new(
                    format!("{} is required", attribute),
                    Some(attribute),
                    MessageKind::PresenceOf,
                ));
                passed = false;
            }
        }
        Ok(passed)
    }

    /// Insert the entity's attributes into its table. Automatic-on-create
    /// attributes are skipped; unset attributes become NULL placeholders
    /// bound with the skip tag; the identity column gets the connection's
    /// default-id sentinel when empty and the generated value written back
    /// after a successful insert.
    fn do_low_insert<M: Model>(&self, model: &mut M, connection: &Arc<dyn Connection>) -> OrmResult<bool> {
        let entity = M::entity_name();
        let attributes = self.metadata().attributes(entity)?;
        let bind_types = self.metadata().bind_types(entity)?;
        let automatic = self.metadata().automatic_create_attributes(entity)?;
        let column_map = self.metadata().column_map(entity)?;
        let identity = self.metadata().identity_field(entity)?;

        let mut fields = Vec::new();
        let mut values = Vec::new();
        let mut types = Vec::new();
        for column in &attributes {
            if automatic.contains(column) {
                continue;
            }
            if identity.as_deref() == Some(column.as_str()) {
                continue;
            }
            let attribute = mapped(column, column_map.as_ref())?;
            fields.push(column.clone());
            match model.read_attribute(attribute) {
                Some(value) if !value.is_null() => {
                    values.push(value.clone());
                    types.push(
                        bind_types
                            .get(column)
                            .copied()
                            .ok_or_else(|| OrmError::UnknownColumn(column.clone()))?,
                    );
                }
                _ => {
                    values.push(Value::Null);
                    types.push(bind::SKIP);
                }
            }
        }

        let identity_attribute = match &identity {
            Some(column) => {
                let attribute = mapped(column, column_map.as_ref())?.to_string();
                fields.push(column.clone());
                match model.read_attribute(&attribute) {
                    Some(value) if !key_is_empty(value) => {
                        values.push(value.clone());
                        types.push(
                            bind_types
                                .get(column)
                                .copied()
                                .ok_or_else(|| OrmError::UnknownColumn(column.clone()))?,
                        );
                    }
                    _ => {
                        values.push(connection.default_id_value());
                        types.push(bind::SKIP);
                    }
                }
                Some((column.clone(), attribute))
            }
            None => None,
        };

        let table = model.table();
        tracing::debug!(entity, table = %table.table, fields = fields.len(), "executing low-level insert");
        let success = connection.insert(&table, values, fields, types)?;

        if success {
            if let Some((column, attribute)) = identity_attribute {
                let sequence = if connection.supports_sequences() {
                    Some(M::sequence_name().unwrap_or_else(|| format!("{}_{}_seq", table.table, column)))
                } else {
                    None
                };
                let generated = connection.last_insert_id(sequence.as_deref())?;
                model.write_attribute(&attribute, generated);
            }
        }
        Ok(success)
    }

    /// Update the entity's non-primary-key attributes, reusing the unique
    /// key cached during the existence check as the WHERE clause
    fn do_low_update<M: Model>(&self, model: &mut M, connection: &Arc<dyn Connection>) -> OrmResult<bool> {
        let entity = M::entity_name();
        let attributes = self.metadata().non_primary_key_attributes(entity)?;
        let bind_types = self.metadata().bind_types(entity)?;
        let automatic = self.metadata().automatic_update_attributes(entity)?;
        let column_map = self.metadata().column_map(entity)?;

        let mut fields = Vec::new();
        let mut values = Vec::new();
        let mut types = Vec::new();
        for column in &attributes {
            if automatic.contains(column) {
                continue;
            }
            let attribute = mapped(column, column_map.as_ref())?;
            fields.push(column.clone());
            match model.read_attribute(attribute) {
                Some(value) if !value.is_null() => {
                    values.push(value.clone());
                    types.push(
                        bind_types
                            .get(column)
                            .copied()
                            .ok_or_else(|| OrmError::UnknownColumn(column.clone()))?,
                    );
                }
                _ => {
                    values.push(Value::Null);
                    types.push(bind::SKIP);
                }
            }
        }

        let conditions = model.record().unique_key().cloned().ok_or_else(|| {
            OrmError::Configuration("Cannot update the record: its unique key has not been resolved".to_string())
        })?;
        let table = model.table();
        tracing::debug!(entity, table = %table.table, fields = fields.len(), "executing low-level update");
        connection.update(&table, fields, values, types, &conditions)
    }

    /// Shared tail of save/create/update once existence has been decided
    fn save_machine<M: Model>(&self, model: &mut M, exists: bool) -> OrmResult<bool> {
        let events_enabled = !events_disabled();
        let connection = self.connection_for(model)?;

        model
            .record_mut()
            .set_operation(if exists { Operation::Update } else { Operation::Create });
        model.record_mut().clear_messages();

        if !self.pre_save(model, !exists, events_enabled)? {
            return Ok(false);
        }

        let success = if exists {
            self.do_low_update(model, &connection)?
        } else {
            self.do_low_insert(model, &connection)?
        };

        self.post_save(model, success, exists, events_enabled);
        Ok(success)
    }

    fn post_save<M: Model>(&self, model: &mut M, success: bool, exists: bool, events_enabled: bool) {
        if success {
            let staged = if exists {
                LifecycleEvent::AfterUpdate
            } else {
                LifecycleEvent::AfterCreate
            };
            self.fire_notification(model, staged, events_enabled);
            self.fire_notification(model, LifecycleEvent::AfterSave, events_enabled);
        } else {
            self.fire_notification(model, LifecycleEvent::NotSave, events_enabled);
            self.cancel_operation(model, events_enabled);
        }
    }

    /// Insert or update depending on whether the record already exists
    pub fn save<M: Model>(&self, model: &mut M) -> OrmResult<bool> {
        let exists = self.exists(model)?;
        self.save_machine(model, exists)
    }

    /// Mass-assign `data` (typed setter when one exists, direct write
    /// otherwise), then `save`
    pub fn save_with<M: Model>(&self, model: &mut M, data: Row) -> OrmResult<bool> {
        model.assign(data);
        self.save(model)
    }

    /// Insert only: rejects with an `InvalidCreateAttempt` message when the
    /// record already exists, never overwrites
    pub fn create<M: Model>(&self, model: &mut M) -> OrmResult<bool> {
        if self.exists(model)? {
            model.record_mut().clear_messages();
            model.record_mut().append_message(Message::new(
                "Record cannot be created because it already exists",
                None,
                MessageKind::InvalidCreateAttempt,
            ));
            return Ok(false);
        }
        self.save_machine(model, false)
    }

    /// Strict mass-assignment through declared attributes, then `create`
    pub fn create_with<M: Model>(&self, model: &mut M, data: Row) -> OrmResult<bool> {
        self.assign_declared(model, &data)?;
        self.create(model)
    }

    /// Update only: rejects with an `InvalidUpdateAttempt` message when the
    /// record does not exist
    pub fn update<M: Model>(&self, model: &mut M) -> OrmResult<bool> {
        if !model.record().force_exists() && !self.exists(model)? {
            model.record_mut().clear_messages();
            model.record_mut().append_message(Message::new(
                "Record cannot be updated because it does not exist",
                None,
                MessageKind::InvalidUpdateAttempt,
            ));
            return Ok(false);
        }
        // Run the full existence resolution even for known-persisted
        // records: it builds the unique-key clause the update's WHERE
        // conditions come from before the force_exists short circuit.
        let exists = self.exists(model)?;
        self.save_machine(model, exists)
    }

    pub fn update_with<M: Model>(&self, model: &mut M, data: Row) -> OrmResult<bool> {
        self.assign_declared(model, &data)?;
        self.update(model)
    }

    /// Assign only metadata-declared attributes, resolving each through the
    /// column map; unknown keys in `data` are ignored
    fn assign_declared<M: Model>(&self, model: &mut M, data: &Row) -> OrmResult<()> {
        let attributes = self.metadata().attributes(M::entity_name())?;
        let column_map = self.metadata().column_map(M::entity_name())?;
        for column in &attributes {
            let attribute = mapped(column, column_map.as_ref())?;
            if let Some(value) = data.get(attribute) {
                match M::setter(attribute) {
                    Some(setter) => setter(model, value.clone()),
                    None => model.write_attribute(attribute, value.clone()),
                }
            }
        }
        Ok(())
    }

    /// Delete the row addressed by the entity's primary key.
    ///
    /// An unset primary-key attribute is a fatal configuration error, not a
    /// validation failure. After the delete primitive runs, `force_exists`
    /// is reset so the next existence check re-verifies against the store,
    /// whether or not the primitive reported success.
    pub fn delete<M: Model>(&self, model: &mut M) -> OrmResult<bool> {
        let events_enabled = !events_disabled();
        let connection = self.connection_for(model)?;
        let entity = M::entity_name();

        model.record_mut().set_operation(Operation::Delete);
        model.record_mut().clear_messages();

        if !self.check_foreign_keys_reverse(model, events_enabled)? {
            return Ok(false);
        }

        let primary_keys = self.metadata().primary_key_attributes(entity)?;
        if primary_keys.is_empty() {
            return Err(OrmError::Configuration(
                "A primary key must be defined in the model in order to perform the operation".to_string(),
            ));
        }
        let bind_types = self.metadata().bind_types(entity)?;
        let column_map = self.metadata().column_map(entity)?;

        let mut fragments = Vec::with_capacity(primary_keys.len());
        let mut values = Vec::with_capacity(primary_keys.len());
        let mut types = Vec::with_capacity(primary_keys.len());
        for column in &primary_keys {
            let attribute = mapped(column, column_map.as_ref())?;
            let value = match model.read_attribute(attribute) {
                Some(value) if !value.is_null() => value.clone(),
                _ => {
                    return Err(OrmError::Configuration(
                        "Cannot delete the record because one of the primary key attributes isn't set".to_string(),
                    ))
                }
            };
            fragments.push(format!("{} = ?", connection.escape_identifier(column)));
            values.push(value);
            types.push(
                bind_types
                    .get(column)
                    .copied()
                    .ok_or_else(|| OrmError::UnknownColumn(column.clone()))?,
            );
        }
        let conditions = BoundClause {
            clause: fragments.join(" AND "),
            values,
            types,
        };

        if !self.fire_cancellable(model, LifecycleEvent::BeforeDelete, events_enabled) {
            return Ok(false);
        }

        let table = model.table();
        tracing::debug!(entity, table = %table.table, "executing low-level delete");
        let success = connection.delete(&table, &conditions)?;

        if success {
            self.fire_notification(model, LifecycleEvent::AfterDelete, events_enabled);
        }
        model.record_mut().set_force_exists(false);
        Ok(success)
    }
}
