//! Per-instance persistence state
//!
//! `Record` is the state bag every entity type embeds: the open-ended
//! attribute map plus the bookkeeping the engine maintains across a save
//! cycle (cached unique key, existence hint, last operation, validation
//! messages) and the optional per-instance source/schema/connection
//! overrides.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::connection::BoundClause;
use crate::error::{OrmError, OrmResult};
use crate::message::Message;
use crate::value::Value;

/// Kind of the pending or last-executed low-level operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    #[default]
    None,
    Create,
    Update,
    Delete,
}

/// Dynamic attribute bag plus persistence bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    attributes: HashMap<String, Value>,
    unique_key: Option<BoundClause>,
    force_exists: bool,
    operation: Operation,
    messages: Vec<Message>,
    source: Option<String>,
    schema: Option<String>,
    connection_service: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an attribute value, `None` when the attribute was never set
    pub fn read_attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Write an attribute value directly, bypassing any typed setter
    pub fn write_attribute(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    /// Snapshot of the attribute map
    pub fn dump(&self) -> HashMap<String, Value> {
        self.attributes.clone()
    }

    /// Hydrate an instance from a raw column/value mapping, optionally
    /// remapping column names through a column map. Hydrated records are
    /// assumed persisted (`force_exists` is set).
    pub fn hydrate(
        row: HashMap<String, Value>,
        column_map: Option<&HashMap<String, String>>,
    ) -> OrmResult<Self> {
        let mut record = Record::new();
        for (column, value) in row {
            let attribute = match column_map {
                Some(map) => map
                    .get(&column)
                    .cloned()
                    .ok_or(OrmError::ColumnMap(column))?,
                None => column,
            };
            record.attributes.insert(attribute, value);
        }
        record.force_exists = true;
        Ok(record)
    }

    /// Serialize the attribute map to an opaque blob
    pub fn serialize(&self) -> OrmResult<String> {
        let object: serde_json::Map<String, JsonValue> = self
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Ok(serde_json::to_string(&JsonValue::Object(object))?)
    }

    /// Restore the attribute map from a blob produced by `serialize`.
    /// Invalidates the cached unique key so existence is re-derived.
    pub fn unserialize(&mut self, data: &str) -> OrmResult<()> {
        let json: JsonValue = serde_json::from_str(data)?;
        let JsonValue::Object(object) = json else {
            return Err(OrmError::Serialization(
                "expected a JSON object of attributes".to_string(),
            ));
        };
        self.attributes = object
            .into_iter()
            .map(|(name, value)| (name, Value::from_json(value)))
            .collect();
        self.unique_key = None;
        Ok(())
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn get_messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn validation_has_failed(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Run a validator over the current state, appending every message it
    /// produces. Returns `true` when the validator produced none.
    pub fn validate<F>(&mut self, validator: F) -> bool
    where
        F: FnOnce(&Record) -> Vec<Message>,
    {
        let messages = validator(self);
        let passed = messages.is_empty();
        self.messages.extend(messages);
        passed
    }

    pub(crate) fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// The operation set before the last low-level SQL execution
    pub fn operation_made(&self) -> Operation {
        self.operation
    }

    pub(crate) fn set_operation(&mut self, operation: Operation) {
        self.operation = operation;
    }

    /// Whether existence checks may be short-circuited to "exists"
    pub fn force_exists(&self) -> bool {
        self.force_exists
    }

    /// Mark the record as known-persisted (or force re-verification with `false`)
    pub fn set_force_exists(&mut self, force: bool) {
        self.force_exists = force;
    }

    pub(crate) fn unique_key(&self) -> Option<&BoundClause> {
        self.unique_key.as_ref()
    }

    pub(crate) fn set_unique_key(&mut self, key: BoundClause) {
        self.unique_key = Some(key);
    }

    /// Override the table name derived from the entity type
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    pub fn source_override(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Override the schema the table lives in
    pub fn set_schema(&mut self, schema: impl Into<String>) {
        self.schema = Some(schema.into());
    }

    pub fn schema_override(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Select which registered connection service this instance uses, for
    /// example a transaction-scoped connection
    pub fn set_connection_service(&mut self, service: impl Into<String>) {
        self.connection_service = Some(service.into());
    }

    pub fn connection_service_override(&self) -> Option<&str> {
        self.connection_service.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    #[test]
    fn test_serialize_round_trip() {
        let mut record = Record::new();
        record.write_attribute("id", 1i64);
        record.write_attribute("name", "Astro Boy");
        record.write_attribute("year", 1952i64);

        let blob = record.serialize().unwrap();
        let mut restored = Record::new();
        restored.unserialize(&blob).unwrap();

        assert_eq!(restored.read_attribute("id"), Some(&Value::Int(1)));
        assert_eq!(restored.read_attribute("name"), Some(&Value::String("Astro Boy".to_string())));
        assert_eq!(restored.read_attribute("year"), Some(&Value::Int(1952)));
    }

    #[test]
    fn test_unserialize_rejects_non_objects() {
        let mut record = Record::new();
        assert!(matches!(record.unserialize("[1,2,3]"), Err(OrmError::Serialization(_))));
        assert!(matches!(record.unserialize("{broken"), Err(OrmError::Serialization(_))));
    }

    #[test]
    fn test_unserialize_invalidates_unique_key() {
        let mut record = Record::new();
        record.set_unique_key(BoundClause {
            clause: "\"id\" = ?".to_string(),
            values: vec![Value::Int(1)],
            types: vec![crate::value::bind::PARAM_INT],
        });
        record.unserialize("{\"id\":2}").unwrap();
        assert!(record.unique_key().is_none());
    }

    #[test]
    fn test_hydrate_sets_force_exists_and_remaps() {
        let mut row = HashMap::new();
        row.insert("robots_name".to_string(), Value::String("Astro Boy".to_string()));
        let mut map = HashMap::new();
        map.insert("robots_name".to_string(), "name".to_string());

        let record = Record::hydrate(row, Some(&map)).unwrap();
        assert!(record.force_exists());
        assert_eq!(record.read_attribute("name"), Some(&Value::String("Astro Boy".to_string())));
    }

    #[test]
    fn test_hydrate_unmapped_column_fails() {
        let mut row = HashMap::new();
        row.insert("mystery".to_string(), Value::Int(1));
        let map = HashMap::new();
        assert!(matches!(
            Record::hydrate(row, Some(&map)),
            Err(OrmError::ColumnMap(column)) if column == "mystery"
        ));
    }

    #[test]
    fn test_validate_appends_validator_messages() {
        let mut record = Record::new();
        record.write_attribute("year", 1800i64);

        let passed = record.validate(|record| {
            match record.read_attribute("year") {
                Some(Value::Int(year)) if *year >= 1900 => Vec::new(),
                _ => vec![Message::new(
                    "year must be 1900 or later",
                    Some("year".to_string()),
                    MessageKind::Custom("TooOld".to_string()),
                )],
            }
        });

        assert!(!passed);
        assert!(record.validation_has_failed());
        assert_eq!(record.get_messages()[0].kind, MessageKind::Custom("TooOld".to_string()));
    }

    #[test]
    fn test_messages_accumulate() {
        let mut record = Record::new();
        assert!(!record.validation_has_failed());
        record.append_message(Message::new("name is required", Some("name".to_string()), MessageKind::PresenceOf));
        record.append_message(Message::new("year is required", Some("year".to_string()), MessageKind::PresenceOf));
        assert!(record.validation_has_failed());
        assert_eq!(record.get_messages().len(), 2);
        record.clear_messages();
        assert!(!record.validation_has_failed());
    }
}
