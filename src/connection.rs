//! Database connection capability contract
//!
//! The core never talks to a driver directly. It consumes the `Connection`
//! trait, which abstracts parameter binding, identifier escaping and the
//! four low-level DML primitives. Concrete adapters live outside this crate.

use std::collections::HashMap;

use crate::error::OrmResult;
use crate::value::Value;

/// A raw row as returned by the connection: column name to value
pub type Row = HashMap<String, Value>;

/// A table reference with an optional schema qualifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    /// Escape the reference through the connection, `schema.table` when qualified
    pub fn escaped(&self, connection: &dyn Connection) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                connection.escape_identifier(schema),
                connection.escape_identifier(&self.table)
            ),
            None => connection.escape_identifier(&self.table),
        }
    }
}

/// A WHERE-clause fragment with its bound values and bind types.
///
/// The unique-key triple cached on every record has this shape, and the
/// update/delete primitives take their conditions in it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundClause {
    pub clause: String,
    pub values: Vec<Value>,
    pub types: Vec<u32>,
}

/// Capability contract consumed from the low-level database adapter
pub trait Connection: Send + Sync {
    /// Escape a single identifier (table, schema or column name)
    fn escape_identifier(&self, identifier: &str) -> String;

    /// Execute a parameterized SELECT and return the first row, if any
    fn fetch_one(&self, sql: &str, values: &[Value], types: &[u32]) -> OrmResult<Option<Row>>;

    /// Insert a row; `values[i]` is bound for `fields[i]` with tag `types[i]`
    fn insert(
        &self,
        table: &TableRef,
        values: Vec<Value>,
        fields: Vec<String>,
        types: Vec<u32>,
    ) -> OrmResult<bool>;

    /// Update the rows matched by `conditions`, setting `fields[i] = values[i]`
    fn update(
        &self,
        table: &TableRef,
        fields: Vec<String>,
        values: Vec<Value>,
        types: Vec<u32>,
        conditions: &BoundClause,
    ) -> OrmResult<bool>;

    /// Delete the rows matched by `conditions`
    fn delete(&self, table: &TableRef, conditions: &BoundClause) -> OrmResult<bool>;

    /// Whether the underlying engine generates identity values from sequences
    fn supports_sequences(&self) -> bool;

    /// Last generated identity value, optionally for a named sequence
    fn last_insert_id(&self, sequence: Option<&str>) -> OrmResult<Value>;

    /// Sentinel the engine understands as "use the column default" for identity columns
    fn default_id_value(&self) -> Value;
}
