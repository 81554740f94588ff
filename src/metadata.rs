//! Entity metadata capability contract and the in-memory provider
//!
//! Metadata answers per-entity-type schema questions: attribute order,
//! primary keys, nullability, bind types and the column↔attribute map. The
//! core treats the provider as a read-mostly cache keyed by entity name.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;

use crate::error::{OrmError, OrmResult};

/// Read-mostly schema introspection contract consumed by the persistence core
pub trait MetadataProvider: Send + Sync {
    /// All attributes in declared column order
    fn attributes(&self, entity: &str) -> OrmResult<Vec<String>>;

    /// Primary-key attributes in declared order
    fn primary_key_attributes(&self, entity: &str) -> OrmResult<Vec<String>>;

    /// Attributes that are not part of the primary key, in declared order
    fn non_primary_key_attributes(&self, entity: &str) -> OrmResult<Vec<String>>;

    /// Attributes declared NOT NULL
    fn not_null_attributes(&self, entity: &str) -> OrmResult<Vec<String>>;

    /// Attributes with a numeric column type
    fn numeric_attributes(&self, entity: &str) -> OrmResult<HashSet<String>>;

    /// Bind-type tag per column
    fn bind_types(&self, entity: &str) -> OrmResult<HashMap<String, u32>>;

    /// Column-name to attribute-name map, when the entity renames columns
    fn column_map(&self, entity: &str) -> OrmResult<Option<HashMap<String, String>>>;

    /// Attributes filled by the engine on insert (for example creation timestamps)
    fn automatic_create_attributes(&self, entity: &str) -> OrmResult<HashSet<String>>;

    /// Attributes filled by the engine on update
    fn automatic_update_attributes(&self, entity: &str) -> OrmResult<HashSet<String>>;

    /// The auto-generated identity column, if the entity has one
    fn identity_field(&self, entity: &str) -> OrmResult<Option<String>>;

    fn set_automatic_create_attributes(&self, entity: &str, attributes: HashSet<String>) -> OrmResult<()>;

    fn set_automatic_update_attributes(&self, entity: &str, attributes: HashSet<String>) -> OrmResult<()>;
}

/// Schema descriptor for one entity type
#[derive(Debug, Clone, Default)]
pub struct EntityMeta {
    pub attributes: Vec<String>,
    pub primary_key: Vec<String>,
    pub not_null: Vec<String>,
    pub numeric: HashSet<String>,
    pub bind_types: HashMap<String, u32>,
    pub column_map: Option<HashMap<String, String>>,
    pub automatic_create: HashSet<String>,
    pub automatic_update: HashSet<String>,
    pub identity: Option<String>,
}

impl EntityMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute with its bind type, preserving declaration order
    pub fn attribute(mut self, name: &str, bind_type: u32) -> Self {
        self.attributes.push(name.to_string());
        self.bind_types.insert(name.to_string(), bind_type);
        self
    }

    pub fn primary_key(mut self, names: &[&str]) -> Self {
        self.primary_key = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn not_null(mut self, names: &[&str]) -> Self {
        self.not_null = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn numeric(mut self, names: &[&str]) -> Self {
        self.numeric = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn identity(mut self, name: &str) -> Self {
        self.identity = Some(name.to_string());
        self
    }

    /// Map database column names to application attribute names
    pub fn column_map(mut self, map: &[(&str, &str)]) -> Self {
        self.column_map = Some(
            map.iter()
                .map(|(column, attribute)| (column.to_string(), attribute.to_string()))
                .collect(),
        );
        self
    }

    pub fn automatic_on_create(mut self, names: &[&str]) -> Self {
        self.automatic_create = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn automatic_on_update(mut self, names: &[&str]) -> Self {
        self.automatic_update = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

/// In-memory metadata provider backed by a concurrent map
#[derive(Default)]
pub struct InMemoryMetadata {
    entries: DashMap<String, EntityMeta>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the descriptor for an entity type, replacing any previous one
    pub fn register(&self, entity: &str, meta: EntityMeta) {
        self.entries.insert(entity.to_string(), meta);
    }

    fn with_meta<T>(&self, entity: &str, f: impl FnOnce(&EntityMeta) -> T) -> OrmResult<T> {
        self.entries
            .get(entity)
            .map(|meta| f(meta.value()))
            .ok_or_else(|| OrmError::Configuration(format!("No metadata registered for entity '{}'", entity)))
    }
}

impl MetadataProvider for InMemoryMetadata {
    fn attributes(&self, entity: &str) -> OrmResult<Vec<String>> {
        self.with_meta(entity, |m| m.attributes.clone())
    }

    fn primary_key_attributes(&self, entity: &str) -> OrmResult<Vec<String>> {
        self.with_meta(entity, |m| m.primary_key.clone())
    }

    fn non_primary_key_attributes(&self, entity: &str) -> OrmResult<Vec<String>> {
        self.with_meta(entity, |m| {
            m.attributes
                .iter()
                .filter(|a| !m.primary_key.contains(a))
                .cloned()
                .collect()
        })
    }

    fn not_null_attributes(&self, entity: &str) -> OrmResult<Vec<String>> {
        self.with_meta(entity, |m| m.not_null.clone())
    }

    fn numeric_attributes(&self, entity: &str) -> OrmResult<HashSet<String>> {
        self.with_meta(entity, |m| m.numeric.clone())
    }

    fn bind_types(&self, entity: &str) -> OrmResult<HashMap<String, u32>> {
        self.with_meta(entity, |m| m.bind_types.clone())
    }

    fn column_map(&self, entity: &str) -> OrmResult<Option<HashMap<String, String>>> {
        self.with_meta(entity, |m| m.column_map.clone())
    }

    fn automatic_create_attributes(&self, entity: &str) -> OrmResult<HashSet<String>> {
        self.with_meta(entity, |m| m.automatic_create.clone())
    }

    fn automatic_update_attributes(&self, entity: &str) -> OrmResult<HashSet<String>> {
        self.with_meta(entity, |m| m.automatic_update.clone())
    }

    fn identity_field(&self, entity: &str) -> OrmResult<Option<String>> {
        self.with_meta(entity, |m| m.identity.clone())
    }

    fn set_automatic_create_attributes(&self, entity: &str, attributes: HashSet<String>) -> OrmResult<()> {
        let mut entry = self
            .entries
            .get_mut(entity)
            .ok_or_else(|| OrmError::Configuration(format!("No metadata registered for entity '{}'", entity)))?;
        entry.automatic_create = attributes;
        Ok(())
    }

    fn set_automatic_update_attributes(&self, entity: &str, attributes: HashSet<String>) -> OrmResult<()> {
        let mut entry = self
            .entries
            .get_mut(entity)
            .ok_or_else(|| OrmError::Configuration(format!("No metadata registered for entity '{}'", entity)))?;
        entry.automatic_update = attributes;
        Ok(())
    }
}
