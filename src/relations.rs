//! Relation declarations and the relation registry
//!
//! Relations are declared once per entity type and stored in a concurrent
//! registry. A relation optionally carries a virtual-foreign-key rule; those
//! are enforced during save (belongs-to, forward) and delete (has-one /
//! has-many, reverse).

use dashmap::DashMap;

use crate::connection::TableRef;
use crate::model::Model;

/// Declared association kinds between entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
}

/// Virtual-foreign-key enforcement rule attached to a relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeignKeyRule {
    /// Extra condition appended to the referenced-model lookup
    pub conditions: Option<String>,
    /// Custom violation message replacing the generated one
    pub message: Option<String>,
}

impl ForeignKeyRule {
    pub fn enforced() -> Self {
        Self::default()
    }

    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A declared association from one entity type to another
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub kind: RelationKind,
    /// Attribute(s) on the declaring entity (single or composite)
    pub fields: Vec<String>,
    /// Metadata key of the referenced entity type
    pub referenced_entity: String,
    /// Table identity of the referenced entity, captured at declaration
    pub referenced_table: TableRef,
    /// Attribute(s) on the referenced entity, positionally matching `fields`
    pub referenced_fields: Vec<String>,
    /// Present when the relation enforces a virtual foreign key
    pub foreign_key: Option<ForeignKeyRule>,
}

impl Relation {
    fn new<R: Model>(kind: RelationKind, fields: &[&str], referenced_fields: &[&str]) -> Self {
        Self {
            kind,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            referenced_entity: R::entity_name().to_string(),
            referenced_table: TableRef {
                schema: R::schema(),
                table: R::source(),
            },
            referenced_fields: referenced_fields.iter().map(|f| f.to_string()).collect(),
            foreign_key: None,
        }
    }

    pub fn belongs_to<R: Model>(fields: &[&str], referenced_fields: &[&str]) -> Self {
        Self::new::<R>(RelationKind::BelongsTo, fields, referenced_fields)
    }

    pub fn has_one<R: Model>(fields: &[&str], referenced_fields: &[&str]) -> Self {
        Self::new::<R>(RelationKind::HasOne, fields, referenced_fields)
    }

    pub fn has_many<R: Model>(fields: &[&str], referenced_fields: &[&str]) -> Self {
        Self::new::<R>(RelationKind::HasMany, fields, referenced_fields)
    }

    /// Enforce this relation as a virtual foreign key
    pub fn with_foreign_key(mut self, rule: ForeignKeyRule) -> Self {
        self.foreign_key = Some(rule);
        self
    }
}

/// Registry of has-one / has-many / belongs-to declarations per entity type
#[derive(Default)]
pub struct RelationRegistry {
    relations: DashMap<String, Vec<Relation>>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation declared by entity type `M`
    pub fn add<M: Model>(&self, relation: Relation) {
        self.relations
            .entry(M::entity_name().to_string())
            .or_default()
            .push(relation);
    }

    pub fn belongs_to(&self, entity: &str) -> Vec<Relation> {
        self.of_kinds(entity, &[RelationKind::BelongsTo])
    }

    pub fn has_one_and_has_many(&self, entity: &str) -> Vec<Relation> {
        self.of_kinds(entity, &[RelationKind::HasOne, RelationKind::HasMany])
    }

    fn of_kinds(&self, entity: &str, kinds: &[RelationKind]) -> Vec<Relation> {
        self.relations
            .get(entity)
            .map(|list| {
                list.iter()
                    .filter(|r| kinds.contains(&r.kind))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn exists_belongs_to(&self, from: &str, to: &str) -> bool {
        self.exists(from, to, RelationKind::BelongsTo)
    }

    pub fn exists_has_one(&self, from: &str, to: &str) -> bool {
        self.exists(from, to, RelationKind::HasOne)
    }

    pub fn exists_has_many(&self, from: &str, to: &str) -> bool {
        self.exists(from, to, RelationKind::HasMany)
    }

    fn exists(&self, from: &str, to: &str, kind: RelationKind) -> bool {
        self.relations
            .get(from)
            .map(|list| list.iter().any(|r| r.kind == kind && r.referenced_entity == to))
            .unwrap_or(false)
    }

    /// First declared relation from `from` to `to`, regardless of kind
    pub fn lookup(&self, from: &str, to: &str) -> Option<Relation> {
        self.relations
            .get(from)
            .and_then(|list| list.iter().find(|r| r.referenced_entity == to).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelHooks, Record};

    #[derive(Debug, Default)]
    struct Part {
        record: Record,
    }

    impl ModelHooks for Part {}

    impl Model for Part {
        fn entity_name() -> &'static str {
            "Part"
        }

        fn record(&self) -> &Record {
            &self.record
        }

        fn record_mut(&mut self) -> &mut Record {
            &mut self.record
        }
    }

    #[derive(Debug, Default)]
    struct Robot {
        record: Record,
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
    }

    #[test]
    fn test_registry_lookup_by_kind() {
        let registry = RelationRegistry::new();
        registry.add::<Part>(
            Relation::belongs_to::<Robot>(&["robot_id"], &["id"])
                .with_foreign_key(ForeignKeyRule::enforced()),
        );
        registry.add::<Robot>(Relation::has_many::<Part>(&["id"], &["robot_id"]));

        assert_eq!(registry.belongs_to("Part").len(), 1);
        assert!(registry.belongs_to("Part")[0].foreign_key.is_some());
        assert_eq!(registry.has_one_and_has_many("Robot").len(), 1);
        assert!(registry.belongs_to("Robot").is_empty());

        assert!(registry.exists_belongs_to("Part", "Robot"));
        assert!(registry.exists_has_many("Robot", "Part"));
        assert!(!registry.exists_has_one("Robot", "Part"));
    }

    #[test]
    fn test_relation_captures_referenced_table() {
        let relation = Relation::belongs_to::<Robot>(&["robot_id"], &["id"]);
        assert_eq!(relation.referenced_table, TableRef::new("robot"));
        assert_eq!(relation.referenced_entity, "Robot");
    }
}
