//! Virtual-foreign-key integrity checks
//!
//! Forward (on save): every belongs-to relation carrying a foreign-key rule
//! must point at an existing referenced row. Reverse (on delete): no
//! has-one/has-many relation with a rule may still have dependent rows.
//! Forward checks stop at the first violation; this asymmetry with the
//! aggregating not-null validator is deliberate and kept.

use crate::error::OrmResult;
use crate::events::LifecycleEvent;
use crate::manager::EntityManager;
use crate::message::{Message, MessageKind};
use crate::model::Model;
use crate::relations::Relation;
use crate::value::{bind, Value};

/// Positional lookup conditions against the relation's referenced table,
/// with the declaring entity's current field values bound in order.
/// Returns `None` when a single-field relation has no value to check.
fn lookup_conditions<M: Model>(model: &M, relation: &Relation) -> Option<(String, Vec<Value>, Vec<u32>)> {
    let mut fragments = Vec::with_capacity(relation.fields.len());
    let mut values = Vec::with_capacity(relation.fields.len());
    let mut types = Vec::with_capacity(relation.fields.len());
    for (position, (field, referenced_field)) in relation
        .fields
        .iter()
        .zip(relation.referenced_fields.iter())
        .enumerate()
    {
        let value = model.read_attribute(field).cloned().unwrap_or(Value::Null);
        // A single-field relation with an empty value has nothing to check
        if relation.fields.len() == 1 && value.is_empty() {
            return None;
        }
        fragments.push(format!("{} = ?{}", referenced_field, position));
        values.push(value);
        types.push(bind::SKIP);
    }
    let mut clause = fragments.join(" AND ");
    if let Some(rule) = &relation.foreign_key {
        if let Some(extra) = &rule.conditions {
            clause = format!("({}) AND ({})", clause, extra);
        }
    }
    Some((clause, values, types))
}

impl EntityManager {
    /// Count rows in the relation's referenced table matching `clause`
    fn count_referenced<M: Model>(
        &self,
        model: &M,
        relation: &Relation,
        clause: &str,
        values: &[Value],
        types: &[u32],
    ) -> OrmResult<bool> {
        let connection = self.connection_for(model)?;
        let sql = format!(
            "SELECT COUNT(*) AS rowcount FROM {} WHERE {}",
            relation.referenced_table.escaped(connection.as_ref()),
            clause
        );
        let row = connection.fetch_one(&sql, values, types)?;
        Ok(row
            .and_then(|row| row.get("rowcount").cloned())
            .map(|count| !count.is_empty())
            .unwrap_or(false))
    }

    /// Forward check on save: every enforced belongs-to relation must point
    /// at an existing row. Stops at the first violating relation.
    pub(crate) fn check_foreign_keys<M: Model>(&self, model: &mut M, events_enabled: bool) -> OrmResult<bool> {
        let relations = self.relations().belongs_to(M::entity_name());
        for relation in &relations {
            let Some(rule) = &relation.foreign_key else {
                continue;
            };
            let Some((clause, values, types)) = lookup_conditions(model, relation) else {
                continue;
            };
            if self.count_referenced(model, relation, &clause, &values, &types)? {
                continue;
            }

            let field_list = relation.fields.join(", ");
            let text = rule.message.clone().unwrap_or_else(|| {
                format!("Value of field \"{}\" does not exist on referenced table", field_list)
            });
            tracing::debug!(
                entity = M::entity_name(),
                referenced = %relation.referenced_entity,
                "foreign key violated on save"
            );
            model
                .record_mut()
                .append_message(Message::new(text, Some(field_list), MessageKind::ConstraintViolation));
            self.fire_notification(model, LifecycleEvent::OnValidationFails, events_enabled);
            self.cancel_operation(model, events_enabled);
            return Ok(false);
        }
        Ok(true)
    }

    /// Reverse check on delete: any dependent row behind an enforced
    /// has-one/has-many relation blocks the deletion
    pub(crate) fn check_foreign_keys_reverse<M: Model>(
        &self,
        model: &mut M,
        events_enabled: bool,
    ) -> OrmResult<bool> {
        let relations = self.relations().has_one_and_has_many(M::entity_name());
        for relation in &relations {
            let Some(rule) = &relation.foreign_key else {
                continue;
            };
            let Some((clause, values, types)) = lookup_conditions(model, relation) else {
                continue;
            };
            if !self.count_referenced(model, relation, &clause, &values, &types)? {
                continue;
            }

            let text = rule
                .message
                .clone()
                .unwrap_or_else(|| format!("Record is referenced by model {}", relation.referenced_entity));
            tracing::debug!(
                entity = M::entity_name(),
                referenced = %relation.referenced_entity,
                "dependent rows block delete"
            );
            model.record_mut().append_message(Message::new(
                text,
                Some(relation.fields.join(", ")),
                MessageKind::ConstraintViolation,
            ));
            self.fire_notification(model, LifecycleEvent::OnValidationFails, events_enabled);
            self.cancel_operation(model, events_enabled);
            return Ok(false);
        }
        Ok(true)
    }
}
