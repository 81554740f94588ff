//! Entity manager: the orchestration hub for persistence
//!
//! The manager owns the capability collaborators (connections, metadata,
//! relation registry, optional event dispatcher and query executor) and
//! carries the save/delete state machines. Entities stay plain data; every
//! operation is a method on the manager taking the entity by reference.
//!
//! Collaborators are injected explicitly at construction. There is no
//! service container: each component receives only the capability
//! interfaces it needs.

mod integrity;
mod persist;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::{OrmError, OrmResult};
use crate::events::{EventDispatcher, LifecycleEvent};
use crate::metadata::MetadataProvider;
use crate::model::{invoke_cancellable, invoke_notification, Model, Operation};
use crate::query::QueryExecutor;
use crate::relations::RelationRegistry;

/// Orchestrates persistence for all registered entity types
pub struct EntityManager {
    connections: HashMap<String, Arc<dyn Connection>>,
    metadata: Arc<dyn MetadataProvider>,
    relations: Arc<RelationRegistry>,
    events: Option<Arc<dyn EventDispatcher>>,
    executor: Option<Arc<dyn QueryExecutor>>,
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut services: Vec<&str> = self.connections.keys().map(String::as_str).collect();
        services.sort_unstable();
        f.debug_struct("EntityManager")
            .field("connections", &services)
            .field("has_events", &self.events.is_some())
            .field("has_executor", &self.executor.is_some())
            .finish_non_exhaustive()
    }
}

impl EntityManager {
    pub fn builder() -> EntityManagerBuilder {
        EntityManagerBuilder::default()
    }

    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    pub fn relations(&self) -> &RelationRegistry {
        self.relations.as_ref()
    }

    pub(crate) fn executor(&self) -> Option<&dyn QueryExecutor> {
        self.executor.as_deref()
    }

    /// Resolve the connection an entity persists through, honoring the
    /// per-instance service override (e.g. a transaction-scoped connection)
    pub(crate) fn connection_for<M: Model>(&self, model: &M) -> OrmResult<Arc<dyn Connection>> {
        let service = model
            .record()
            .connection_service_override()
            .unwrap_or(M::connection_service());
        self.connections
            .get(service)
            .cloned()
            .ok_or_else(|| OrmError::Configuration(format!("Connection service '{}' is not registered", service)))
    }

    /// Offer a cancellable event to the entity's hook, then the dispatcher;
    /// `false` from either side vetoes
    pub(crate) fn fire_cancellable<M: Model>(
        &self,
        model: &mut M,
        event: LifecycleEvent,
        events_enabled: bool,
    ) -> bool {
        if !events_enabled {
            return true;
        }
        if !invoke_cancellable(model, event) {
            tracing::debug!(event = event.as_str(), entity = M::entity_name(), "hook vetoed operation");
            return false;
        }
        match &self.events {
            Some(dispatcher) => dispatcher.fire(event, model.record()),
            None => true,
        }
    }

    /// Fire a notification-only event at the hook and the dispatcher
    pub(crate) fn fire_notification<M: Model>(
        &self,
        model: &mut M,
        event: LifecycleEvent,
        events_enabled: bool,
    ) {
        if !events_enabled {
            return;
        }
        invoke_notification(model, event);
        if let Some(dispatcher) = &self.events {
            dispatcher.fire(event, model.record());
        }
    }

    /// Single exit path for validation failures: notifies `notDeleted` for
    /// a pending delete, `notSaved` otherwise
    pub(crate) fn cancel_operation<M: Model>(&self, model: &mut M, events_enabled: bool) {
        let event = match model.record().operation_made() {
            Operation::Delete => LifecycleEvent::NotDeleted,
            _ => LifecycleEvent::NotSaved,
        };
        self.fire_notification(model, event, events_enabled);
    }

    /// Declare attributes the engine fills on insert; they are skipped by
    /// the insert field loop
    pub fn skip_attributes_on_create<M: Model>(&self, names: &[&str]) -> OrmResult<()> {
        let set: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
        self.metadata.set_automatic_create_attributes(M::entity_name(), set)
    }

    /// Declare attributes the engine fills on update
    pub fn skip_attributes_on_update<M: Model>(&self, names: &[&str]) -> OrmResult<()> {
        let set: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
        self.metadata.set_automatic_update_attributes(M::entity_name(), set)
    }

    /// Declare attributes skipped on both insert and update
    pub fn skip_attributes<M: Model>(&self, names: &[&str]) -> OrmResult<()> {
        self.skip_attributes_on_create::<M>(names)?;
        self.skip_attributes_on_update::<M>(names)
    }
}

/// Builder for `EntityManager`; metadata and at least one connection are
/// required, everything else optional
#[derive(Default)]
pub struct EntityManagerBuilder {
    connections: HashMap<String, Arc<dyn Connection>>,
    metadata: Option<Arc<dyn MetadataProvider>>,
    relations: Option<Arc<RelationRegistry>>,
    events: Option<Arc<dyn EventDispatcher>>,
    executor: Option<Arc<dyn QueryExecutor>>,
}

impl EntityManagerBuilder {
    /// Register a named connection service; entities select theirs through
    /// `Model::connection_service` (default `"db"`)
    pub fn connection(mut self, service: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        self.connections.insert(service.into(), connection);
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn relations(mut self, relations: Arc<RelationRegistry>) -> Self {
        self.relations = Some(relations);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> OrmResult<EntityManager> {
        let metadata = self
            .metadata
            .ok_or_else(|| OrmError::Configuration("A metadata provider is required".to_string()))?;
        if self.connections.is_empty() {
            return Err(OrmError::Configuration("At least one connection service is required".to_string()));
        }
        Ok(EntityManager {
            connections: self.connections,
            metadata,
            relations: self.relations.unwrap_or_default(),
            events: self.events,
            executor: self.executor,
        })
    }
}

/// Convenience surface letting entities persist themselves through a manager
pub trait ModelOps: Model {
    fn save(&mut self, manager: &EntityManager) -> OrmResult<bool> {
        manager.save(self)
    }

    fn create(&mut self, manager: &EntityManager) -> OrmResult<bool> {
        manager.create(self)
    }

    fn update(&mut self, manager: &EntityManager) -> OrmResult<bool> {
        manager.update(self)
    }

    fn delete(&mut self, manager: &EntityManager) -> OrmResult<bool> {
        manager.delete(self)
    }
}

impl<M: Model> ModelOps for M {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InMemoryMetadata;

    #[test]
    fn test_builder_requires_metadata_and_connection() {
        let err = EntityManager::builder().build().unwrap_err();
        assert!(matches!(err, OrmError::Configuration(_)));

        let err = EntityManager::builder()
            .metadata(Arc::new(InMemoryMetadata::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, OrmError::Configuration(_)));
    }
}
