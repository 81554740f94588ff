//! Fluent builder over `FindParams`, bound to one entity type

use std::marker::PhantomData;

use crate::error::OrmResult;
use crate::manager::EntityManager;
use crate::model::Model;
use crate::query::FindParams;
use crate::resultset::{CacheHint, Resultset};
use crate::value::Value;

/// Builder for finder parameters against entity type `M`.
///
/// ```ignore
/// let robots = Criteria::<Robots>::new()
///     .conditions("type = ?0")
///     .bind("mechanical", bind::PARAM_STR)
///     .order_by("name")
///     .limit(20)
///     .execute(&manager)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Criteria<M: Model> {
    params: FindParams,
    _entity: PhantomData<M>,
}

impl<M: Model> Criteria<M> {
    pub fn new() -> Self {
        Self {
            params: FindParams::new(),
            _entity: PhantomData,
        }
    }

    /// Set the condition string, replacing any previous one
    pub fn conditions(mut self, conditions: impl Into<String>) -> Self {
        self.params.conditions = Some(conditions.into());
        self
    }

    /// AND another condition onto the existing ones
    pub fn and_where(mut self, conditions: impl Into<String>) -> Self {
        self.params.conditions = Some(match self.params.conditions.take() {
            Some(existing) => format!("({}) AND ({})", existing, conditions.into()),
            None => conditions.into(),
        });
        self
    }

    /// Append a positional bind value with its type tag
    pub fn bind(mut self, value: impl Into<Value>, bind_type: u32) -> Self {
        self.params.bind.push(value.into());
        self.params.bind_types.push(bind_type);
        self
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.params.columns = Some(columns.into());
        self
    }

    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.params.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.params.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.params.offset = Some(offset);
        self
    }

    pub fn group_by(mut self, group: impl Into<String>) -> Self {
        self.params.group = Some(group.into());
        self
    }

    pub fn distinct(mut self, column: impl Into<String>) -> Self {
        self.params.distinct = Some(column.into());
        self
    }

    /// Column an aggregate finder applies its function to
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.params.column = Some(column.into());
        self
    }

    pub fn cache(mut self, cache: CacheHint) -> Self {
        self.params.cache = Some(cache);
        self
    }

    pub fn build(self) -> FindParams {
        self.params
    }

    pub fn execute(self, manager: &EntityManager) -> OrmResult<Resultset> {
        manager.find::<M>(self.params)
    }

    pub fn execute_first(self, manager: &EntityManager) -> OrmResult<Option<M>>
    where
        M: Default,
    {
        manager.find_first::<M>(self.params)
    }
}
