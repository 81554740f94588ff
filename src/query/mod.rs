//! Finder facade: normalized query parameters, the execution seam and the
//! `find` / `find_first` / aggregate surface on `EntityManager`
//!
//! Query compilation and execution belong to an external collaborator; this
//! module only assembles a `QueryPlan` and hands it to the configured
//! `QueryExecutor`. Aggregates share one builder that projects
//! `FUNC(column) AS alias` and either returns the grouped resultset or
//! unwraps the single scalar.

pub mod criteria;

pub use criteria::Criteria;

use crate::connection::TableRef;
use crate::error::{OrmError, OrmResult};
use crate::manager::EntityManager;
use crate::model::Model;
use crate::resultset::{CacheHint, Resultset};
use crate::value::Value;

/// Normalized finder parameters.
///
/// `conditions` is a raw condition string with positional `?0, ?1, …`
/// placeholders bound from `bind`/`bind_types`.
#[derive(Debug, Clone, Default)]
pub struct FindParams {
    pub conditions: Option<String>,
    pub bind: Vec<Value>,
    pub bind_types: Vec<u32>,
    pub columns: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub group: Option<String>,
    /// Column to project through `DISTINCT`; takes precedence over `group`
    pub distinct: Option<String>,
    /// Column an aggregate function applies to
    pub column: Option<String>,
    pub cache: Option<CacheHint>,
}

impl FindParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single positional condition string, the bare-scalar `find` form
    pub fn conditions(conditions: impl Into<String>) -> Self {
        Self {
            conditions: Some(conditions.into()),
            ..Self::default()
        }
    }

    pub fn bind(mut self, value: impl Into<Value>, bind_type: u32) -> Self {
        self.bind.push(value.into());
        self.bind_types.push(bind_type);
        self
    }
}

impl From<&str> for FindParams {
    fn from(conditions: &str) -> Self {
        FindParams::conditions(conditions)
    }
}

/// A fully-assembled query against one entity type, ready for execution
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub entity: String,
    pub table: TableRef,
    pub params: FindParams,
}

/// Execution seam: compiles and runs a plan, deciding the resultset mode
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, plan: &QueryPlan) -> OrmResult<Resultset>;
}

/// Outcome of an aggregate finder: a lone scalar, or the full resultset
/// when grouping was requested
#[derive(Debug)]
pub enum AggregateResult {
    Scalar(Value),
    Grouped(Resultset),
}

impl AggregateResult {
    /// The scalar value, `None` for a grouped result
    pub fn scalar(self) -> Option<Value> {
        match self {
            AggregateResult::Scalar(value) => Some(value),
            AggregateResult::Grouped(_) => None,
        }
    }
}

impl EntityManager {
    fn plan<M: Model>(&self, params: FindParams) -> QueryPlan {
        QueryPlan {
            entity: M::entity_name().to_string(),
            table: TableRef {
                schema: M::schema(),
                table: M::source(),
            },
            params,
        }
    }

    fn execute(&self, plan: &QueryPlan) -> OrmResult<Resultset> {
        let executor = self
            .executor()
            .ok_or_else(|| OrmError::Configuration("No query executor configured".to_string()))?;
        tracing::debug!(entity = %plan.entity, "executing finder query");
        executor.execute(plan)
    }

    /// Run a filtered query against `M`'s table and return the resultset
    pub fn find<M: Model>(&self, params: impl Into<FindParams>) -> OrmResult<Resultset> {
        let plan = self.plan::<M>(params.into());
        self.execute(&plan)
    }

    /// Like `find` with `limit = 1`, hydrating the first row into `M`
    pub fn find_first<M: Model + Default>(&self, params: impl Into<FindParams>) -> OrmResult<Option<M>> {
        let mut params = params.into();
        params.limit = Some(1);
        let plan = self.plan::<M>(params);
        let mut resultset = self.execute(&plan)?;
        resultset.rewind()?;
        match resultset.current().cloned() {
            Some(row) => {
                let column_map = self.metadata().column_map(M::entity_name())?;
                M::hydrate(row, column_map.as_ref()).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Shared aggregate builder. `distinct` takes precedence over `group`;
    /// grouped queries return the resultset, ungrouped ones unwrap `alias`
    /// from the first row.
    fn group_result<M: Model>(
        &self,
        function: &str,
        alias: &str,
        column: Option<String>,
        mut params: FindParams,
    ) -> OrmResult<AggregateResult> {
        let column = column.unwrap_or_else(|| "*".to_string());
        params.columns = Some(match params.distinct.take() {
            Some(distinct) => format!("{}(DISTINCT {}) AS {}", function, distinct, alias),
            None => match &params.group {
                Some(group) => format!("{}, {}({}) AS {}", group, function, column, alias),
                None => format!("{}({}) AS {}", function, column, alias),
            },
        });
        let grouped = params.group.is_some();
        let plan = self.plan::<M>(params);
        let mut resultset = self.execute(&plan)?;
        if grouped {
            return Ok(AggregateResult::Grouped(resultset));
        }
        resultset.rewind()?;
        let value = resultset
            .current()
            .and_then(|row| row.get(alias).cloned())
            .unwrap_or(Value::Null);
        Ok(AggregateResult::Scalar(value))
    }

    fn aggregate_column(&self, function: &str, params: &FindParams) -> OrmResult<String> {
        params
            .column
            .clone()
            .ok_or_else(|| OrmError::Configuration(format!("The {} aggregate requires a column", function)))
    }

    pub fn count<M: Model>(&self, params: impl Into<FindParams>) -> OrmResult<AggregateResult> {
        let params = params.into();
        let column = params.column.clone();
        self.group_result::<M>("COUNT", "rowcount", column, params)
    }

    pub fn sum<M: Model>(&self, params: impl Into<FindParams>) -> OrmResult<AggregateResult> {
        let params = params.into();
        let column = self.aggregate_column("SUM", &params)?;
        self.group_result::<M>("SUM", "sumatory", Some(column), params)
    }

    pub fn maximum<M: Model>(&self, params: impl Into<FindParams>) -> OrmResult<AggregateResult> {
        let params = params.into();
        let column = self.aggregate_column("MAX", &params)?;
        self.group_result::<M>("MAX", "maximum", Some(column), params)
    }

    pub fn minimum<M: Model>(&self, params: impl Into<FindParams>) -> OrmResult<AggregateResult> {
        let params = params.into();
        let column = self.aggregate_column("MIN", &params)?;
        self.group_result::<M>("MIN", "minimum", Some(column), params)
    }

    pub fn average<M: Model>(&self, params: impl Into<FindParams>) -> OrmResult<AggregateResult> {
        let params = params.into();
        let column = self.aggregate_column("AVG", &params)?;
        self.group_result::<M>("AVG", "average", Some(column), params)
    }

    /// Fetch the rows a registered relation points `model` at.
    ///
    /// The relation's join conditions are bound first; placeholders inside
    /// `params.conditions` continue the positional numbering after them.
    /// Single-row kinds (belongs-to, has-one) force `limit = 1`.
    pub fn get_related<M: Model, R: Model>(
        &self,
        model: &M,
        params: impl Into<FindParams>,
    ) -> OrmResult<Resultset> {
        use crate::relations::RelationKind;

        let relation = self
            .relations()
            .lookup(M::entity_name(), R::entity_name())
            .ok_or_else(|| {
                OrmError::Configuration(format!(
                    "There are no defined relations between '{}' and '{}'",
                    M::entity_name(),
                    R::entity_name()
                ))
            })?;

        let mut joined = Vec::new();
        let mut bind = Vec::new();
        let mut bind_types = Vec::new();
        for (position, (field, referenced_field)) in relation
            .fields
            .iter()
            .zip(relation.referenced_fields.iter())
            .enumerate()
        {
            joined.push(format!("{} = ?{}", referenced_field, position));
            bind.push(model.read_attribute(field).cloned().unwrap_or(Value::Null));
            bind_types.push(crate::value::bind::SKIP);
        }

        let mut params = params.into();
        let mut conditions = joined.join(" AND ");
        if let Some(extra) = params.conditions.take() {
            conditions = format!("({}) AND ({})", conditions, extra);
        }
        bind.extend(params.bind.drain(..));
        bind_types.extend(params.bind_types.drain(..));
        params.conditions = Some(conditions);
        params.bind = bind;
        params.bind_types = bind_types;
        if relation.kind != RelationKind::HasMany {
            params.limit = Some(1);
        }

        let plan = QueryPlan {
            entity: R::entity_name().to_string(),
            table: relation.referenced_table.clone(),
            params,
        };
        self.execute(&plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::bind;

    #[test]
    fn test_bare_string_becomes_single_condition() {
        let params: FindParams = "type = ?0".into();
        assert_eq!(params.conditions.as_deref(), Some("type = ?0"));
        assert!(params.bind.is_empty());
    }

    #[test]
    fn test_bind_pairs_value_with_type() {
        let params = FindParams::conditions("year > ?0").bind(1950i64, bind::PARAM_INT);
        assert_eq!(params.bind, vec![Value::Int(1950)]);
        assert_eq!(params.bind_types, vec![bind::PARAM_INT]);
    }

    #[test]
    fn test_scalar_unwraps_only_ungrouped() {
        assert_eq!(AggregateResult::Scalar(Value::Int(3)).scalar(), Some(Value::Int(3)));
        let grouped = AggregateResult::Grouped(Resultset::from_rows(Vec::new()));
        assert!(grouped.scalar().is_none());
    }
}
