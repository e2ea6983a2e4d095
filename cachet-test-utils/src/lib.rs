//! Cachet Test Utilities
//!
//! Centralized test infrastructure for the Cachet workspace:
//! - `RowQuery`, a query builder over in-memory JSON rows
//! - Instrumented cache stores (counting, always failing)
//! - Proptest generators for canonical queries and operation names
//! - Fixtures for the common "orders" scenarios
//! - Custom assertions for Cachet error variants

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use cachet_core::{
    CacheDirective, CacheDuration, CacheError, CacheSettings, CachetError, CachetResult,
    CanonicalQuery, ConfigError, Entity, EntityDescriptor, QueryError, RememberMode,
};
pub use cachet_repository::{
    normalize, Dispatched, QueryBuilder, Repository, RepositoryFactory, ResultContract, Step,
};
pub use cachet_storage::{
    CacheExecutor, CacheKey, CacheStats, CacheStore, MemoryStore, StoreRegistry,
};

// ============================================================================
// FILTERS
// ============================================================================

/// Comparison applied by a [`FilterExpr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
    /// In list of values
    In,
    /// Not in list of values
    NotIn,
    /// Field missing or null
    Null,
    /// Field present and not null
    NotNull,
}

impl FilterOperator {
    /// Parse a comparison symbol as written in `where(field, op, value)`.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            _ => None,
        }
    }
}

/// One filter over a row field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(&self.field).unwrap_or(&Value::Null);
        match self.operator {
            FilterOperator::Eq => values_equal(field, &self.value),
            FilterOperator::Ne => !values_equal(field, &self.value),
            FilterOperator::Gt => compare(field, &self.value) == Some(CmpOrdering::Greater),
            FilterOperator::Lt => compare(field, &self.value) == Some(CmpOrdering::Less),
            FilterOperator::Gte => matches!(
                compare(field, &self.value),
                Some(CmpOrdering::Greater | CmpOrdering::Equal)
            ),
            FilterOperator::Lte => matches!(
                compare(field, &self.value),
                Some(CmpOrdering::Less | CmpOrdering::Equal)
            ),
            FilterOperator::In => self
                .value
                .as_array()
                .is_some_and(|list| list.iter().any(|v| values_equal(field, v))),
            FilterOperator::NotIn => self
                .value
                .as_array()
                .is_some_and(|list| !list.iter().any(|v| values_equal(field, v))),
            FilterOperator::Null => field.is_null(),
            FilterOperator::NotNull => !field.is_null(),
        }
    }
}

/// Numbers compare by value so `5` matches `5.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<CmpOrdering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order for sorting: nulls first, then by [`compare`].
fn sort_order(a: &Value, b: &Value) -> CmpOrdering {
    match (a.is_null(), b.is_null()) {
        (true, true) => CmpOrdering::Equal,
        (true, false) => CmpOrdering::Less,
        (false, true) => CmpOrdering::Greater,
        (false, false) => compare(a, b).unwrap_or(CmpOrdering::Equal),
    }
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

// ============================================================================
// ROW TABLE
// ============================================================================

/// Rows and canned raw-query answers backing a [`RowQuery`].
#[derive(Debug, Clone, Default)]
pub struct RowTable {
    rows: Vec<Value>,
    raw: HashMap<String, Value>,
}

impl RowTable {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            raw: HashMap::new(),
        }
    }

    /// Answer `query` (compared after trimming) with `result`.
    pub fn with_raw(mut self, query: &str, result: Value) -> Self {
        self.raw.insert(query.trim().to_string(), result);
        self
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }
}

// ============================================================================
// ROW QUERY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Asc,
    Desc,
}

/// Fluent query builder over a [`RowTable`].
///
/// Supports the filtering, ordering, limiting and projection operations
/// and the common terminals. Every execution (builder or raw) bumps a
/// counter shared by all clones, so tests can observe how often the data
/// source was reached.
///
/// Declared contracts, for routing tests:
/// - `paid` (self type): `where("status", "paid")`
/// - `revenue` (value): sum of `total`
/// - `summary` (ambiguous): `{count, revenue}`
/// - `lockForUpdate` (nested query type): no-op continuation
#[derive(Debug, Clone)]
pub struct RowQuery {
    entity: EntityDescriptor,
    table: Arc<RowTable>,
    executions: Arc<AtomicUsize>,
    query: CanonicalQuery,
    filters: Vec<FilterExpr>,
    order: Vec<(String, Direction)>,
    offset: usize,
    limit: Option<usize>,
    columns: Option<Vec<String>>,
}

impl RowQuery {
    pub fn new(entity: EntityDescriptor, table: RowTable) -> Self {
        Self {
            query: CanonicalQuery::new(entity.path()),
            entity,
            table: Arc::new(table),
            executions: Arc::new(AtomicUsize::new(0)),
            filters: Vec::new(),
            order: Vec::new(),
            offset: 0,
            limit: None,
            columns: None,
        }
    }

    /// Number of executions against the table, across all clones.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn filters(&self) -> &[FilterExpr] {
        &self.filters
    }

    fn unknown(&self, operation: &str) -> CachetError {
        QueryError::UnknownOperation {
            operation: operation.to_string(),
            entity: self.entity.to_string(),
        }
        .into()
    }

    fn failed(operation: &str, reason: impl Into<String>) -> CachetError {
        QueryError::ExecutionFailed {
            operation: operation.to_string(),
            reason: reason.into(),
        }
        .into()
    }

    fn field_arg<'a>(operation: &str, arguments: &'a [Value], index: usize) -> CachetResult<&'a str> {
        arguments
            .get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| Self::failed(operation, format!("argument {index} must be a field name")))
    }

    fn count_arg(operation: &str, arguments: &[Value], index: usize) -> CachetResult<usize> {
        arguments
            .get(index)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| Self::failed(operation, format!("argument {index} must be a count")))
    }

    /// `(field, value)` or `(field, op, value)`.
    fn comparison(operation: &str, arguments: &[Value]) -> CachetResult<FilterExpr> {
        let field = Self::field_arg(operation, arguments, 0)?;
        match arguments {
            [_, value] => Ok(FilterExpr::eq(field, value.clone())),
            [_, Value::String(symbol), value] => {
                let operator = FilterOperator::from_symbol(symbol)
                    .ok_or_else(|| Self::failed(operation, format!("unknown comparison {symbol:?}")))?;
                Ok(FilterExpr::new(field, operator, value.clone()))
            }
            _ => Err(Self::failed(operation, "expected (field, value) or (field, op, value)")),
        }
    }

    fn matching_rows(&self) -> Vec<Value> {
        let mut rows: Vec<Value> = self
            .table
            .rows
            .iter()
            .filter(|row| self.filters.iter().all(|f| f.matches(row)))
            .cloned()
            .collect();

        if !self.order.is_empty() {
            rows.sort_by(|a, b| {
                for (field, direction) in &self.order {
                    let left = a.get(field).unwrap_or(&Value::Null);
                    let right = b.get(field).unwrap_or(&Value::Null);
                    let ordering = match direction {
                        Direction::Asc => sort_order(left, right),
                        Direction::Desc => sort_order(right, left),
                    };
                    if ordering != CmpOrdering::Equal {
                        return ordering;
                    }
                }
                CmpOrdering::Equal
            });
        }

        rows.into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }

    fn project(&self, row: Value) -> Value {
        match (&self.columns, row) {
            (Some(columns), Value::Object(map)) => Value::Object(
                map.into_iter()
                    .filter(|(k, _)| columns.iter().any(|c| c == k))
                    .collect(),
            ),
            (_, row) => row,
        }
    }

    fn column_values(&self, column: &str) -> Vec<Value> {
        self.matching_rows()
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }

    fn numbers(&self, column: &str) -> Vec<f64> {
        self.column_values(column)
            .iter()
            .filter_map(Value::as_f64)
            .collect()
    }

    fn by_id(&self, id: &Value) -> Option<Value> {
        let mut scoped = self.clone();
        scoped.filters.push(FilterExpr::eq("id", id.clone()));
        scoped.matching_rows().into_iter().next().map(|r| self.project(r))
    }

    fn first_row(&self) -> Value {
        self.matching_rows()
            .into_iter()
            .next()
            .map(|r| self.project(r))
            .unwrap_or(Value::Null)
    }

    fn run(&self, operation: &str, arguments: &[Value]) -> CachetResult<Value> {
        match normalize(operation).as_str() {
            "get" | "all" => Ok(Value::Array(
                self.matching_rows().into_iter().map(|r| self.project(r)).collect(),
            )),
            "first" => Ok(self.first_row()),
            "find" => {
                let id = arguments.first().ok_or_else(|| Self::failed(operation, "missing id"))?;
                Ok(self.by_id(id).unwrap_or(Value::Null))
            }
            "findmany" => {
                let ids = arguments
                    .first()
                    .and_then(Value::as_array)
                    .ok_or_else(|| Self::failed(operation, "expected a list of ids"))?;
                Ok(Value::Array(ids.iter().filter_map(|id| self.by_id(id)).collect()))
            }
            "findorfail" => {
                let id = arguments.first().ok_or_else(|| Self::failed(operation, "missing id"))?;
                self.by_id(id)
                    .ok_or_else(|| Self::failed(operation, format!("no {} with id {}", self.entity, id)))
            }
            "firstwhere" => {
                let mut scoped = self.clone();
                scoped.filters.push(Self::comparison(operation, arguments)?);
                Ok(scoped.first_row())
            }
            "sole" => {
                let rows = self.matching_rows();
                match rows.len() {
                    1 => Ok(rows.into_iter().next().map(|r| self.project(r)).unwrap_or(Value::Null)),
                    n => Err(Self::failed(operation, format!("expected exactly one row, found {n}"))),
                }
            }
            "value" => {
                let column = Self::field_arg(operation, arguments, 0)?;
                Ok(self
                    .matching_rows()
                    .first()
                    .and_then(|row| row.get(column).cloned())
                    .unwrap_or(Value::Null))
            }
            "pluck" => Ok(Value::Array(
                self.column_values(Self::field_arg(operation, arguments, 0)?),
            )),
            "count" => Ok(Value::from(self.matching_rows().len() as u64)),
            "exists" => Ok(Value::Bool(!self.matching_rows().is_empty())),
            "doesntexist" => Ok(Value::Bool(self.matching_rows().is_empty())),
            "sum" => Ok(number(
                self.numbers(Self::field_arg(operation, arguments, 0)?).iter().sum(),
            )),
            "avg" | "average" => {
                let values = self.numbers(Self::field_arg(operation, arguments, 0)?);
                if values.is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(number(values.iter().sum::<f64>() / values.len() as f64))
                }
            }
            "min" => Ok(self
                .numbers(Self::field_arg(operation, arguments, 0)?)
                .into_iter()
                .reduce(f64::min)
                .map(number)
                .unwrap_or(Value::Null)),
            "max" => Ok(self
                .numbers(Self::field_arg(operation, arguments, 0)?)
                .into_iter()
                .reduce(f64::max)
                .map(number)
                .unwrap_or(Value::Null)),
            "revenue" => Ok(number(self.numbers("total").iter().sum())),
            "summary" => Ok(serde_json::json!({
                "count": self.matching_rows().len(),
                "revenue": number(self.numbers("total").iter().sum()),
            })),
            _ => Err(self.unknown(operation)),
        }
    }
}

#[async_trait]
impl QueryBuilder for RowQuery {
    /// An empty table over `entity`.
    fn for_entity(entity: &EntityDescriptor) -> CachetResult<Self> {
        Ok(Self::new(entity.clone(), RowTable::default()))
    }

    fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    fn continue_with(mut self, operation: &str, arguments: &[Value]) -> CachetResult<Step<Self>> {
        let name = normalize(operation);
        match name.as_str() {
            "where" => self.filters.push(Self::comparison(operation, arguments)?),
            "wherenot" => {
                let value = arguments.get(1).cloned().unwrap_or(Value::Null);
                self.filters.push(FilterExpr::new(
                    Self::field_arg(operation, arguments, 0)?,
                    FilterOperator::Ne,
                    value,
                ));
            }
            "wherein" | "wherenotin" => {
                let field = Self::field_arg(operation, arguments, 0)?;
                let list = arguments
                    .get(1)
                    .filter(|v| v.is_array())
                    .cloned()
                    .ok_or_else(|| Self::failed(operation, "expected a list of values"))?;
                let operator = if name == "wherein" {
                    FilterOperator::In
                } else {
                    FilterOperator::NotIn
                };
                self.filters.push(FilterExpr::new(field, operator, list));
            }
            "wherenull" | "wherenotnull" => {
                let field = Self::field_arg(operation, arguments, 0)?;
                let operator = if name == "wherenull" {
                    FilterOperator::Null
                } else {
                    FilterOperator::NotNull
                };
                self.filters.push(FilterExpr::new(field, operator, Value::Null));
            }
            "orderby" => {
                let field = Self::field_arg(operation, arguments, 0)?;
                let direction = match arguments.get(1).and_then(Value::as_str) {
                    Some(d) if d.eq_ignore_ascii_case("desc") => Direction::Desc,
                    _ => Direction::Asc,
                };
                self.order.push((field.to_string(), direction));
            }
            "orderbydesc" => {
                let field = Self::field_arg(operation, arguments, 0)?;
                self.order.push((field.to_string(), Direction::Desc));
            }
            "latest" | "oldest" => {
                let field = arguments
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or("created_at");
                let direction = if name == "latest" {
                    Direction::Desc
                } else {
                    Direction::Asc
                };
                self.order.push((field.to_string(), direction));
            }
            "limit" | "take" => self.limit = Some(Self::count_arg(operation, arguments, 0)?),
            "offset" | "skip" => self.offset = Self::count_arg(operation, arguments, 0)?,
            "forpage" => {
                let page = Self::count_arg(operation, arguments, 0)?.max(1);
                let per_page = Self::count_arg(operation, arguments, 1)?;
                self.offset = (page - 1) * per_page;
                self.limit = Some(per_page);
            }
            "select" => {
                let columns: Vec<String> = match arguments {
                    [Value::Array(list)] => list.iter().filter_map(Value::as_str).map(String::from).collect(),
                    _ => arguments.iter().filter_map(Value::as_str).map(String::from).collect(),
                };
                self.columns = Some(columns);
            }
            "paid" => self.filters.push(FilterExpr::eq("status", Value::from("paid"))),
            "lockforupdate" => {}
            _ => return Err(self.unknown(operation)),
        }
        self.query.push(name, arguments.to_vec());
        Ok(Step::Query(self))
    }

    fn declared_result(&self, operation: &str) -> Option<ResultContract> {
        match normalize(operation).as_str() {
            "paid" => Some(ResultContract::SelfType),
            "revenue" => Some(ResultContract::Value),
            "summary" => Some(ResultContract::Ambiguous),
            _ => None,
        }
    }

    fn nested_declared_result(&self, operation: &str) -> Option<ResultContract> {
        match normalize(operation).as_str() {
            "lockforupdate" => Some(ResultContract::Query),
            _ => None,
        }
    }

    fn to_canonical(&self) -> String {
        self.query.to_canonical_string()
    }

    async fn execute(&self, operation: &str, arguments: &[Value]) -> CachetResult<Value> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.run(operation, arguments)
    }

    async fn execute_raw(&self, query: &str, _bindings: &[Value]) -> CachetResult<Value> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.table
            .raw
            .get(query.trim())
            .cloned()
            .ok_or_else(|| Self::failed("raw", format!("no canned result for {query:?}")))
    }
}

// ============================================================================
// INSTRUMENTED STORES
// ============================================================================

/// Store wrapper counting every call that reaches it.
#[derive(Clone)]
pub struct CountingStore {
    inner: Arc<dyn CacheStore>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    forgets: Arc<AtomicUsize>,
}

impl CountingStore {
    /// Counting wrapper over a fresh [`MemoryStore`].
    pub fn new() -> Self {
        Self::wrap(Arc::new(MemoryStore::new()))
    }

    pub fn wrap(inner: Arc<dyn CacheStore>) -> Self {
        Self {
            inner,
            reads: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
            forgets: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn forgets(&self) -> usize {
        self.forgets.load(Ordering::SeqCst)
    }

    /// Reads, writes and forgets combined.
    pub fn interactions(&self) -> usize {
        self.reads() + self.writes() + self.forgets()
    }
}

impl Default for CountingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CountingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingStore")
            .field("reads", &self.reads())
            .field("writes", &self.writes())
            .field("forgets", &self.forgets())
            .finish()
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, key: &CacheKey) -> CachetResult<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put_for(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> CachetResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put_for(key, value, ttl).await
    }

    async fn put_forever(&self, key: &CacheKey, value: Vec<u8>) -> CachetResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put_forever(key, value).await
    }

    async fn forget(&self, key: &CacheKey) -> CachetResult<bool> {
        self.forgets.fetch_add(1, Ordering::SeqCst);
        self.inner.forget(key).await
    }

    async fn stats(&self) -> CachetResult<CacheStats> {
        self.inner.stats().await
    }
}

/// Store that fails with a backend error.
///
/// [`FailingStore::new`] fails every call. [`FailingStore::writes_only`]
/// reads as an empty cache and fails only `put_for` / `put_forever`.
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    reason: String,
    reads_succeed: bool,
}

impl FailingStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            reads_succeed: false,
        }
    }

    pub fn writes_only(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            reads_succeed: true,
        }
    }

    fn error(&self) -> CachetError {
        CacheError::Backend {
            engine: "failing".to_string(),
            reason: self.reason.clone(),
        }
        .into()
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &CacheKey) -> CachetResult<Option<Vec<u8>>> {
        if self.reads_succeed {
            return Ok(None);
        }
        Err(self.error())
    }

    async fn put_for(&self, _key: &CacheKey, _value: Vec<u8>, _ttl: Duration) -> CachetResult<()> {
        Err(self.error())
    }

    async fn put_forever(&self, _key: &CacheKey, _value: Vec<u8>) -> CachetResult<()> {
        Err(self.error())
    }

    async fn forget(&self, _key: &CacheKey) -> CachetResult<bool> {
        Err(self.error())
    }

    async fn stats(&self) -> CachetResult<CacheStats> {
        Err(self.error())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Cachet inputs.

    use super::*;
    use proptest::prelude::*;

    /// A valid identifier segment.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[A-Z][A-Za-z0-9_]{0,11}"
    }

    /// A valid entity type path with one to four segments.
    pub fn arb_entity_path() -> impl Strategy<Value = String> {
        prop::collection::vec(arb_identifier(), 1..=4).prop_map(|segments| segments.join("::"))
    }

    pub fn arb_entity() -> impl Strategy<Value = EntityDescriptor> {
        arb_entity_path().prop_filter_map("valid path", |path| EntityDescriptor::parse(&path).ok())
    }

    /// JSON scalars and shallow structures used as operation arguments.
    pub fn arb_argument() -> impl Strategy<Value = Value> {
        let scalar = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z0-9 ]{0,12}".prop_map(Value::from),
        ];
        scalar.prop_recursive(2, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    pub fn arb_arguments() -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec(arb_argument(), 0..4)
    }

    /// A well-known continuation name, in any of its spellings.
    pub fn arb_continuation_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "where", "orWhere", "whereIn", "where_null", "orderBy", "order_by", "orderByDesc",
            "limit", "take", "offset", "select", "groupBy", "with", "latest",
        ])
        .prop_map(String::from)
    }

    /// A well-known terminal name, in any of its spellings.
    pub fn arb_terminal_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "get", "first", "find", "findMany", "find_or_fail", "firstWhere", "value", "pluck",
            "count", "sum", "avg", "exists", "doesntExist", "paginate",
        ])
        .prop_map(String::from)
    }

    /// An ordered list of `(operation, arguments)` clauses.
    pub fn arb_clauses() -> impl Strategy<Value = Vec<(String, Vec<Value>)>> {
        prop::collection::vec((arb_continuation_name(), arb_arguments()), 0..6)
    }

    /// Canonical query over `source` built from generated clauses.
    pub fn arb_canonical_query(source: String) -> impl Strategy<Value = CanonicalQuery> {
        arb_clauses().prop_map(move |clauses| {
            let mut query = CanonicalQuery::new(source.clone());
            for (operation, arguments) in clauses {
                query.push(operation, arguments);
            }
            query
        })
    }

    /// Tag lists, possibly with duplicates and blanks.
    pub fn arb_tags() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{0,6}", 0..5)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for the orders scenarios.

    use super::*;
    use serde_json::json;

    /// The sample model used across tests.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Order {
        pub id: u64,
        pub status: String,
        pub total: f64,
        pub created_at: String,
    }

    impl Entity for Order {
        const PATH: &'static str = "App::Models::Order";
    }

    pub fn order_entity() -> EntityDescriptor {
        EntityDescriptor::parse(Order::PATH).expect("fixture path is valid")
    }

    /// Five orders: three paid, one pending, one refunded.
    pub fn order_rows() -> Vec<Value> {
        vec![
            json!({"id": 1, "status": "paid", "total": 120.0, "created_at": "2024-01-03"}),
            json!({"id": 2, "status": "pending", "total": 40.0, "created_at": "2024-01-05"}),
            json!({"id": 3, "status": "paid", "total": 75.5, "created_at": "2024-01-01"}),
            json!({"id": 4, "status": "refunded", "total": 15.0, "created_at": "2024-01-04"}),
            json!({"id": 5, "status": "paid", "total": 9.5, "created_at": "2024-01-02"}),
        ]
    }

    /// The order rows, answering `SELECT 1` as a raw query.
    pub fn order_table() -> RowTable {
        RowTable::new(order_rows()).with_raw("SELECT 1", json!([{"1": 1}]))
    }

    pub fn order_query() -> RowQuery {
        RowQuery::new(order_entity(), order_table())
    }

    /// Executor with `store` registered as the default `memory` engine.
    pub fn executor_with(store: Arc<dyn CacheStore>, settings: CacheSettings) -> CacheExecutor {
        CacheExecutor::new(StoreRegistry::new().with_store("memory", store), settings)
    }

    /// Order repository over a counting store with default settings.
    pub fn order_repository(settings: CacheSettings) -> (Repository<RowQuery>, RowQuery, CountingStore) {
        let store = CountingStore::new();
        let query = order_query();
        let executor = executor_with(Arc::new(store.clone()), settings);
        let repository = Repository::with_builder(order_entity(), query.clone(), executor)
            .expect("fixture builder matches its entity");
        (repository, query, store)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Cachet error variants.

    use super::*;

    #[track_caller]
    pub fn assert_backend_error<T: std::fmt::Debug>(result: &CachetResult<T>) {
        match result {
            Err(e) if e.is_backend() => {}
            other => panic!("Expected cache backend error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_invalid_mode<T: std::fmt::Debug>(result: &CachetResult<T>) {
        match result {
            Err(e) if e.is_invalid_mode() => {}
            other => panic!("Expected invalid cache mode error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_unknown_operation<T: std::fmt::Debug>(result: &CachetResult<T>, operation: &str) {
        match result {
            Err(CachetError::Query(QueryError::UnknownOperation { operation: op, .. })) => {
                assert_eq!(op, operation, "Wrong operation in UnknownOperation error");
            }
            other => panic!("Expected UnknownOperation for {}, got: {:?}", operation, other),
        }
    }

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &CachetResult<T>) {
        match result {
            Err(CachetError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn step(query: RowQuery, operation: &str, arguments: &[Value]) -> RowQuery {
        match query.continue_with(operation, arguments).unwrap() {
            Step::Query(next) => next,
            Step::Executed(_) => panic!("{} executed", operation),
        }
    }

    #[tokio::test]
    async fn test_filters_and_ordering() {
        let query = step(fixtures::order_query(), "where", &[json!("status"), json!("paid")]);
        let query = step(query, "orderBy", &[json!("total"), json!("desc")]);
        let rows = query.execute("get", &[]).await.unwrap();
        let ids: Vec<u64> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 3, 5]);
        assert_eq!(query.executions(), 1);
    }

    #[tokio::test]
    async fn test_comparison_symbols() {
        let query = step(fixtures::order_query(), "where", &[json!("total"), json!(">="), json!(40)]);
        assert_eq!(query.execute("count", &[]).await.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn test_aggregates() {
        let query = fixtures::order_query();
        assert_eq!(query.execute("sum", &[json!("total")]).await.unwrap(), json!(260));
        assert_eq!(query.execute("max", &[json!("total")]).await.unwrap(), json!(120));
        assert_eq!(query.execute("avg", &[json!("total")]).await.unwrap(), json!(52));
        assert_eq!(query.execute("revenue", &[]).await.unwrap(), json!(260));
    }

    #[tokio::test]
    async fn test_lookup_terminals() {
        let query = fixtures::order_query();
        assert_eq!(query.execute("find", &[json!(4)]).await.unwrap()["status"], "refunded");
        assert_eq!(query.execute("find", &[json!(99)]).await.unwrap(), Value::Null);
        assert!(query.execute("findOrFail", &[json!(99)]).await.is_err());
        assert_eq!(
            query
                .execute("findMany", &[json!([1, 2, 99])])
                .await
                .unwrap()
                .as_array()
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            query.execute("value", &[json!("status")]).await.unwrap(),
            json!("paid")
        );
    }

    #[tokio::test]
    async fn test_paging_and_projection() {
        let query = step(fixtures::order_query(), "oldest", &[]);
        let query = step(query, "forPage", &[json!(2), json!(2)]);
        let query = step(query, "select", &[json!("id")]);
        assert_eq!(
            query.execute("get", &[]).await.unwrap(),
            json!([{"id": 1}, {"id": 4}])
        );
    }

    #[tokio::test]
    async fn test_raw_uses_canned_results() {
        let query = fixtures::order_query();
        assert_eq!(query.execute_raw(" SELECT 1 ", &[]).await.unwrap(), json!([{"1": 1}]));
        assert!(query.execute_raw("SELECT 2", &[]).await.is_err());
        assert_eq!(query.executions(), 2);
    }

    #[test]
    fn test_unknown_continuation_rejected() {
        let result = fixtures::order_query().continue_with("join", &[json!("users")]);
        assertions::assert_unknown_operation(&result.map(|_| ()), "join");
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = FailingStore::new("connection refused");
        let key = CacheKey::derive(&fixtures::order_entity(), "q", &["get"], "");
        assertions::assert_backend_error(&store.get(&key).await);
    }

    #[tokio::test]
    async fn test_write_failing_store_reads_empty() {
        let store = FailingStore::writes_only("disk full");
        let key = CacheKey::derive(&fixtures::order_entity(), "q", &["get"], "");
        assert_eq!(store.get(&key).await.unwrap(), None);
        assertions::assert_backend_error(&store.put_forever(&key, b"1".to_vec()).await);
        assertions::assert_backend_error(
            &store.put_for(&key, b"1".to_vec(), Duration::from_secs(1)).await,
        );
    }

    #[tokio::test]
    async fn test_counting_store_counts() {
        let store = CountingStore::new();
        let key = CacheKey::derive(&fixtures::order_entity(), "q", &["get"], "");
        store.put_forever(&key, b"1".to_vec()).await.unwrap();
        store.get(&key).await.unwrap();
        store.forget(&key).await.unwrap();
        assert_eq!((store.reads(), store.writes(), store.forgets()), (1, 1, 1));
        assert_eq!(store.interactions(), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_paths_parse(path in generators::arb_entity_path()) {
            prop_assert!(EntityDescriptor::parse(&path).is_ok());
        }

        #[test]
        fn prop_generated_continuations_are_known(name in generators::arb_continuation_name()) {
            prop_assert_eq!(
                cachet_repository::MethodClassifier::known(&name),
                Some(cachet_repository::Classification::Continuation)
            );
        }

        #[test]
        fn prop_generated_terminals_are_known(name in generators::arb_terminal_name()) {
            prop_assert_eq!(
                cachet_repository::MethodClassifier::known(&name),
                Some(cachet_repository::Classification::Terminal)
            );
        }
    }
}
