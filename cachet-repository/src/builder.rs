//! Contract between the repository and an underlying query builder.
//!
//! The repository never inspects a builder's internals. It asks the builder
//! to apply continuations, to describe what an operation yields, to render
//! its canonical text, and to execute terminals.

use async_trait::async_trait;
use cachet_core::{CachetResult, EntityDescriptor};
use serde_json::Value;

/// Outcome of applying an operation as a continuation.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<B> {
    /// The operation extended the query.
    Query(B),
    /// The operation ran the query instead of extending it.
    Executed(Value),
}

impl<B> Step<B> {
    pub fn is_query(&self) -> bool {
        matches!(self, Step::Query(_))
    }
}

/// What an operation declares it returns.
///
/// Builders declare this for operations the classifier's tables do not
/// cover, so new operations can be routed without guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultContract {
    /// Returns the builder itself for chaining
    SelfType,
    /// Returns a builder of the same kind
    Builder,
    /// Returns the nested query object
    Query,
    /// Returns concrete data
    Value,
    /// Declared, but may return either
    Ambiguous,
}

impl ResultContract {
    /// True when the operation yields something that can keep chaining.
    pub fn is_chainable(&self) -> bool {
        matches!(
            self,
            ResultContract::SelfType | ResultContract::Builder | ResultContract::Query
        )
    }
}

/// A fluent, chainable query over one entity.
///
/// Builders are values: a continuation consumes the builder and yields the
/// next one. Each repository owns its own builder, so implementations need
/// no interior locking.
#[async_trait]
pub trait QueryBuilder: Clone + Send + Sync + Sized + 'static {
    /// Fresh, unfiltered builder for `entity`.
    fn for_entity(entity: &EntityDescriptor) -> CachetResult<Self>;

    /// Entity this builder queries.
    fn entity(&self) -> &EntityDescriptor;

    /// Apply `operation` as a query continuation.
    ///
    /// Unsupported operations should fail with `QueryError::UnknownOperation`.
    fn continue_with(self, operation: &str, arguments: &[Value]) -> CachetResult<Step<Self>>;

    /// Declared result of `operation` on the builder itself.
    fn declared_result(&self, _operation: &str) -> Option<ResultContract> {
        None
    }

    /// Declared result of `operation` on the builder's nested query object.
    fn nested_declared_result(&self, _operation: &str) -> Option<ResultContract> {
        None
    }

    /// Deterministic text of the accumulated query.
    fn to_canonical(&self) -> String;

    /// Run a terminal operation.
    async fn execute(&self, operation: &str, arguments: &[Value]) -> CachetResult<Value>;

    /// Run literal query text against the data source.
    async fn execute_raw(&self, query: &str, bindings: &[Value]) -> CachetResult<Value>;
}
