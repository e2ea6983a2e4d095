//! Repository dispatcher.
//!
//! Callers talk to a [`Repository`] exactly as they would to the builder
//! underneath. Every call is routed: continuations extend the repository's
//! query and return for further chaining, terminals run through the cache
//! execution engine under the repository's directive.
//!
//! # Routing
//!
//! 1. Builder required: return the builder, nothing else happens.
//! 2. Registered scope or macro: run it (macros are cached terminals).
//! 3. Otherwise classify. Continuations go through the query facade.
//!    Terminals must be resolvable (known name or declared contract) and
//!    then execute through the cache with the operation name as tag.
//!
//! # Example
//!
//! ```ignore
//! let mut orders = Repository::<SqlQuery>::new(entity, executor)?;
//! orders.remember(Some(Duration::from_secs(60).into()));
//! orders.call("where", vec![json!("status"), json!("paid")]).await?;
//! let paid = orders.call("get", vec![]).await?.into_value();
//! ```

use cachet_core::{
    canonical_arguments, CacheDirective, CacheDuration, CachetResult, Entity, EntityDescriptor,
    QueryError, RememberMode,
};
use cachet_storage::{CacheExecutor, KeySource};
use serde_json::Value;
use std::sync::Arc;

use crate::builder::{QueryBuilder, Step};
use crate::classifier::{Classification, MethodClassifier};
use crate::facade::QueryFacade;
use crate::registry::{Macro, Operation, OperationRegistry};

/// Tag for literal query text executions.
pub const RAW_TAG: &str = "raw";

/// Result of dispatching one operation.
#[derive(Debug, Clone)]
pub enum Dispatched<B> {
    /// The query was extended; keep chaining on the repository.
    Continued,
    /// Builder-required mode: the live builder.
    Builder(B),
    /// A terminal ran (or was served from cache).
    Value(Value),
}

impl<B> Dispatched<B> {
    pub fn is_continued(&self) -> bool {
        matches!(self, Dispatched::Continued)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Dispatched::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_builder(self) -> Option<B> {
        match self {
            Dispatched::Builder(builder) => Some(builder),
            _ => None,
        }
    }
}

/// What a terminal runs once the cache misses.
enum Target<'a, B: QueryBuilder> {
    Builder,
    Macro(&'a Arc<dyn Macro<B>>),
    Raw { query: &'a str },
}

/// Caching façade over one entity's query builder.
///
/// One repository per logical unit of work: the query state and the cache
/// directive accumulate across calls and are never shared.
#[derive(Debug)]
pub struct Repository<B: QueryBuilder> {
    query: QueryFacade<B>,
    directive: CacheDirective,
    executor: CacheExecutor,
    operations: OperationRegistry<B>,
    builder_required: bool,
}

impl<B: QueryBuilder> Repository<B> {
    /// Repository over `entity`. Fails if the builder cannot be created for
    /// it or reports a different entity.
    pub fn new(entity: EntityDescriptor, executor: CacheExecutor) -> CachetResult<Self> {
        Ok(Self::from_facade(QueryFacade::new(entity)?, executor))
    }

    /// Repository over `entity` starting from an already configured
    /// builder.
    pub fn with_builder(
        entity: EntityDescriptor,
        builder: B,
        executor: CacheExecutor,
    ) -> CachetResult<Self> {
        Ok(Self::from_facade(QueryFacade::with_prototype(entity, builder)?, executor))
    }

    fn from_facade(query: QueryFacade<B>, executor: CacheExecutor) -> Self {
        Self {
            query,
            directive: CacheDirective::new(),
            executor,
            operations: OperationRegistry::new(),
            builder_required: false,
        }
    }

    /// Repository over the model type `E`.
    pub fn for_entity<E: Entity>(executor: CacheExecutor) -> CachetResult<Self> {
        Self::new(E::descriptor()?, executor)
    }

    /// Attach repository-defined scopes and macros.
    pub fn with_operations(mut self, operations: OperationRegistry<B>) -> Self {
        self.operations = operations;
        self
    }

    pub fn entity(&self) -> &EntityDescriptor {
        self.query.entity()
    }

    pub fn directive(&self) -> &CacheDirective {
        &self.directive
    }

    pub fn executor(&self) -> &CacheExecutor {
        &self.executor
    }

    /// Current query state, without instantiating it.
    pub fn builder(&self) -> &B {
        self.query.peek()
    }

    pub fn query_mut(&mut self) -> &mut QueryFacade<B> {
        &mut self.query
    }

    pub fn to_canonical_string(&self) -> String {
        self.query.to_canonical_string()
    }

    // ========================================================================
    // CACHE DIRECTIVE
    // ========================================================================

    pub fn use_cache(&mut self, enabled: bool) -> &mut Self {
        self.directive.use_cache(enabled);
        self
    }

    pub fn use_cache_as(&mut self, enabled: bool, mode: RememberMode) -> &mut Self {
        self.directive.use_cache_as(enabled, mode);
        self
    }

    pub fn with_store(&mut self, engine: Option<&str>) -> &mut Self {
        self.directive.with_store(engine);
        self
    }

    pub fn remember(&mut self, duration: Option<CacheDuration>) -> &mut Self {
        self.directive.remember(duration);
        self
    }

    pub fn remember_forever(&mut self) -> &mut Self {
        self.directive.remember_forever();
        self
    }

    /// Make every dispatched operation return the builder instead of
    /// running. Useful to hand a partially built query to other code.
    pub fn require_builder(&mut self, required: bool) -> &mut Self {
        self.builder_required = required;
        self
    }

    pub fn is_builder_required(&self) -> bool {
        self.builder_required
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    /// Extend the query with a caller-supplied mutation.
    pub fn build_query<F>(&mut self, mutator: F) -> CachetResult<&mut Self>
    where
        F: FnOnce(B) -> CachetResult<Step<B>>,
    {
        self.query.apply_as("build_query", mutator)?;
        Ok(self)
    }

    /// Dispatch `operation` with `arguments`.
    pub async fn call(&mut self, operation: &str, arguments: Vec<Value>) -> CachetResult<Dispatched<B>> {
        self.dispatch(None, operation, &arguments).await
    }

    /// [`call`](Self::call) with a caller-supplied cache key. An empty key
    /// falls back to the canonical query text.
    pub async fn call_with_key(
        &mut self,
        key: &str,
        operation: &str,
        arguments: Vec<Value>,
    ) -> CachetResult<Dispatched<B>> {
        self.dispatch(Some(key), operation, &arguments).await
    }

    /// Run literal query text. The text (and bindings) are the key basis.
    ///
    /// Fails without touching the store or the source while a builder is
    /// required, since there is no builder to hand back in place of a value.
    pub async fn execute_raw(&mut self, query: &str, bindings: Vec<Value>) -> CachetResult<Value> {
        if self.builder_required {
            return Err(QueryError::InvalidQueryResult {
                operation: RAW_TAG.to_string(),
                reason: "a builder is required, nothing was executed".to_string(),
            }
            .into());
        }
        let basis = key_basis(query, &bindings);
        self.run_terminal(None, &basis, RAW_TAG, &bindings, Target::Raw { query })
            .await
    }

    /// Remove the cached result of `operation` with `arguments` under the
    /// current query.
    pub async fn forget(&mut self, operation: &str, arguments: Vec<Value>) -> CachetResult<bool> {
        let basis = key_basis(&self.query.to_canonical_string(), &arguments);
        let tags = [operation.to_string()];
        let source = KeySource::new(self.query.entity(), &basis, &tags);
        self.executor.forget(&self.directive, source).await
    }

    async fn dispatch(
        &mut self,
        explicit_key: Option<&str>,
        operation: &str,
        arguments: &[Value],
    ) -> CachetResult<Dispatched<B>> {
        if self.builder_required {
            tracing::trace!(operation, "builder required, returning builder");
            return Ok(Dispatched::Builder(self.query.current().clone()));
        }

        if let Some(registered) = self.operations.get(operation).cloned() {
            return match &registered {
                Operation::Scope(scope) => {
                    self.query
                        .apply_as(operation, |b| scope(b, arguments).map(Step::Query))?;
                    Ok(Dispatched::Continued)
                }
                Operation::Macro(handler) => {
                    let basis = key_basis(&self.query.to_canonical_string(), arguments);
                    self.run_terminal(explicit_key, &basis, operation, arguments, Target::Macro(handler))
                        .await
                        .map(Dispatched::Value)
                }
            };
        }

        let classification = MethodClassifier::classify(operation, self.query.peek());
        tracing::trace!(entity = %self.query.entity(), operation, ?classification, "dispatch");

        match classification {
            Classification::Continuation => {
                self.query
                    .apply_as(operation, |b| b.continue_with(operation, arguments))?;
                Ok(Dispatched::Continued)
            }
            Classification::Terminal => {
                if !MethodClassifier::is_resolvable(operation, self.query.peek()) {
                    return Err(QueryError::UnknownOperation {
                        operation: operation.to_string(),
                        entity: self.query.entity().to_string(),
                    }
                    .into());
                }
                let basis = key_basis(&self.query.to_canonical_string(), arguments);
                self.run_terminal(explicit_key, &basis, operation, arguments, Target::Builder)
                    .await
                    .map(Dispatched::Value)
            }
        }
    }

    async fn run_terminal(
        &mut self,
        explicit_key: Option<&str>,
        basis: &str,
        tag: &str,
        arguments: &[Value],
        target: Target<'_, B>,
    ) -> CachetResult<Value> {
        let tags = [tag.to_string()];
        self.query.current();
        let builder = self.query.peek();
        let source = KeySource::new(self.query.entity(), basis, &tags).with_explicit(explicit_key);

        match target {
            Target::Builder => {
                self.executor
                    .execute(&self.directive, source, || builder.execute(tag, arguments))
                    .await
            }
            Target::Macro(handler) => {
                self.executor
                    .execute(&self.directive, source, || handler.call(builder, arguments))
                    .await
            }
            Target::Raw { query } => {
                self.executor
                    .execute(&self.directive, source, || builder.execute_raw(query, arguments))
                    .await
            }
        }
    }
}

/// Key basis for a terminal: the query text, plus its arguments when any.
fn key_basis(query: &str, arguments: &[Value]) -> String {
    if arguments.is_empty() {
        query.to_string()
    } else {
        format!("{query} :: ({})", canonical_arguments(arguments))
    }
}
