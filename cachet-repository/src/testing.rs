//! Minimal builder for this crate's unit tests.
//!
//! Records clauses in a `CanonicalQuery` and returns a description of the
//! query instead of data. Integration tests use the row-backed builder from
//! `cachet-test-utils`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cachet_core::{CanonicalQuery, CachetResult, EntityDescriptor, QueryError};
use serde_json::{json, Value};

use crate::builder::{QueryBuilder, ResultContract, Step};
use crate::classifier::{Classification, MethodClassifier};

#[derive(Debug, Clone)]
pub struct StubQuery {
    entity: EntityDescriptor,
    query: CanonicalQuery,
    executions: Arc<AtomicUsize>,
}

impl StubQuery {
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryBuilder for StubQuery {
    fn for_entity(entity: &EntityDescriptor) -> CachetResult<Self> {
        // Lets tests exercise the entity kind check
        let entity = if entity.basename() == "Mismatch" {
            EntityDescriptor::parse("App::Other")?
        } else {
            entity.clone()
        };
        Ok(Self {
            query: CanonicalQuery::new(entity.path()),
            entity,
            executions: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    fn continue_with(mut self, operation: &str, arguments: &[Value]) -> CachetResult<Step<Self>> {
        let chainable = MethodClassifier::known(operation) == Some(Classification::Continuation)
            || self.declared_result(operation).is_some_and(|c| c.is_chainable())
            || self.nested_declared_result(operation).is_some_and(|c| c.is_chainable());
        if !chainable {
            return Err(QueryError::UnknownOperation {
                operation: operation.to_string(),
                entity: self.entity.to_string(),
            }
            .into());
        }
        self.query.push(operation, arguments.to_vec());
        Ok(Step::Query(self))
    }

    fn declared_result(&self, operation: &str) -> Option<ResultContract> {
        match operation {
            "active" => Some(ResultContract::SelfType),
            "total" => Some(ResultContract::Value),
            "maybe" => Some(ResultContract::Ambiguous),
            _ => None,
        }
    }

    fn nested_declared_result(&self, operation: &str) -> Option<ResultContract> {
        match operation {
            "lockForUpdate" => Some(ResultContract::Query),
            _ => None,
        }
    }

    fn to_canonical(&self) -> String {
        self.query.to_canonical_string()
    }

    async fn execute(&self, operation: &str, arguments: &[Value]) -> CachetResult<Value> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "operation": operation,
            "arguments": arguments,
            "query": self.to_canonical(),
        }))
    }

    async fn execute_raw(&self, query: &str, bindings: &[Value]) -> CachetResult<Value> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "raw": query, "bindings": bindings }))
    }
}
