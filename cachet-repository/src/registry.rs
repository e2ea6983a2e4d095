//! Repository-defined operations.
//!
//! Besides the builder's own operations, a repository can expose named
//! scopes (reusable continuations) and macros (custom terminals). Registered
//! names take precedence over the classifier and are matched in normalised
//! form.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cachet_core::CachetResult;
use serde_json::Value;

use crate::builder::QueryBuilder;
use crate::classifier::normalize;

/// A named continuation: takes the current query and returns the next.
pub type ScopeFn<B> = Arc<dyn Fn(B, &[Value]) -> CachetResult<B> + Send + Sync>;

/// A named terminal run through the cache like any builder terminal.
#[async_trait]
pub trait Macro<B: QueryBuilder>: Send + Sync {
    async fn call(&self, builder: &B, arguments: &[Value]) -> CachetResult<Value>;
}

/// A registered operation.
pub enum Operation<B: QueryBuilder> {
    Scope(ScopeFn<B>),
    Macro(Arc<dyn Macro<B>>),
}

impl<B: QueryBuilder> Clone for Operation<B> {
    fn clone(&self) -> Self {
        match self {
            Operation::Scope(f) => Operation::Scope(Arc::clone(f)),
            Operation::Macro(m) => Operation::Macro(Arc::clone(m)),
        }
    }
}

impl<B: QueryBuilder> fmt::Debug for Operation<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Scope(_) => f.write_str("Scope"),
            Operation::Macro(_) => f.write_str("Macro"),
        }
    }
}

/// Name -> operation table for one repository type.
pub struct OperationRegistry<B: QueryBuilder> {
    operations: HashMap<String, Operation<B>>,
}

impl<B: QueryBuilder> OperationRegistry<B> {
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Register a continuation under `name`.
    pub fn scope<F>(mut self, name: &str, scope: F) -> Self
    where
        F: Fn(B, &[Value]) -> CachetResult<B> + Send + Sync + 'static,
    {
        self.operations
            .insert(normalize(name), Operation::Scope(Arc::new(scope)));
        self
    }

    /// Register a terminal under `name`.
    pub fn macro_op(mut self, name: &str, handler: impl Macro<B> + 'static) -> Self {
        self.operations
            .insert(normalize(name), Operation::Macro(Arc::new(handler)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Operation<B>> {
        self.operations.get(&normalize(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl<B: QueryBuilder> Default for OperationRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: QueryBuilder> Clone for OperationRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            operations: self.operations.clone(),
        }
    }
}

impl<B: QueryBuilder> fmt::Debug for OperationRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("OperationRegistry")
            .field("operations", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Step;
    use crate::testing::StubQuery;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Macro<StubQuery> for Echo {
        async fn call(&self, _builder: &StubQuery, arguments: &[Value]) -> CachetResult<Value> {
            Ok(Value::Array(arguments.to_vec()))
        }
    }

    fn paid(query: StubQuery, _args: &[Value]) -> CachetResult<StubQuery> {
        match query.continue_with("where", &[json!("status"), json!("paid")])? {
            Step::Query(next) => Ok(next),
            Step::Executed(_) => unreachable!("where never executes"),
        }
    }

    #[test]
    fn test_lookup_is_normalised() {
        let registry = OperationRegistry::<StubQuery>::new()
            .scope("onlyPaid", paid)
            .macro_op("echo_all", Echo);

        assert!(registry.contains("only_paid"));
        assert!(registry.contains("EchoAll"));
        assert!(matches!(registry.get("onlypaid"), Some(Operation::Scope(_))));
        assert!(matches!(registry.get("echoAll"), Some(Operation::Macro(_))));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clone_shares_handlers() {
        let registry = OperationRegistry::<StubQuery>::new().scope("paid", paid);
        let copy = registry.clone();
        assert!(copy.contains("paid"));
        assert_eq!(format!("{:?}", copy), "OperationRegistry { operations: [\"paid\"] }");
    }
}
