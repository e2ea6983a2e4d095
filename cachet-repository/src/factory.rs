//! Fresh repositories per unit of work.

use cachet_core::{CachetResult, Entity, EntityDescriptor};
use cachet_storage::CacheExecutor;

use crate::builder::QueryBuilder;
use crate::registry::OperationRegistry;
use crate::repository::Repository;

/// Hands out a new [`Repository`] for every unit of work.
///
/// Repositories accumulate query and cache state, so they must not be
/// reused across requests. The factory holds what is shared (entity,
/// prototype builder, executor, registered operations) and builds a clean
/// repository from it on each call.
#[derive(Debug, Clone)]
pub struct RepositoryFactory<B: QueryBuilder> {
    entity: EntityDescriptor,
    prototype: B,
    executor: CacheExecutor,
    operations: OperationRegistry<B>,
}

impl<B: QueryBuilder> RepositoryFactory<B> {
    /// Factory for `entity` using the builder's own constructor.
    pub fn new(entity: EntityDescriptor, executor: CacheExecutor) -> CachetResult<Self> {
        let prototype = B::for_entity(&entity)?;
        Self::with_builder(entity, prototype, executor)
    }

    /// Factory starting every repository from a clone of `prototype`.
    pub fn with_builder(
        entity: EntityDescriptor,
        prototype: B,
        executor: CacheExecutor,
    ) -> CachetResult<Self> {
        // Validate once so fresh() only fails if the builder does
        Repository::with_builder(entity.clone(), prototype.clone(), executor.clone())?;
        Ok(Self {
            entity,
            prototype,
            executor,
            operations: OperationRegistry::new(),
        })
    }

    pub fn for_entity<E: Entity>(executor: CacheExecutor) -> CachetResult<Self> {
        Self::new(E::descriptor()?, executor)
    }

    pub fn with_operations(mut self, operations: OperationRegistry<B>) -> Self {
        self.operations = operations;
        self
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    /// A repository with an empty query and a default directive.
    pub fn fresh(&self) -> CachetResult<Repository<B>> {
        let repository =
            Repository::with_builder(self.entity.clone(), self.prototype.clone(), self.executor.clone())?;
        Ok(repository.with_operations(self.operations.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubQuery;
    use cachet_core::{CacheDirective, CacheSettings, CachetError, ConfigError};
    use cachet_storage::StoreRegistry;
    use serde_json::json;

    fn executor() -> CacheExecutor {
        CacheExecutor::new(StoreRegistry::new(), CacheSettings::default())
    }

    #[tokio::test]
    async fn test_fresh_does_not_share_state() {
        let factory =
            RepositoryFactory::<StubQuery>::new(EntityDescriptor::parse("App::Order").unwrap(), executor())
                .unwrap();

        let mut first = factory.fresh().unwrap();
        first.remember_forever();
        first.call("where", vec![json!("status"), json!("paid")]).await.unwrap();

        let second = factory.fresh().unwrap();
        assert_eq!(second.to_canonical_string(), "from App::Order");
        assert_eq!(second.directive(), &CacheDirective::new());
    }

    #[test]
    fn test_invalid_builder_rejected_up_front() {
        let err = RepositoryFactory::<StubQuery>::new(
            EntityDescriptor::parse("Mismatch").unwrap(),
            executor(),
        )
        .unwrap_err();
        assert!(matches!(err, CachetError::Config(ConfigError::EntityKindMismatch { .. })));
    }
}
