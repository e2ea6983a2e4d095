//! Query facade: owns one repository's live builder.

use cachet_core::{CachetResult, ConfigError, EntityDescriptor, QueryError};

use crate::builder::{QueryBuilder, Step};

/// Owns a repository's query state.
///
/// The builder is validated once at construction (the prototype) and the
/// live state is cloned from it on first access, so a repository that only
/// reconfigures caching never instantiates a query.
#[derive(Debug, Clone)]
pub struct QueryFacade<B: QueryBuilder> {
    entity: EntityDescriptor,
    prototype: B,
    live: Option<B>,
}

impl<B: QueryBuilder> QueryFacade<B> {
    /// Build and validate the prototype for `entity`.
    pub fn new(entity: EntityDescriptor) -> CachetResult<Self> {
        let prototype = B::for_entity(&entity)?;
        Self::with_prototype(entity, prototype)
    }

    /// Use an already configured builder (e.g. one holding a connection)
    /// as the prototype. It must be a query over `entity`.
    pub fn with_prototype(entity: EntityDescriptor, prototype: B) -> CachetResult<Self> {
        if prototype.entity() != &entity {
            return Err(ConfigError::EntityKindMismatch {
                expected: entity.path().to_string(),
                got: prototype.entity().path().to_string(),
            }
            .into());
        }

        Ok(Self {
            entity,
            prototype,
            live: None,
        })
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    /// Live builder, created on first access.
    pub fn current(&mut self) -> &mut B {
        let prototype = &self.prototype;
        self.live.get_or_insert_with(|| prototype.clone())
    }

    /// Current state without instantiating it.
    pub fn peek(&self) -> &B {
        self.live.as_ref().unwrap_or(&self.prototype)
    }

    /// Whether any state has been created since construction or reset.
    pub fn is_started(&self) -> bool {
        self.live.is_some()
    }

    /// Replace the state with `mutator`'s result.
    pub fn apply<F>(&mut self, mutator: F) -> CachetResult<&mut Self>
    where
        F: FnOnce(B) -> CachetResult<Step<B>>,
    {
        self.apply_as("apply", mutator)
    }

    /// [`apply`](Self::apply), naming the operation in errors.
    ///
    /// The state is left untouched when the mutator fails or executes.
    pub fn apply_as<F>(&mut self, operation: &str, mutator: F) -> CachetResult<&mut Self>
    where
        F: FnOnce(B) -> CachetResult<Step<B>>,
    {
        let next = match mutator(self.current().clone())? {
            Step::Query(next) => next,
            Step::Executed(_) => {
                return Err(QueryError::InvalidQueryResult {
                    operation: operation.to_string(),
                    reason: "the query was executed instead of extended".to_string(),
                }
                .into())
            }
        };

        if next.entity() != &self.entity {
            return Err(QueryError::InvalidQueryResult {
                operation: operation.to_string(),
                reason: format!(
                    "expected a query over {}, got one over {}",
                    self.entity,
                    next.entity()
                ),
            }
            .into());
        }

        self.live = Some(next);
        Ok(self)
    }

    pub fn to_canonical_string(&self) -> String {
        self.peek().to_canonical()
    }

    /// Drop the live state; the next access starts from a fresh query.
    pub fn reset(&mut self) -> &mut Self {
        self.live = None;
        self
    }
}
