//! Cachet Repository - caching façade over query builders
//!
//! A [`Repository`] wraps one entity's query builder. Continuations extend
//! the query and return for chaining; terminals run through the cache
//! execution engine, keyed by the query's canonical text, under the
//! repository's cache directive.

pub mod builder;
pub mod classifier;
pub mod facade;
pub mod factory;
pub mod methods;
pub mod registry;
pub mod repository;

#[cfg(test)]
mod testing;

pub use builder::{QueryBuilder, ResultContract, Step};
pub use classifier::{normalize, Classification, MethodClassifier};
pub use facade::QueryFacade;
pub use factory::RepositoryFactory;
pub use registry::{Macro, Operation, OperationRegistry, ScopeFn};
pub use repository::{Dispatched, Repository, RAW_TAG};
