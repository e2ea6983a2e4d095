//! Typed retrieval helpers.
//!
//! Thin wrappers over [`Repository::call`] for the common terminals. Each
//! goes through the same classification and cache path as a dynamic call
//! and decodes the result into the caller's type.

use cachet_core::{CachetResult, QueryError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::builder::QueryBuilder;
use crate::repository::{Dispatched, Repository};

impl<B: QueryBuilder> Repository<B> {
    /// All rows matching the current query.
    pub async fn get<T: DeserializeOwned>(&mut self) -> CachetResult<Vec<T>> {
        self.terminal("get", Vec::new()).await
    }

    pub async fn first<T: DeserializeOwned>(&mut self) -> CachetResult<Option<T>> {
        self.terminal("first", Vec::new()).await
    }

    pub async fn find<T, K>(&mut self, id: K) -> CachetResult<Option<T>>
    where
        T: DeserializeOwned,
        K: Serialize,
    {
        let id = encode("find", &id)?;
        self.terminal("find", vec![id]).await
    }

    pub async fn find_many<T, K>(&mut self, ids: &[K]) -> CachetResult<Vec<T>>
    where
        T: DeserializeOwned,
        K: Serialize,
    {
        let ids = encode("findMany", ids)?;
        self.terminal("findMany", vec![ids]).await
    }

    /// Like [`find`](Self::find), but a missing row is an error.
    pub async fn find_or_fail<T, K>(&mut self, id: K) -> CachetResult<T>
    where
        T: DeserializeOwned,
        K: Serialize,
    {
        let id = encode("findOrFail", &id)?;
        let found: Option<T> = self.terminal("findOrFail", vec![id.clone()]).await?;
        found.ok_or_else(|| {
            QueryError::ExecutionFailed {
                operation: "findOrFail".to_string(),
                reason: format!("no {} with id {}", self.entity(), id),
            }
            .into()
        })
    }

    /// First row whose `column` equals `value`.
    pub async fn first_where<T, V>(&mut self, column: &str, value: V) -> CachetResult<Option<T>>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        let value = encode("firstWhere", &value)?;
        self.terminal("firstWhere", vec![Value::from(column), value])
            .await
    }

    /// `column` of the first matching row.
    pub async fn value<T: DeserializeOwned>(&mut self, column: &str) -> CachetResult<Option<T>> {
        self.terminal("value", vec![Value::from(column)]).await
    }

    pub async fn count(&mut self) -> CachetResult<u64> {
        self.terminal("count", Vec::new()).await
    }

    pub async fn exists(&mut self) -> CachetResult<bool> {
        self.terminal("exists", Vec::new()).await
    }

    async fn terminal<T: DeserializeOwned>(
        &mut self,
        operation: &str,
        arguments: Vec<Value>,
    ) -> CachetResult<T> {
        match self.call(operation, arguments).await? {
            Dispatched::Value(value) => {
                serde_json::from_value(value).map_err(|e| {
                    QueryError::ExecutionFailed {
                        operation: operation.to_string(),
                        reason: format!("result did not decode: {e}"),
                    }
                    .into()
                })
            }
            Dispatched::Builder(_) => Err(QueryError::InvalidQueryResult {
                operation: operation.to_string(),
                reason: "a builder is required, nothing was executed".to_string(),
            }
            .into()),
            Dispatched::Continued => Err(QueryError::InvalidQueryResult {
                operation: operation.to_string(),
                reason: "the operation extended the query instead of executing it".to_string(),
            }
            .into()),
        }
    }
}

fn encode<V: Serialize + ?Sized>(operation: &str, value: &V) -> CachetResult<Value> {
    serde_json::to_value(value).map_err(|e| {
        QueryError::ExecutionFailed {
            operation: operation.to_string(),
            reason: format!("argument did not encode: {e}"),
        }
        .into()
    })
}
