//! The storage seam under the event store.
//!
//! Implemented by the hosted Realtime Database and by `MemoryDatabase` (tests,
//! offline runs). Also implemented for `Arc<D>` so a backend can be shared
//! with the test that inspects it.

use std::sync::Arc;

use async_trait::async_trait;
use firebase_client::{ConditionalWrite, ETag, RealtimeDatabase};
use serde_json::Value;

use crate::error::DatabaseError;

pub type DbResult<T> = std::result::Result<T, DatabaseError>;

#[async_trait]
pub trait Database: Send + Sync {
    /// A fresh, chronologically-sortable key. Nothing is written.
    fn generate_key(&self) -> String;

    /// The placeholder the backend replaces with its own clock on write.
    fn server_timestamp(&self) -> Value {
        firebase_client::server_timestamp()
    }

    async fn get(&self, path: &str) -> DbResult<Option<Value>>;

    async fn get_with_etag(&self, path: &str) -> DbResult<(Option<Value>, ETag)>;

    async fn set(&self, path: &str, value: &Value) -> DbResult<()>;

    async fn set_if_match(&self, path: &str, value: &Value, etag: &str)
        -> DbResult<ConditionalWrite>;

    /// Store `value` under a new key below `path` and return the key.
    async fn push(&self, path: &str, value: &Value) -> DbResult<String>;

    /// Children in key order, strictly after `after`, at most `limit`.
    async fn children_after(
        &self,
        path: &str,
        after: Option<&str>,
        limit: Option<usize>,
    ) -> DbResult<Vec<(String, Value)>>;

    async fn shallow_keys(&self, path: &str) -> DbResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Hosted Realtime Database
// ---------------------------------------------------------------------------

#[async_trait]
impl Database for RealtimeDatabase {
    fn generate_key(&self) -> String {
        RealtimeDatabase::generate_key(self)
    }

    async fn get(&self, path: &str) -> DbResult<Option<Value>> {
        Ok(RealtimeDatabase::get(self, path).await?)
    }

    async fn get_with_etag(&self, path: &str) -> DbResult<(Option<Value>, ETag)> {
        Ok(RealtimeDatabase::get_with_etag(self, path).await?)
    }

    async fn set(&self, path: &str, value: &Value) -> DbResult<()> {
        Ok(RealtimeDatabase::set(self, path, value).await?)
    }

    async fn set_if_match(
        &self,
        path: &str,
        value: &Value,
        etag: &str,
    ) -> DbResult<ConditionalWrite> {
        Ok(RealtimeDatabase::set_if_match(self, path, value, etag).await?)
    }

    async fn push(&self, path: &str, value: &Value) -> DbResult<String> {
        Ok(RealtimeDatabase::push(self, path, value).await?)
    }

    async fn children_after(
        &self,
        path: &str,
        after: Option<&str>,
        limit: Option<usize>,
    ) -> DbResult<Vec<(String, Value)>> {
        Ok(RealtimeDatabase::children_after(self, path, after, limit).await?)
    }

    async fn shallow_keys(&self, path: &str) -> DbResult<Vec<String>> {
        Ok(RealtimeDatabase::shallow_keys(self, path).await?)
    }
}

// ---------------------------------------------------------------------------
// Arc<D> blanket
// ---------------------------------------------------------------------------

#[async_trait]
impl<D: Database + ?Sized> Database for Arc<D> {
    fn generate_key(&self) -> String {
        (**self).generate_key()
    }

    fn server_timestamp(&self) -> Value {
        (**self).server_timestamp()
    }

    async fn get(&self, path: &str) -> DbResult<Option<Value>> {
        (**self).get(path).await
    }

    async fn get_with_etag(&self, path: &str) -> DbResult<(Option<Value>, ETag)> {
        (**self).get_with_etag(path).await
    }

    async fn set(&self, path: &str, value: &Value) -> DbResult<()> {
        (**self).set(path, value).await
    }

    async fn set_if_match(
        &self,
        path: &str,
        value: &Value,
        etag: &str,
    ) -> DbResult<ConditionalWrite> {
        (**self).set_if_match(path, value, etag).await
    }

    async fn push(&self, path: &str, value: &Value) -> DbResult<String> {
        (**self).push(path, value).await
    }

    async fn children_after(
        &self,
        path: &str,
        after: Option<&str>,
        limit: Option<usize>,
    ) -> DbResult<Vec<(String, Value)>> {
        (**self).children_after(path, after, limit).await
    }

    async fn shallow_keys(&self, path: &str) -> DbResult<Vec<String>> {
        (**self).shallow_keys(path).await
    }
}
