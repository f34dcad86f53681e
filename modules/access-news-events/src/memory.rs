//! In-memory `Database` for tests and offline runs.
//!
//! Mirrors the hosted database closely enough for the event store: a single
//! JSON tree, server timestamps resolved on write, empty objects pruned,
//! content-derived ETags, and keys returned in push-id order.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use firebase_client::{validate_key, ConditionalWrite, ETag, PushIdGenerator, NULL_ETAG};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::backend::{Database, DbResult};
use crate::error::DatabaseError;

pub struct MemoryDatabase {
    root: Mutex<Value>,
    push_ids: Arc<PushIdGenerator>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
            push_ids: Arc::new(PushIdGenerator::new()),
        }
    }

    /// Copy of the whole tree (for test assertions).
    pub fn snapshot(&self) -> Value {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Value> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn generate_key(&self) -> String {
        self.push_ids.next_id()
    }

    async fn get(&self, path: &str) -> DbResult<Option<Value>> {
        let segs = segments(path)?;
        let root = self.lock();
        Ok(lookup(&root, &segs).cloned())
    }

    async fn get_with_etag(&self, path: &str) -> DbResult<(Option<Value>, ETag)> {
        let segs = segments(path)?;
        let root = self.lock();
        let value = lookup(&root, &segs).cloned();
        let etag = etag_of(value.as_ref());
        Ok((value, etag))
    }

    async fn set(&self, path: &str, value: &Value) -> DbResult<()> {
        let segs = segments(path)?;
        let mut root = self.lock();
        write(&mut root, &segs, value);
        Ok(())
    }

    async fn set_if_match(
        &self,
        path: &str,
        value: &Value,
        etag: &str,
    ) -> DbResult<ConditionalWrite> {
        let segs = segments(path)?;
        let mut root = self.lock();

        let current = etag_of(lookup(&root, &segs));
        if current != etag {
            return Ok(ConditionalWrite::Stale { etag: current });
        }

        write(&mut root, &segs, value);
        Ok(ConditionalWrite::Written)
    }

    async fn push(&self, path: &str, value: &Value) -> DbResult<String> {
        let key = self.generate_key();
        let mut segs = segments(path)?;
        segs.push(&key);

        let mut root = self.lock();
        write(&mut root, &segs, value);
        Ok(key)
    }

    async fn children_after(
        &self,
        path: &str,
        after: Option<&str>,
        limit: Option<usize>,
    ) -> DbResult<Vec<(String, Value)>> {
        let segs = segments(path)?;
        let root = self.lock();

        let Some(Value::Object(children)) = lookup(&root, &segs) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<(String, Value)> = children
            .iter()
            .filter(|(k, _)| after.map_or(true, |after| k.as_str() > after))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn shallow_keys(&self, path: &str) -> DbResult<Vec<String>> {
        let segs = segments(path)?;
        let root = self.lock();

        let mut keys: Vec<String> = match lookup(&root, &segs) {
            Some(Value::Object(children)) => children.keys().cloned().collect(),
            _ => Vec::new(),
        };
        keys.sort();
        Ok(keys)
    }
}

fn segments(path: &str) -> DbResult<Vec<&str>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|seg| {
            validate_key(seg)
                .map(|_| seg)
                .map_err(|e| DatabaseError::InvalidPath {
                    path: path.to_string(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

fn lookup<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    let found = segs.iter().try_fold(root, |node, seg| node.get(*seg))?;
    match found {
        Value::Object(map) if map.is_empty() => None,
        v => Some(v),
    }
}

fn write(root: &mut Value, segs: &[&str], value: &Value) {
    let value = resolve_server_values(value, chrono::Utc::now().timestamp_millis());

    match segs.split_last() {
        None => *root = value,
        Some((last, parents)) => {
            let mut node = &mut *root;
            for seg in parents {
                node = ensure_object(node)
                    .entry(seg.to_string())
                    .or_insert(Value::Null);
            }
            ensure_object(node).insert(last.to_string(), value);
        }
    }

    prune(root);
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Drop nulls and empty objects, which the database does not store.
fn prune(node: &mut Value) -> bool {
    match node {
        Value::Null => false,
        Value::Object(map) => {
            map.retain(|_, child| prune(child));
            !map.is_empty()
        }
        _ => true,
    }
}

fn resolve_server_values(value: &Value, now_ms: i64) -> Value {
    match value {
        Value::Object(map) if is_server_timestamp(map) => Value::from(now_ms),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_server_values(v, now_ms)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve_server_values(v, now_ms))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_server_timestamp(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.get(".sv").and_then(Value::as_str) == Some("timestamp")
}

fn etag_of(value: Option<&Value>) -> ETag {
    match value {
        None => NULL_ETAG.to_string(),
        Some(v) => hex::encode(Sha256::digest(v.to_string().as_bytes())),
    }
}
