//! Realtime Database REST API.
//!
//! Every path is addressed as `{url}/{path}.json`. Ordering queries use the
//! `$key` index, which needs no security-rule `.indexOn` entry.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};

use crate::error::{FirebaseError, Result};
use crate::push_id::PushIdGenerator;
use crate::types::{ConditionalWrite, ETag, PushResponse};

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";

/// The `{".sv": "timestamp"}` placeholder the server replaces with its clock.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// e.g. `https://<project>.firebaseio.com`
    pub url: String,
    /// Database secret or ID token, sent as the `auth` query parameter.
    pub auth_token: Option<String>,
}

#[derive(Clone)]
pub struct RealtimeDatabase {
    client: reqwest::Client,
    url: String,
    auth_token: Option<String>,
    push_ids: Arc<PushIdGenerator>,
}

impl RealtimeDatabase {
    pub fn new(options: DatabaseOptions) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: options.url.trim_end_matches('/').to_string(),
            auth_token: options.auth_token,
            push_ids: Arc::new(PushIdGenerator::new()),
        }
    }

    /// A fresh push id. Nothing is written.
    pub fn generate_key(&self) -> String {
        self.push_ids.next_id()
    }

    pub async fn get(&self, path: &str) -> Result<Option<Value>> {
        let resp = check(self.request(Method::GET, path).send().await?).await?;
        let value: Value = resp.json().await?;
        Ok(non_null(value))
    }

    pub async fn get_with_etag(&self, path: &str) -> Result<(Option<Value>, ETag)> {
        let resp = self
            .request(Method::GET, path)
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await?;
        let resp = check(resp).await?;
        let etag = etag_of(&resp, path)?;
        let value: Value = resp.json().await?;
        Ok((non_null(value), etag))
    }

    pub async fn set(&self, path: &str, value: &Value) -> Result<()> {
        let resp = self.request(Method::PUT, path).json(value).send().await?;
        check(resp).await?;
        tracing::debug!(path, "Wrote value");
        Ok(())
    }

    /// Write `value` only if the path still carries `etag`.
    pub async fn set_if_match(
        &self,
        path: &str,
        value: &Value,
        etag: &str,
    ) -> Result<ConditionalWrite> {
        let resp = self
            .request(Method::PUT, path)
            .header("if-match", etag)
            .json(value)
            .send()
            .await?;

        if resp.status() == StatusCode::PRECONDITION_FAILED {
            let current = etag_of(&resp, path)?;
            tracing::debug!(path, expected = etag, current = %current, "Conditional write was stale");
            return Ok(ConditionalWrite::Stale { etag: current });
        }

        check(resp).await?;
        Ok(ConditionalWrite::Written)
    }

    /// Append `value` under a server-generated push id and return that id.
    pub async fn push(&self, path: &str, value: &Value) -> Result<String> {
        let resp = self.request(Method::POST, path).json(value).send().await?;
        let resp = check(resp).await?;
        let pushed: PushResponse = resp.json().await?;
        tracing::debug!(path, key = %pushed.name, "Pushed value");
        Ok(pushed.name)
    }

    /// Multi-child update relative to `path`.
    pub async fn update(&self, path: &str, children: &Map<String, Value>) -> Result<()> {
        let resp = self
            .request(Method::PATCH, path)
            .json(children)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.request(Method::DELETE, path).send().await?;
        check(resp).await?;
        Ok(())
    }

    /// Children of `path` in key order, strictly after `after`, at most `limit`.
    pub async fn children_after(
        &self,
        path: &str,
        after: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<(String, Value)>> {
        let mut req = self
            .request(Method::GET, path)
            .query(&[("orderBy", "\"$key\"")]);
        if let Some(after) = after {
            req = req.query(&[("startAt", quoted(after))]);
        }
        if let Some(limit) = limit {
            // startAt is inclusive, so ask for one extra row
            let wanted = limit.saturating_add(usize::from(after.is_some()));
            req = req.query(&[("limitToFirst", wanted.to_string())]);
        }

        let resp = check(req.send().await?).await?;
        let value: Value = resp.json().await?;
        Ok(ordered_children(value, after, limit))
    }

    /// Immediate child keys of `path`, without their data.
    pub async fn shallow_keys(&self, path: &str) -> Result<Vec<String>> {
        let resp = self
            .request(Method::GET, path)
            .query(&[("shallow", "true")])
            .send()
            .await?;
        let resp = check(resp).await?;
        let value: Value = resp.json().await?;

        let mut keys: Vec<String> = match value {
            Value::Object(map) => map.into_iter().map(|(k, _)| k).collect(),
            Value::Null => Vec::new(),
            other => {
                return Err(FirebaseError::Parse(format!(
                    "shallow read of {path} returned a non-object: {other}"
                )))
            }
        };
        keys.sort();
        Ok(keys)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}.json", self.url, path.trim_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.endpoint(path));
        match &self.auth_token {
            Some(token) => req.query(&[("auth", token)]),
            None => req,
        }
    }
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FirebaseError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp)
}

fn etag_of(resp: &Response, path: &str) -> Result<ETag> {
    resp.headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| FirebaseError::MissingEtag(path.to_string()))
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        v => Some(v),
    }
}

fn quoted(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn ordered_children(
    value: Value,
    after: Option<&str>,
    limit: Option<usize>,
) -> Vec<(String, Value)> {
    let mut children: Vec<(String, Value)> = match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Vec::new(),
    };
    children.sort_by(|a, b| a.0.cmp(&b.0));
    if let Some(after) = after {
        children.retain(|(k, _)| k.as_str() > after);
    }
    if let Some(limit) = limit {
        children.truncate(limit);
    }
    children
}
