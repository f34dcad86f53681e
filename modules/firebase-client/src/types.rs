use serde::{Deserialize, Serialize};

/// Opaque content tag returned by the database for a path.
pub type ETag = String;

/// ETag the database reports for a path holding no data.
pub const NULL_ETAG: &str = "null_etag";

/// Outcome of a write guarded by `if-match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalWrite {
    Written,
    /// The path changed since the ETag was read. Carries the current ETag.
    Stale { etag: ETag },
}

/// A user account in Firebase Authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PushResponse {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignUpResponse {
    pub local_id: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OobCodeRequest<'a> {
    pub request_type: &'a str,
    pub email: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
}
