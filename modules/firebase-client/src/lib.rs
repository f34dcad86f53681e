pub mod auth;
pub mod database;
pub mod error;
pub mod key;
pub mod push_id;
pub mod types;

pub use auth::IdentityToolkit;
pub use database::{server_timestamp, DatabaseOptions, RealtimeDatabase};
pub use error::{FirebaseError, Result};
pub use key::{child_path, validate_key};
pub use push_id::{push_id_timestamp, PushIdGenerator};
pub use types::{ConditionalWrite, ETag, UserRecord, NULL_ETAG};
