//! End-to-end admin workflows against the in-memory database and auth service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use access_news_domain::{
    AccountType, AdminError, AdminService, AuthError, CommandError, MemoryAuth, NewUser, Person,
};
use access_news_events::{
    create_event, Database, DatabaseError, EventError, EventStore, Fields, MemoryDatabase,
};
use async_trait::async_trait;
use firebase_client::{ConditionalWrite, ETag};
use serde_json::{json, Value};

type Service = AdminService<Arc<MemoryDatabase>, Arc<MemoryAuth>>;

fn service_with(auth: MemoryAuth) -> (Service, Arc<MemoryDatabase>, Arc<MemoryAuth>) {
    let db = Arc::new(MemoryDatabase::new());
    let auth = Arc::new(auth);
    let service = AdminService::new(EventStore::new(db.clone()), auth.clone());
    (service, db, auth)
}

fn service() -> (Service, Arc<MemoryDatabase>, Arc<MemoryAuth>) {
    service_with(MemoryAuth::new())
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        first_name: "Bala".to_string(),
        last_name: "Bab".to_string(),
        email: email.to_string(),
        account_type: AccountType::Reader,
    }
}

fn payload(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

// =========================================================================
// add_person
// =========================================================================

#[tokio::test]
async fn add_person_starts_a_stream() {
    let (service, _db, auth) = service();

    let stream_id = service.add_person("Kilgore", "Trout").await.unwrap();

    let events = service.store().read_stream(&stream_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_name, "person_added");
    assert_eq!(events[0].seq, Some(1));

    let person = service.load_person(&stream_id).await.unwrap();
    assert_eq!(person.first_name.as_deref(), Some("Kilgore"));
    assert_eq!(person.last_name.as_deref(), Some("Trout"));
    assert!(person.email.is_none());
    assert!(auth.users().is_empty());
}

#[tokio::test]
async fn blank_names_are_rejected_without_writing() {
    let (service, db, _auth) = service();

    let err = service.add_person("", "   ").await.unwrap_err();

    assert!(matches!(err, AdminError::Command(CommandError::Rejected(_))));
    assert_eq!(db.snapshot(), json!({}));
}

#[tokio::test]
async fn names_are_stored_trimmed() {
    let (service, _db, _auth) = service();

    let stream_id = service.add_person("  Kilgore", "Trout  ").await.unwrap();

    let person = service.load_person(&stream_id).await.unwrap();
    assert_eq!(person.first_name.as_deref(), Some("Kilgore"));
    assert_eq!(person.last_name.as_deref(), Some("Trout"));
}

// =========================================================================
// add_user
// =========================================================================

#[tokio::test]
async fn add_user_records_person_email_and_account_then_sends_reset() {
    let (service, _db, auth) = service();

    let added = service.add_user(&new_user("ema@il.com")).await.unwrap();

    assert_eq!(added.user_id, "uid-1");
    let names: Vec<String> = service
        .store()
        .read_stream(&added.stream_id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_name)
        .collect();
    assert_eq!(names, vec!["person_added", "person_email_added", "reader_added"]);
    assert_eq!(service.store().stream_seq(&added.stream_id).await.unwrap(), 3);

    let person = service.load_person(&added.stream_id).await.unwrap();
    assert_eq!(person.email.as_deref(), Some("ema@il.com"));
    assert_eq!(person.user_id.as_deref(), Some("uid-1"));
    assert!(person.accounts.contains(&AccountType::Reader));
    assert_eq!(person.version, 3);

    assert_eq!(auth.reset_emails(), vec!["ema@il.com".to_string()]);
}

#[tokio::test]
async fn account_event_carries_user_id_and_username() {
    let (service, _db, _auth) = service();

    let added = service.add_user(&new_user("ema@il.com")).await.unwrap();

    let events = service.store().read_stream(&added.stream_id).await.unwrap();
    let account = &events[2];
    assert_eq!(account.field_str("user_id"), Some("uid-1"));
    assert_eq!(account.field_str("username"), Some("ema@il.com"));
}

#[tokio::test]
async fn duplicate_email_fails_without_writing_events() {
    let (service, db, auth) = service();
    service.add_user(&new_user("ema@il.com")).await.unwrap();
    let before = db.snapshot();

    let err = service.add_user(&new_user("ema@il.com")).await.unwrap_err();

    assert!(matches!(err, AdminError::Auth(AuthError::EmailExists(_))));
    assert_eq!(db.snapshot(), before);
    assert_eq!(auth.users().len(), 1);
}

#[tokio::test]
async fn blank_user_name_creates_no_auth_user() {
    let (service, db, auth) = service();
    let mut user = new_user("ema@il.com");
    user.last_name = " ".to_string();

    let err = service.add_user(&user).await.unwrap_err();

    assert!(matches!(err, AdminError::Command(CommandError::Rejected(_))));
    assert!(auth.users().is_empty());
    assert_eq!(db.snapshot(), json!({}));
}

#[tokio::test]
async fn invalid_email_creates_no_auth_user() {
    let (service, db, auth) = service();

    let err = service.add_user(&new_user("not-an-email")).await.unwrap_err();

    assert!(matches!(err, AdminError::Command(CommandError::Rejected(_))));
    assert!(auth.users().is_empty());
    assert_eq!(db.snapshot(), json!({}));
}

#[tokio::test]
async fn failed_reset_email_is_not_fatal() {
    let (service, _db, auth) = service_with(MemoryAuth::with_failing_resets());

    let added = service.add_user(&new_user("ema@il.com")).await.unwrap();

    assert_eq!(auth.users().len(), 1);
    assert!(auth.reset_emails().is_empty());
    assert_eq!(service.store().read_stream(&added.stream_id).await.unwrap().len(), 3);
}

// =========================================================================
// execute
// =========================================================================

#[tokio::test]
async fn named_command_runs_against_replayed_state() {
    let (service, _db, _auth) = service();
    let stream_id = service.add_person("Kilgore", "Trout").await.unwrap();

    let appended = service
        .execute_named("people", &stream_id, "add_email", &payload(json!({"email": "k@trout.com"})))
        .await
        .unwrap();

    assert_eq!(appended.len(), 1);
    assert_eq!(appended[0].seq, 2);
    let person = service.load_person(&stream_id).await.unwrap();
    assert_eq!(person.email.as_deref(), Some("k@trout.com"));
}

#[tokio::test]
async fn command_on_empty_stream_is_rejected() {
    let (service, _db, _auth) = service();
    let stream_id = service.store().create_stream();

    let err = service
        .execute_named("people", &stream_id, "add_email", &payload(json!({"email": "k@trout.com"})))
        .await
        .unwrap_err();

    assert!(matches!(err, AdminError::Command(CommandError::Rejected(_))));
}

#[tokio::test]
async fn unknown_aggregate_and_command_are_reported() {
    let (service, _db, _auth) = service();

    let err = service
        .execute_named("categories", "-Nx", "add_category", &Fields::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::UnknownAggregate(ref name) if name == "categories"));

    let err = service
        .execute_named("people", "-Nx", "remove_person", &Fields::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdminError::Command(CommandError::UnknownCommand { .. })
    ));
}

#[tokio::test]
async fn writer_holding_a_stale_seq_loses() {
    let (service, _db, _auth) = service();
    let stream_id = service.add_person("Kilgore", "Trout").await.unwrap();
    let (_person, seen_seq) = service.load::<Person>(&stream_id).await.unwrap();

    service
        .execute_named("people", &stream_id, "add_email", &payload(json!({"email": "k@trout.com"})))
        .await
        .unwrap();

    let late = create_event("person_email_added", payload(json!({"email": "old@trout.com"})), 0)
        .unwrap();
    let err = service
        .store()
        .append_expected(&stream_id, &late, seen_seq)
        .await
        .unwrap_err();

    assert!(matches!(err, EventError::Conflict { expected: 1, actual: 2, .. }));
}

/// Generates keys that sort backwards, as from a writer whose clock lags.
struct LaggingClock {
    inner: MemoryDatabase,
    next_key: AtomicUsize,
}

#[async_trait]
impl Database for LaggingClock {
    fn generate_key(&self) -> String {
        format!("-N{:03}", self.next_key.fetch_sub(1, Ordering::SeqCst))
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, DatabaseError> {
        self.inner.get(path).await
    }

    async fn get_with_etag(&self, path: &str) -> Result<(Option<Value>, ETag), DatabaseError> {
        self.inner.get_with_etag(path).await
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), DatabaseError> {
        self.inner.set(path, value).await
    }

    async fn set_if_match(
        &self,
        path: &str,
        value: &Value,
        etag: &str,
    ) -> Result<ConditionalWrite, DatabaseError> {
        self.inner.set_if_match(path, value, etag).await
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, DatabaseError> {
        self.inner.push(path, value).await
    }

    async fn children_after(
        &self,
        path: &str,
        after: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<(String, Value)>, DatabaseError> {
        self.inner.children_after(path, after, limit).await
    }

    async fn shallow_keys(&self, path: &str) -> Result<Vec<String>, DatabaseError> {
        self.inner.shallow_keys(path).await
    }
}

#[tokio::test]
async fn replay_follows_seq_when_keys_run_backwards() {
    let db = LaggingClock {
        inner: MemoryDatabase::new(),
        next_key: AtomicUsize::new(999),
    };
    let service = AdminService::new(EventStore::new(db), MemoryAuth::new());
    let stream_id = service.add_person("Kilgore", "Trout").await.unwrap();

    for email in ["first@x.com", "second@x.com"] {
        service
            .execute_named("people", &stream_id, "add_email", &payload(json!({"email": email})))
            .await
            .unwrap();
    }

    let person = service.load_person(&stream_id).await.unwrap();
    assert_eq!(person.email.as_deref(), Some("second@x.com"));
    assert_eq!(person.version, 3);
}
