//! User-account seam. Sign-up and password reset belong to the hosted auth
//! service; this crate only asks for them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use firebase_client::{FirebaseError, IdentityToolkit, UserRecord};

use crate::error::AuthError;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account for `email`. The user picks a password later through
    /// the reset email.
    async fn create_user(&self, email: &str) -> Result<UserRecord, AuthError>;

    async fn send_password_reset_email(&self, email: &str) -> Result<(), AuthError>;
}

// ---------------------------------------------------------------------------
// Identity Toolkit (production)
// ---------------------------------------------------------------------------

#[async_trait]
impl AuthProvider for IdentityToolkit {
    async fn create_user(&self, email: &str) -> Result<UserRecord, AuthError> {
        // Throwaway password: nobody learns it, the reset email replaces it.
        let password = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        match IdentityToolkit::create_user(self, email, &password).await {
            Ok(user) => Ok(user),
            Err(FirebaseError::Api { message, .. }) if message.starts_with("EMAIL_EXISTS") => {
                Err(AuthError::EmailExists(email.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), AuthError> {
        Ok(IdentityToolkit::send_password_reset_email(self, email).await?)
    }
}

// ---------------------------------------------------------------------------
// MemoryAuth (tests, no hosted service required)
// ---------------------------------------------------------------------------

/// In-memory auth service. Hands out `uid-N` ids and records reset emails.
#[derive(Default)]
pub struct MemoryAuth {
    next_uid: AtomicU64,
    users: Mutex<Vec<UserRecord>>,
    reset_emails: Mutex<Vec<String>>,
    fail_resets: bool,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every reset email fails, as if the mail service were down.
    pub fn with_failing_resets() -> Self {
        Self {
            fail_resets: true,
            ..Self::default()
        }
    }

    pub fn users(&self) -> Vec<UserRecord> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn reset_emails(&self) -> Vec<String> {
        self.reset_emails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn create_user(&self, email: &str) -> Result<UserRecord, AuthError> {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        if users.iter().any(|u| u.email == email) {
            return Err(AuthError::EmailExists(email.to_string()));
        }
        let uid = self.next_uid.fetch_add(1, Ordering::SeqCst) + 1;
        let user = UserRecord {
            uid: format!("uid-{uid}"),
            email: email.to_string(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), AuthError> {
        if self.fail_resets {
            return Err(AuthError::Firebase(FirebaseError::Api {
                status: 503,
                message: "mail service unavailable".to_string(),
            }));
        }
        self.reset_emails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Arc<A> blanket, so tests can keep a handle for assertions
// ---------------------------------------------------------------------------

#[async_trait]
impl<A: AuthProvider + ?Sized> AuthProvider for Arc<A> {
    async fn create_user(&self, email: &str) -> Result<UserRecord, AuthError> {
        (**self).create_user(email).await
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), AuthError> {
        (**self).send_password_reset_email(email).await
    }
}
