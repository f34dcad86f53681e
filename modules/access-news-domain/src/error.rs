use access_news_events::EventError;
use firebase_client::FirebaseError;
use thiserror::Error;

/// Why a command produced no events.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{aggregate} has no command {command:?}")]
    UnknownCommand {
        aggregate: &'static str,
        command: String,
    },

    #[error(transparent)]
    Payload(#[from] EventError),

    #[error("Command rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered: {0}")]
    EmailExists(String),

    #[error(transparent)]
    Firebase(#[from] FirebaseError),
}

pub type Result<T> = std::result::Result<T, AdminError>;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Unknown aggregate {0:?}")]
    UnknownAggregate(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Events(#[from] EventError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
