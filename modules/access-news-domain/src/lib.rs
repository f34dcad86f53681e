//! Command/aggregate layer over the event store.
//!
//! Aggregates validate commands and emit events; `AdminService` loads
//! streams, runs commands, and coordinates with the hosted auth service.

pub mod admin;
pub mod aggregate;
pub mod auth;
pub mod error;
pub mod people;

pub use admin::{AdminService, NewUser, UserAdded};
pub use aggregate::Aggregate;
pub use auth::{AuthProvider, MemoryAuth};
pub use error::{AdminError, AuthError, CommandError, Result};
pub use people::{AccountType, PeopleCommand, Person};
