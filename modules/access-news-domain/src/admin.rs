//! Administrative workflows: the commands an operator runs against the
//! event store and the hosted auth service.

use access_news_events::{AppendResult, Database, EventStore, Fields, NewEvent, StreamId};
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::Aggregate;
use crate::auth::AuthProvider;
use crate::error::{AdminError, Result};
use crate::people::{AccountType, PeopleCommand, Person};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_type: AccountType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAdded {
    pub stream_id: StreamId,
    pub user_id: String,
}

pub struct AdminService<D, A> {
    store: EventStore<D>,
    auth: A,
}

impl<D: Database, A: AuthProvider> AdminService<D, A> {
    pub fn new(store: EventStore<D>, auth: A) -> Self {
        Self { store, auth }
    }

    pub fn store(&self) -> &EventStore<D> {
        &self.store
    }

    /// Replay a stream into an aggregate. Returns the state and the stream's
    /// head seq as read before the events, for a later optimistic append.
    pub async fn load<G: Aggregate>(&self, stream_id: &str) -> Result<(G, u64)> {
        let seq = self.store.stream_seq(stream_id).await?;
        let events = self.store.read_stream(stream_id).await?;
        Ok((G::replay(&events), seq))
    }

    pub async fn load_person(&self, stream_id: &str) -> Result<Person> {
        let (person, _) = self.load::<Person>(stream_id).await?;
        Ok(person)
    }

    /// Run a command against an existing stream.
    ///
    /// The resulting events are appended at the seq observed while loading,
    /// so a concurrent command on the same stream fails with a conflict
    /// instead of acting on stale state.
    pub async fn execute<G: Aggregate>(
        &self,
        stream_id: &str,
        command: &G::Command,
    ) -> Result<Vec<AppendResult>> {
        let (state, seq) = self.load::<G>(stream_id).await?;
        let events = state.execute(command)?;
        self.append_all(stream_id, seq, &events).await
    }

    /// Run a command given by name, as typed by an operator.
    pub async fn execute_named(
        &self,
        aggregate: &str,
        stream_id: &str,
        command: &str,
        payload: &Fields,
    ) -> Result<Vec<AppendResult>> {
        if aggregate != Person::KIND {
            return Err(AdminError::UnknownAggregate(aggregate.to_string()));
        }
        let command = Person::parse_command(command, payload)?;
        self.execute::<Person>(stream_id, &command).await
    }

    /// Start a new person stream.
    pub async fn add_person(&self, first_name: &str, last_name: &str) -> Result<StreamId> {
        let command = PeopleCommand::AddPerson {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        let events = Person::default().execute(&command)?;

        let stream_id = self.store.create_stream();
        self.append_all(&stream_id, 0, &events).await?;

        info!(stream_id = %stream_id, "Person added");
        Ok(stream_id)
    }

    /// Create a login for a new person.
    ///
    /// A rejected name or email creates no auth user. A failed sign-up writes
    /// no events. A failed reset email is logged and does not fail the call.
    pub async fn add_user(&self, new_user: &NewUser) -> Result<UserAdded> {
        let email = new_user.email.trim();
        let mut person = Person::default();
        let mut events = Vec::new();

        for command in [
            PeopleCommand::AddPerson {
                first_name: new_user.first_name.clone(),
                last_name: new_user.last_name.clone(),
            },
            PeopleCommand::AddEmail {
                email: email.to_string(),
            },
        ] {
            for event in person.execute(&command)? {
                person.apply_new(&event);
                events.push(event);
            }
        }

        let user = self.auth.create_user(email).await?;
        info!(uid = %user.uid, account_type = %new_user.account_type, "Auth user created");

        let grant = PeopleCommand::GrantAccount {
            account_type: new_user.account_type,
            user_id: user.uid.clone(),
            username: email.to_string(),
        };
        events.extend(person.execute(&grant)?);

        let stream_id = self.store.create_stream();
        self.append_all(&stream_id, 0, &events).await?;

        if let Err(e) = self.auth.send_password_reset_email(email).await {
            warn!(uid = %user.uid, error = %e, "Password reset email failed (non-fatal)");
        }

        info!(stream_id = %stream_id, uid = %user.uid, "User added");
        Ok(UserAdded {
            stream_id,
            user_id: user.uid,
        })
    }

    async fn append_all(
        &self,
        stream_id: &str,
        seq: u64,
        events: &[NewEvent],
    ) -> Result<Vec<AppendResult>> {
        let mut appended = Vec::with_capacity(events.len());
        let mut expected = seq;
        for event in events {
            let result = self.store.append_expected(stream_id, event, expected).await?;
            expected = result.seq;
            appended.push(result);
        }
        Ok(appended)
    }
}
