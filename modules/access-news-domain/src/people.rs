//! The people aggregate: one stream per person.
//!
//! No duplicate check runs across streams: two people may share a name, and
//! `add_person` always starts a new stream.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use access_news_events::{cast_event_payload, create_event, Fields, NewEvent, EVENT_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::Aggregate;
use crate::error::CommandError;

pub const PERSON_ADDED: &str = "person_added";
pub const PERSON_EMAIL_ADDED: &str = "person_email_added";

const ADDED_SUFFIX: &str = "_added";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Admin,
    Reader,
    Listener,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [AccountType::Admin, AccountType::Reader, AccountType::Listener];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Admin => "admin",
            AccountType::Reader => "reader",
            AccountType::Listener => "listener",
        }
    }

    /// `admin_added`, `reader_added`, `listener_added`.
    pub fn added_event(&self) -> String {
        format!("{}{ADDED_SUFFIX}", self.as_str())
    }

    fn from_added_event(event_name: &str) -> Option<Self> {
        let prefix = event_name.strip_suffix(ADDED_SUFFIX)?;
        prefix.parse().ok()
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                CommandError::Rejected(format!(
                    "account type must be one of admin, reader, listener, got {s:?}"
                ))
            })
    }
}

/// Current state of one person, rebuilt from their stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Person {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub accounts: BTreeSet<AccountType>,
    /// Number of events applied.
    pub version: u64,
}

impl Person {
    pub fn exists(&self) -> bool {
        self.first_name.is_some()
    }

    fn require_existing(&self) -> Result<(), CommandError> {
        if self.exists() {
            Ok(())
        } else {
            Err(CommandError::Rejected("person does not exist yet".to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeopleCommand {
    AddPerson {
        first_name: String,
        last_name: String,
    },
    AddEmail {
        email: String,
    },
    GrantAccount {
        account_type: AccountType,
        user_id: String,
        username: String,
    },
}

impl Aggregate for Person {
    const KIND: &'static str = "people";

    type Command = PeopleCommand;

    fn parse_command(name: &str, payload: &Fields) -> Result<PeopleCommand, CommandError> {
        match name {
            "add_person" => {
                let fields =
                    cast_event_payload(PERSON_ADDED, &["first_name", "last_name"], payload)?;
                Ok(PeopleCommand::AddPerson {
                    first_name: required_str(&fields, "first_name")?,
                    last_name: required_str(&fields, "last_name")?,
                })
            }
            "add_email" => {
                let fields = cast_event_payload(PERSON_EMAIL_ADDED, &["email"], payload)?;
                Ok(PeopleCommand::AddEmail {
                    email: required_str(&fields, "email")?,
                })
            }
            "grant_account" => {
                let fields = cast_event_payload(
                    "account_added",
                    &["account_type", "user_id", "username"],
                    payload,
                )?;
                Ok(PeopleCommand::GrantAccount {
                    account_type: required_str(&fields, "account_type")?.parse()?,
                    user_id: required_str(&fields, "user_id")?,
                    username: required_str(&fields, "username")?,
                })
            }
            other => Err(CommandError::UnknownCommand {
                aggregate: Self::KIND,
                command: other.to_string(),
            }),
        }
    }

    fn execute(&self, command: &PeopleCommand) -> Result<Vec<NewEvent>, CommandError> {
        match command {
            PeopleCommand::AddPerson {
                first_name,
                last_name,
            } => {
                if self.exists() {
                    return Err(CommandError::Rejected(
                        "person already exists in this stream".to_string(),
                    ));
                }
                let first_name = non_blank("first_name", first_name)?;
                let last_name = non_blank("last_name", last_name)?;
                let event = create_event(
                    PERSON_ADDED,
                    string_fields(&[("first_name", &first_name), ("last_name", &last_name)]),
                    EVENT_VERSION,
                )?;
                Ok(vec![event])
            }
            PeopleCommand::AddEmail { email } => {
                self.require_existing()?;
                let email = non_blank("email", email)?;
                if !looks_like_email(&email) {
                    return Err(CommandError::Rejected(format!("{email:?} is not an email address")));
                }
                if self.email.as_deref() == Some(email.as_str()) {
                    return Err(CommandError::Rejected(format!("email is already {email}")));
                }
                let event = create_event(
                    PERSON_EMAIL_ADDED,
                    string_fields(&[("email", &email)]),
                    EVENT_VERSION,
                )?;
                Ok(vec![event])
            }
            PeopleCommand::GrantAccount {
                account_type,
                user_id,
                username,
            } => {
                self.require_existing()?;
                if self.accounts.contains(account_type) {
                    return Err(CommandError::Rejected(format!(
                        "person already has a {account_type} account"
                    )));
                }
                let user_id = non_blank("user_id", user_id)?;
                let username = non_blank("username", username)?;
                let event = create_event(
                    &account_type.added_event(),
                    string_fields(&[("user_id", &user_id), ("username", &username)]),
                    EVENT_VERSION,
                )?;
                Ok(vec![event])
            }
        }
    }

    fn apply(&mut self, event_name: &str, fields: &Fields) {
        let text = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_string);

        match event_name {
            PERSON_ADDED => {
                self.first_name = text("first_name");
                self.last_name = text("last_name");
            }
            PERSON_EMAIL_ADDED => {
                self.email = text("email");
            }
            other => match AccountType::from_added_event(other) {
                Some(account_type) => {
                    self.accounts.insert(account_type);
                    if let Some(user_id) = text("user_id") {
                        self.user_id = Some(user_id);
                    }
                }
                None => {
                    tracing::debug!(event_name = other, "Ignoring event unknown to people");
                }
            },
        }
        self.version += 1;
    }
}

fn required_str(fields: &Fields, name: &str) -> Result<String, CommandError> {
    match fields.get(name) {
        Some(Value::String(s)) => non_blank(name, s),
        _ => Err(CommandError::Rejected(format!(
            "{name} must be a non-empty string"
        ))),
    }
}

/// Trimmed `value`, or a rejection naming the field if nothing is left.
fn non_blank(name: &str, value: &str) -> Result<String, CommandError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CommandError::Rejected(format!(
            "{name} must be a non-empty string"
        )));
    }
    Ok(trimmed.to_string())
}

fn string_fields(pairs: &[(&str, &String)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}
