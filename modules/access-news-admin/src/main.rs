use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use access_news_domain::{AccountType, AdminService, NewUser};
use access_news_events::{EventStore, Fields};
use firebase_client::{DatabaseOptions, IdentityToolkit, RealtimeDatabase};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "access-news-admin")]
#[command(about = "Administer the Access News event store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new stream id (nothing is written until the first event)
    CreateStream,

    /// Start a person stream
    AddPerson { first_name: String, last_name: String },

    /// Create a person with a login and send them a password reset email
    AddUser {
        first_name: String,
        last_name: String,
        email: String,

        /// admin, reader, or listener
        #[arg(long, default_value = "reader")]
        account_type: String,
    },

    /// Run a command against an existing stream, e.g.
    /// `exec <stream> add_email '{"email":"a@b.org"}'`
    Exec {
        stream_id: String,
        command: String,
        /// JSON object with exactly the command's fields
        payload: String,

        #[arg(long, default_value = "people")]
        aggregate: String,
    },

    /// Print every event in a stream
    Show { stream_id: String },

    /// Print the current state of a person
    Person { stream_id: String },

    /// List stream ids
    Streams,

    /// Follow a stream, printing events as they arrive
    Tail {
        stream_id: String,

        /// Seconds between polls once caught up
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter()?)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let db = RealtimeDatabase::new(DatabaseOptions {
        url: config.database_url.clone(),
        auth_token: config.auth_token.clone(),
    });
    let store = EventStore::with_paths(
        db,
        config.event_store_root.clone(),
        config.event_store_heads.clone(),
    );

    match cli.command {
        Commands::CreateStream => {
            println!("{}", store.create_stream());
        }
        Commands::AddPerson {
            first_name,
            last_name,
        } => {
            let service = admin_service(&config, store);
            let stream_id = service.add_person(&first_name, &last_name).await?;
            println!("{stream_id}");
        }
        Commands::AddUser {
            first_name,
            last_name,
            email,
            account_type,
        } => {
            config.require_api_key()?;
            let new_user = NewUser {
                first_name,
                last_name,
                email,
                account_type: account_type.parse::<AccountType>()?,
            };
            let service = admin_service(&config, store);
            let added = service.add_user(&new_user).await?;
            println!("{}", serde_json::to_string_pretty(&added)?);
        }
        Commands::Exec {
            stream_id,
            command,
            payload,
            aggregate,
        } => {
            let payload = parse_payload(&payload)?;
            let service = admin_service(&config, store);
            let appended = service
                .execute_named(&aggregate, &stream_id, &command, &payload)
                .await?;
            for result in &appended {
                info!(stream_id = %stream_id, event_id = %result.event_id, seq = result.seq, "Appended");
                println!("{}", result.event_id);
            }
        }
        Commands::Show { stream_id } => {
            let events = store.read_stream(&stream_id).await?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        Commands::Person { stream_id } => {
            let service = admin_service(&config, store);
            let person = service.load_person(&stream_id).await?;
            if !person.exists() {
                anyhow::bail!("no person in stream {stream_id}");
            }
            println!("{}", serde_json::to_string_pretty(&person)?);
        }
        Commands::Streams => {
            for stream_id in store.list_streams().await? {
                println!("{stream_id}");
            }
        }
        Commands::Tail {
            stream_id,
            interval,
        } => {
            info!(stream_id = %stream_id, interval, "Following stream (Ctrl-C to stop)");
            let mut events = store.subscribe(&stream_id, Duration::from_secs(interval.max(1)))?;
            loop {
                tokio::select! {
                    next = events.next() => match next {
                        Some(event) => println!("{}", serde_json::to_string(&event?)?),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}

fn log_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("access_news=info".parse()?)
        .add_directive("firebase_client=info".parse()?))
}

/// User commands need the Identity Toolkit key; the rest never reach it.
fn admin_service(
    config: &Config,
    store: EventStore<RealtimeDatabase>,
) -> AdminService<RealtimeDatabase, IdentityToolkit> {
    let auth = IdentityToolkit::new(config.api_key.clone().unwrap_or_default());
    AdminService::new(store, auth)
}

fn parse_payload(raw: &str) -> Result<Fields> {
    let value: Value = serde_json::from_str(raw).context("payload is not valid JSON")?;
    match value {
        Value::Object(fields) => Ok(fields),
        other => anyhow::bail!("payload must be a JSON object, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_every_workspace_crate() {
        let filter = log_filter().unwrap().to_string();
        assert!(filter.contains("access_news=info"));
        assert!(filter.contains("firebase_client=info"));
    }

    #[test]
    fn payload_must_be_a_json_object() {
        assert_eq!(parse_payload(r#"{"email":"a@b.org"}"#).unwrap().len(), 1);
        assert!(parse_payload("[1, 2]").is_err());
        assert!(parse_payload("not json").is_err());
    }
}
