use std::{collections::BTreeMap, fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use flow::{EventFeed, StepStore};
use shared::{
    domain::{EventId, Namespace, UserId},
    event::{EventRecord, EventStatus, EventType, NotifStatus},
};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/rental.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store an event record, either from a JSON file or from flags.
    SeedEvent {
        #[arg(long, conflicts_with_all = ["viewer", "event_type"])]
        from_json: Option<PathBuf>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        viewer: Option<String>,
        #[arg(long = "type")]
        event_type: Option<String>,
        #[arg(long, default_value = "pending")]
        status: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        message: String,
        /// `key=value` context entries, repeatable.
        #[arg(long = "context")]
        context: Vec<String>,
    },
    ListEvents {
        viewer: String,
    },
    DeleteEvent {
        id: String,
    },
    ListDrafts,
    ShowDraft {
        namespace: String,
    },
    PurgeDraft {
        namespace: String,
    },
}

fn context_pairs(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|pair| -> Result<(String, String)> {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("context entry '{pair}' is not key=value"))?;
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::SeedEvent {
            from_json,
            id,
            viewer,
            event_type,
            status,
            title,
            message,
            context,
        } => {
            let mut record = match from_json {
                Some(path) => {
                    let raw = fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    serde_json::from_str::<EventRecord>(&raw)
                        .with_context(|| format!("{} is not an event record", path.display()))?
                }
                None => {
                    let (Some(viewer), Some(event_type)) = (viewer, event_type) else {
                        bail!("--viewer and --type are required without --from-json");
                    };
                    EventRecord {
                        id: EventId::new(format!("evt-{}", Utc::now().timestamp_millis())),
                        viewer_id: UserId::new(viewer),
                        event_type: EventType::parse(&event_type),
                        status: EventStatus::parse(&status),
                        notif_status: NotifStatus::Unread,
                        title,
                        message,
                        created_at: Utc::now(),
                        context: context_pairs(&context)?,
                    }
                }
            };
            if let Some(id) = id {
                record.id = EventId::new(id);
            }
            storage.insert_event(&record).await?;
            println!(
                "stored event_id={} type={} status={}",
                record.id,
                record.event_type.as_str(),
                record.status.as_str()
            );
        }
        Command::ListEvents { viewer } => {
            let events = storage.events_for_viewer(&UserId::new(viewer)).await?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        Command::DeleteEvent { id } => {
            let id = EventId::new(id);
            if storage.delete_event(&id).await? {
                println!("deleted event_id={id}");
            } else {
                println!("no event_id={id}");
            }
        }
        Command::ListDrafts => {
            for draft in storage.draft_summaries().await? {
                println!(
                    "{}\tfields={}\tupdated_at={}",
                    draft.namespace,
                    draft.fields,
                    draft.updated_at.to_rfc3339()
                );
            }
        }
        Command::ShowDraft { namespace } => {
            let entries = storage.entries(&Namespace::from_raw(namespace)).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::PurgeDraft { namespace } => {
            let namespace = Namespace::from_raw(namespace);
            storage.delete_namespace(&namespace).await?;
            println!("purged {namespace}");
        }
    }

    Ok(())
}
