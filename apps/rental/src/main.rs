use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{load_settings, ClientError, FlowController, PropertyLocation, RentalClient};
use flow::{geo::Coordinates, FlowError};
use serde_json::json;
use shared::{
    domain::{EntityId, EventId, FlowInstance, FlowKind, Role},
    event::EventRecord,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Drive rental flows and notifications from the terminal")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Command,
}

/// Flags win over `rental.toml` and the environment.
#[derive(Args, Debug)]
struct Overrides {
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true)]
    backend_url: Option<String>,
    #[arg(long, global = true)]
    viewer: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the flows that can be started.
    Flows,
    /// Start a new flow; seeds are `field=value` pairs.
    Start {
        kind: FlowKind,
        #[arg(long = "seed", value_parser = parse_pair)]
        seeds: Vec<(String, String)>,
    },
    /// Show the active step of a draft.
    Show { instance: FlowInstance },
    /// Save the active step and move on; values are `field=value` pairs.
    Continue {
        instance: FlowInstance,
        #[arg(long = "set", value_parser = parse_pair)]
        values: Vec<(String, String)>,
    },
    Back { instance: FlowInstance },
    Reset { instance: FlowInstance },
    /// Submit a draft whose terminal step has been saved.
    Finalize { instance: FlowInstance },
    /// List saved drafts.
    Drafts,
    Discard { instance: FlowInstance },
    #[command(subcommand)]
    Events(EventCommand),
    /// Start a maintenance request for the property closest to a location.
    Maintenance {
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
        /// `property_id=latitude,longitude`, repeatable.
        #[arg(long = "property", value_parser = parse_property, required = true)]
        properties: Vec<PropertyLocation>,
    },
}

#[derive(Subcommand, Debug)]
enum EventCommand {
    List,
    /// Show the dialog for an event and mark it read.
    Open {
        event_id: String,
        #[arg(long)]
        role: Role,
    },
    /// Open an event and apply one of its dialog actions.
    Choose {
        event_id: String,
        index: usize,
        #[arg(long)]
        role: Role,
    },
    /// Print the unread count whenever the event list changes.
    Watch,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("empty field name in '{raw}'"));
    }
    Ok((field.to_string(), value.to_string()))
}

fn parse_property(raw: &str) -> Result<PropertyLocation, String> {
    let (id, position) = parse_pair(raw)?;
    let (latitude, longitude) = position
        .split_once(',')
        .ok_or_else(|| format!("expected latitude,longitude for {id}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|err| format!("bad coordinate '{v}' for {id}: {err}"))
    };
    Ok(PropertyLocation {
        name: id.clone(),
        coordinates: Coordinates::new(parse(latitude)?, parse(longitude)?),
        property_id: EntityId::new(id),
    })
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn print_step(controller: &FlowController) -> Result<()> {
    let view = controller.mount().await?;
    print_json(&json!({
        "instance": controller.instance().to_string(),
        "step": view,
    }))
}

/// Validation failures are part of normal use; print them instead of failing.
fn report(err: ClientError) -> Result<()> {
    match err {
        ClientError::Flow(FlowError::Validation { step, errors }) => {
            print_json(&json!({ "step": step, "errors": errors }))
        }
        other => Err(other.into()),
    }
}

async fn find_event(client: &RentalClient, event_id: &str) -> Result<EventRecord> {
    let id = EventId::new(event_id);
    client
        .events()
        .await?
        .into_iter()
        .find(|event| event.id == id)
        .with_context(|| format!("no event {event_id} for viewer {}", client.viewer()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(url) = cli.overrides.database_url {
        settings.database_url = url;
    }
    if let Some(url) = cli.overrides.backend_url {
        settings.backend_url = url;
    }
    if let Some(viewer) = cli.overrides.viewer {
        settings.viewer_id = Some(viewer);
    }

    if let Command::Flows = cli.command {
        for kind in FlowKind::ALL {
            println!("{kind}");
        }
        return Ok(());
    }

    let client = RentalClient::connect(&settings).await?;

    match cli.command {
        Command::Flows => {}
        Command::Start { kind, seeds } => {
            let controller = client.start_flow(kind, &seeds).await?;
            print_step(&controller).await?;
        }
        Command::Show { instance } => {
            let controller = client.resume_flow(instance).await?;
            print_step(&controller).await?;
        }
        Command::Continue { instance, values } => {
            let controller = client.resume_flow(instance).await?;
            let values: BTreeMap<String, String> = values.into_iter().collect();
            match controller.continue_step(&values).await {
                Ok(_) => print_step(&controller).await?,
                Err(err) => report(err.into())?,
            }
        }
        Command::Back { instance } => {
            let controller = client.resume_flow(instance).await?;
            controller.back().await?;
            print_step(&controller).await?;
        }
        Command::Reset { instance } => {
            let controller = client.resume_flow(instance).await?;
            controller.reset().await?;
            print_step(&controller).await?;
        }
        Command::Finalize { instance } => {
            let controller = client.resume_flow(instance).await?;
            let confirmation = client.finalize(&controller).await?;
            print_json(&confirmation)?;
        }
        Command::Drafts => {
            for instance in client.drafts().await? {
                println!("{instance}");
            }
        }
        Command::Discard { instance } => {
            client.discard_draft(instance).await?;
            println!("discarded {instance}");
        }
        Command::Events(EventCommand::List) => {
            print_json(&client.events().await?)?;
        }
        Command::Events(EventCommand::Open { event_id, role }) => {
            let record = find_event(&client, &event_id).await?;
            let dialog = client.open_event(&record, role).await;
            print_json(dialog.descriptor())?;
        }
        Command::Events(EventCommand::Choose {
            event_id,
            index,
            role,
        }) => {
            let record = find_event(&client, &event_id).await?;
            let dialog = client.open_event(&record, role).await;
            let outcome = client.choose(dialog, index).await?;
            print_json(&outcome)?;
        }
        Command::Events(EventCommand::Watch) => {
            let (mut rx, task) = client.subscribe_events();
            info!(viewer = %client.viewer(), "watching events; ctrl-c to stop");
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let unread = client_core::unread_count(&rx.borrow_and_update());
                        println!("unread={unread}");
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            drop(rx);
            task.await?;
        }
        Command::Maintenance {
            latitude,
            longitude,
            properties,
        } => {
            if !latitude.is_finite() || !longitude.is_finite() {
                bail!("origin coordinates must be finite");
            }
            let (controller, property) = client
                .start_maintenance_request(Coordinates::new(latitude, longitude), &properties)
                .await?;
            println!("selected {}", property.property_id);
            print_step(&controller).await?;
        }
    }

    Ok(())
}
