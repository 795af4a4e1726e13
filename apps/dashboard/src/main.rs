mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use client_core::{
    DashboardEvent, EventDashboard, HttpEventService, HttpServiceOptions, LoadState, SearchQuery,
};
use serde::Serialize;
use shared::{
    domain::{EventDraft, EventId, ViewerSession},
    protocol::Decision,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, CONFIG_FILE};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    /// Email of the signed-in viewer.
    #[arg(long)]
    viewer: Option<String>,
    #[arg(long)]
    session_cookie: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the organized, invited and accepted partitions.
    Roster,
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        time: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        description: String,
    },
    Invite {
        event_id: EventId,
        email: String,
    },
    Accept {
        event_id: EventId,
    },
    Decline {
        event_id: EventId,
    },
    /// Delete an organized event. Requires `--yes`.
    Delete {
        event_id: EventId,
        #[arg(long)]
        yes: bool,
    },
    Search {
        text: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show one event with its attendee list.
    Show {
        event_id: EventId,
    },
}

#[derive(Serialize)]
struct RosterOutput<'a> {
    load_state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<&'a str>,
    #[serde(flatten)]
    roster: &'a client_core::Roster,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "dashboard=info,client_core=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if let Some(email) = args.viewer {
        settings.viewer_email = Some(email);
    }
    if let Some(cookie) = args.session_cookie {
        settings.session_cookie = Some(cookie);
    }

    let viewer_email = settings
        .viewer_email
        .clone()
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| anyhow!("no viewer email; pass --viewer or set DASHBOARD_VIEWER_EMAIL"))?;

    let mut options = HttpServiceOptions::new(settings.server_url.clone());
    options.request_timeout = settings.request_timeout();
    options.session_cookie = settings.session_cookie.clone();
    let service = HttpEventService::new(options)?;
    let dashboard = EventDashboard::with_search_debounce(
        Arc::new(service),
        ViewerSession::new(viewer_email),
        settings.search_debounce(),
    );
    info!(server_url = %settings.server_url, "dashboard: connected");

    match args.command {
        Command::Roster => {
            dashboard.reconcile().await?;
        }
        Command::Create {
            title,
            date,
            time,
            location,
            description,
        } => {
            let draft = EventDraft {
                title,
                date,
                time,
                location,
                description,
            };
            dashboard.reconcile().await?;
            let event_id = dashboard.create_event(&draft).await?;
            println!("created event_id={event_id}");
        }
        Command::Invite { event_id, email } => {
            dashboard.invite(&event_id, &email).await?;
            println!("invited {email} to event_id={event_id}");
        }
        Command::Accept { event_id } => {
            dashboard.reconcile().await?;
            dashboard.respond(&event_id, Decision::Accept).await?;
        }
        Command::Decline { event_id } => {
            dashboard.reconcile().await?;
            dashboard.respond(&event_id, Decision::Decline).await?;
        }
        Command::Delete { event_id, yes } => {
            if !yes {
                bail!("deleting event {event_id} cannot be undone; pass --yes to confirm");
            }
            dashboard.reconcile().await?;
            dashboard.delete_event(&event_id).await?;
        }
        Command::Search { text, date } => {
            let mut query = SearchQuery::text(text.unwrap_or_default());
            query.date = date;
            let wait = settings.search_debounce()
                + settings.request_timeout().unwrap_or(Duration::from_secs(60));
            let results = run_search(&dashboard, query, wait).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }
        Command::Show { event_id } => {
            let detail = dashboard.event_detail(&event_id).await?;
            if detail.event.is_none() {
                warn!(event_id = %event_id, "dashboard: event not found");
            }
            println!("{}", serde_json::to_string_pretty(&detail)?);
            return Ok(());
        }
    }

    print_roster(&dashboard).await
}

async fn run_search(
    dashboard: &EventDashboard,
    query: SearchQuery,
    wait: Duration,
) -> Result<Vec<client_core::RosterEntry>> {
    let mut events = dashboard.subscribe_events();
    dashboard.search().schedule(query).await;

    tokio::time::timeout(wait, async {
        loop {
            match events.recv().await {
                Ok(DashboardEvent::SearchUpdated(results)) => return Ok(results),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err(anyhow!("search event channel closed")),
            }
        }
    })
    .await
    .context("search did not finish in time")?
}

async fn print_roster(dashboard: &EventDashboard) -> Result<()> {
    let roster = dashboard.roster().await;
    let load_state = dashboard.load_state().await;
    let (state, failure) = match &load_state {
        LoadState::NotLoaded => ("not_loaded", None),
        LoadState::Loaded => ("loaded", None),
        LoadState::Failed { reason } => ("failed", Some(reason.as_str())),
    };
    let output = RosterOutput {
        load_state: state,
        failure,
        roster: &roster,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
