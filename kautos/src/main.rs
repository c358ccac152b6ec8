//! Command-line chronicler for the Kautos timeline.
//!
//! Resolves events and their context from the Notion timeline and asks
//! Claude for new or completed events.
//!
//! ```bash
//! kautos similar "Founding of Merkuna" --delta 100
//! kautos in-range --start -1090 --end -1080 --context-start -1200 --context-end -1000 \
//!     --location "Lower Antiyan Basin" --output local/output.json
//! ```

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use kautos_core::{Chronicler, Config, Event, RangeQuery, YearRange};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kautos")]
#[command(about = "Resolve and generate events of the Kautos timeline", version)]
struct Cli {
    /// Also write the JSON result to this file.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Override the generation temperature (0.0 to 1.0).
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// Override the Claude model.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one event, flattened.
    Event {
        /// Exact event name.
        name: String,
    },

    /// Print an event and the events near it in time and place.
    Context {
        name: String,
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Print every event starting inside a range.
    InRangeContext {
        #[arg(long, allow_negative_numbers = true)]
        start: i64,
        #[arg(long, allow_negative_numbers = true)]
        end: Option<i64>,
        #[arg(long)]
        location: Option<String>,
        /// Leave adjacent locations out.
        #[arg(long)]
        no_near: bool,
        /// Leave the event with this name out.
        #[arg(long)]
        exclude: Option<String>,
    },

    /// Generate a new event similar to an existing one.
    Similar {
        name: String,
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Fill the gaps of an existing event.
    Complete {
        name: String,
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Generate a new event inside a time range at a location.
    InRange {
        /// First year of the new event's range.
        #[arg(long, allow_negative_numbers = true)]
        start: i64,
        /// Last year of the new event's range.
        #[arg(long, allow_negative_numbers = true)]
        end: i64,
        /// First year of the context search.
        #[arg(long, allow_negative_numbers = true)]
        context_start: i64,
        /// Last year of the context search.
        #[arg(long, allow_negative_numbers = true)]
        context_end: i64,
        #[arg(long)]
        location: String,
        /// Leave adjacent locations out of the context.
        #[arg(long)]
        no_near: bool,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Years around the event to search for context.
    #[arg(short, long, default_value_t = 100)]
    delta: u32,

    /// Leave adjacent locations out.
    #[arg(long)]
    no_near: bool,

    /// Only search backwards in time from the event.
    #[arg(long)]
    asymmetric: bool,
}

#[derive(Serialize)]
struct ContextOutput<'a> {
    event: &'a Event,
    similar_events: &'a [Event],
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(temperature) = cli.temperature {
        config = config.with_temperature(temperature);
    }
    info!(model = %config.model, "configuration loaded");

    let chronicler = Chronicler::from_config(&config)?;
    let resolver = chronicler.resolver();
    let output = cli.output.as_deref();

    match cli.command {
        Command::Event { name } => {
            let event = resolver.resolve_by_name(&name).await?;
            emit(&event, output)?;
        }
        Command::Context { name, search } => {
            let (event, similar) = resolver
                .resolve_similar_to_event(&name, search.delta, !search.no_near, !search.asymmetric)
                .await?;
            emit(
                &ContextOutput {
                    event: &event,
                    similar_events: &similar,
                },
                output,
            )?;
        }
        Command::InRangeContext {
            start,
            end,
            location,
            no_near,
            exclude,
        } => {
            let mut query = RangeQuery::starting_from(start).near(!no_near);
            if let Some(end) = end {
                query = query.until(end);
            }
            if let Some(location) = location {
                query = query.at_location(location);
            }
            if let Some(exclude) = exclude {
                query = query.excluding(exclude);
            }
            let events = resolver.resolve_in_range(&query).await?;
            emit(&events, output)?;
        }
        Command::Similar { name, search } => {
            let event = chronicler
                .generate_similar_event(&name, search.delta, !search.no_near, !search.asymmetric)
                .await?;
            emit_generated(&event, output)?;
        }
        Command::Complete { name, search } => {
            let event = chronicler
                .complete_event(&name, search.delta, !search.no_near, !search.asymmetric)
                .await?;
            emit_generated(&event, output)?;
        }
        Command::InRange {
            start,
            end,
            context_start,
            context_end,
            location,
            no_near,
        } => {
            let event = chronicler
                .generate_event_in_range(
                    YearRange::new(start, end),
                    YearRange::new(context_start, context_end),
                    &location,
                    !no_near,
                )
                .await?;
            emit_generated(&event, output)?;
        }
    }

    Ok(())
}

/// Print `value` as pretty JSON and optionally write it to `output`.
fn emit<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");

    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, &json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "result written");
    }
    Ok(())
}

fn emit_generated(event: &Event, output: Option<&Path>) -> Result<()> {
    emit(event, output)?;
    if let Some(description) = &event.description {
        println!("\n{description}");
    }
    Ok(())
}
