//! Parcel custody - command line front end
//!
//! Every command loads the JSON snapshot store, runs one operation through
//! the engines, and saves the snapshot back when something changed.
//!
//! Module structure:
//! - `domain/` - Core business types (Parcel, rules, custody state machine)
//! - `io/` - External interfaces (record store, artifact output)
//! - `services/` - Business logic (Classifier, CustodyService, Notifier)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use parcel_custody::domain::parcel::{today, ParcelView};
use parcel_custody::domain::types::{ControlNumber, CustomerId, Parcel};
use parcel_custody::infra::{Config, Metrics};
use parcel_custody::io::{ArtifactWriter, MemoryStore};
use parcel_custody::services::{
    ClassificationSession, ClassificationSettings, Classifier, CompositionContext, CustodyService, Notifier,
};
use std::io::Read;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Parcel custody - classification, custody lifecycle, and pickup reminders
#[derive(Parser, Debug)]
#[command(name = "parcel-custody", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,

    /// Override the store snapshot file from the config
    #[arg(long)]
    store: Option<String>,

    /// Reference date (defaults to today)
    #[arg(long)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify pasted tab-separated rows and create parcels
    Import {
        /// Input file, or "-" for stdin
        #[arg(default_value = "-")]
        input: String,
        /// Assign a type to all pending rows with a prefix: PREFIX=TYPE
        #[arg(long = "assign", value_name = "PREFIX=TYPE")]
        assign: Vec<String>,
        /// Assign a type to one pending row: INDEX=TYPE
        #[arg(long = "row", value_name = "INDEX=TYPE")]
        row: Vec<String>,
        /// Persist derived rules for pending rows and create all parcels
        #[arg(long)]
        confirm: bool,
    },
    /// List parcels, optionally filtered by view
    List {
        #[arg(long)]
        view: Option<ParcelView>,
    },
    /// Mark parcels delivered
    Deliver { ids: Vec<i64> },
    /// Mark parcels returned to sender
    Return { ids: Vec<i64> },
    /// Put a delivered/returned parcel back to awaiting
    Revert { id: i64 },
    /// Archive one completed parcel
    Archive { id: i64 },
    /// Archive every completed parcel
    ArchiveCompleted,
    /// Unarchive a parcel
    Unarchive { id: i64 },
    /// Link a parcel to a customer record
    Link { id: i64, customer: i64 },
    /// List message templates
    Templates,
    /// Print a single outbound link
    Send {
        id: i64,
        /// Template names, in order
        #[arg(short, long = "template", required = true)]
        templates: Vec<String>,
    },
    /// Generate a batch artifact (all awaiting parcels when no ids are given)
    Notify {
        ids: Vec<i64>,
        /// Template names, in order
        #[arg(short, long = "template", required = true)]
        templates: Vec<String>,
        /// Also write the artifact as JSON
        #[arg(long)]
        json: bool,
    },
}

fn control_numbers(ids: &[i64]) -> Vec<ControlNumber> {
    ids.iter().copied().map(ControlNumber).collect()
}

fn split_assignment(raw: &str) -> anyhow::Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
            Ok((key.trim(), value.trim()))
        }
        _ => bail!("expected KEY=TYPE, got {raw:?}"),
    }
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read input file {input}"))
}

fn print_parcel(parcel: &Parcel, today: NaiveDate) {
    println!(
        "{:>6}  {:<10} {:<28} {:<18} {:<15} {}  {:>3.0}%",
        parcel.control_number,
        parcel.view(today).as_str(),
        parcel.recipient_name,
        parcel.object_type,
        parcel.tracking_code.as_deref().unwrap_or("-"),
        parcel.storage_deadline,
        parcel.progress(today) * 100.0,
    );
}

fn print_pending(session: &ClassificationSession) {
    println!("{} rows need a type before import:", session.unclassified().len());
    for (i, pending) in session.unclassified().iter().enumerate() {
        println!(
            "  [{i}] {:<15} {:<28} -> {}",
            pending.row.tracking_code.as_deref().unwrap_or("-"),
            pending.row.recipient_name,
            pending.row.object_type
        );
    }
    println!("Re-run with --assign PREFIX=TYPE / --row INDEX=TYPE and --confirm.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);
    let store_file = args.store.clone().unwrap_or_else(|| config.store_file().to_string());
    let today = args.today.unwrap_or_else(today);

    info!(
        config_file = %config.config_file(),
        store_file = %store_file,
        object_types = %config.object_types().len(),
        today = %today,
        git_hash = env!("GIT_HASH"),
        "config_loaded"
    );

    let store = Arc::new(
        MemoryStore::open(&store_file, &config)
            .with_context(|| format!("Failed to open store {store_file}"))?,
    );
    let metrics = Arc::new(Metrics::new());
    let classifier =
        Classifier::new(store.clone(), ClassificationSettings::from_config(&config), metrics.clone());
    let custody = CustodyService::new(store.clone(), metrics.clone());
    let notifier = Notifier::new(store.clone(), CompositionContext::from_config(&config), metrics.clone());

    let mut dirty = false;

    match args.command {
        Command::Import { input, assign, row, confirm } => {
            let text = read_input(&input)?;
            let mut session = classifier.begin(&text).await?;

            for raw in &assign {
                let (prefix, object_type) = split_assignment(raw)?;
                let count = session.assign_prefix(prefix, object_type);
                info!(prefix = %prefix, object_type = %object_type, rows = %count, "prefix_assigned");
            }
            for raw in &row {
                let (index, object_type) = split_assignment(raw)?;
                let index: usize = index.parse().with_context(|| format!("Bad row index {index:?}"))?;
                session.assign(index, object_type)?;
            }

            let rows = if !session.is_pending() {
                session.ready_rows()?
            } else if confirm {
                let confirmation = classifier.confirm(session).await?;
                for rule in &confirmation.new_rules {
                    println!("rule {} -> {} ({} days)", rule.prefix, rule.object_type, rule.storage_days);
                }
                for conflict in &confirmation.conflicts {
                    println!(
                        "rule {} replaced: was {} ({} days)",
                        conflict.prefix, conflict.previous.object_type, conflict.previous.storage_days
                    );
                }
                dirty = true;
                confirmation.final_rows
            } else {
                print_pending(&session);
                return Ok(());
            };

            let parcels = classifier.create_parcels(&rows, today).await?;
            dirty |= !parcels.is_empty();
            for parcel in &parcels {
                print_parcel(parcel, today);
            }
        }
        Command::List { view } => {
            for parcel in custody.list(view, today).await? {
                print_parcel(&parcel, today);
            }
        }
        Command::Deliver { ids } => {
            let changed = custody.bulk_deliver(&control_numbers(&ids)).await?;
            println!("{changed} parcels delivered");
            dirty = changed > 0;
        }
        Command::Return { ids } => {
            let changed = custody.bulk_return(&control_numbers(&ids)).await?;
            println!("{changed} parcels returned");
            dirty = changed > 0;
        }
        Command::Revert { id } => {
            print_parcel(&custody.revert(ControlNumber(id)).await?, today);
            dirty = true;
        }
        Command::Archive { id } => {
            print_parcel(&custody.archive(ControlNumber(id)).await?, today);
            dirty = true;
        }
        Command::ArchiveCompleted => {
            let archived = custody.archive_completed().await?;
            println!("{archived} parcels archived");
            dirty = archived > 0;
        }
        Command::Unarchive { id } => {
            print_parcel(&custody.unarchive(ControlNumber(id)).await?, today);
            dirty = true;
        }
        Command::Link { id, customer } => {
            custody.link_to_customer(ControlNumber(id), CustomerId(customer)).await?;
            dirty = true;
        }
        Command::Templates => {
            for template in notifier.templates().await? {
                println!("{}:\n{}\n", template.name, template.body);
            }
        }
        Command::Send { id, templates } => {
            let composed = notifier.compose_named(&templates).await?;
            let message = notifier.compose_for(ControlNumber(id), &composed, today).await?;
            println!("{}", message.link);
        }
        Command::Notify { ids, templates, json } => {
            let composed = notifier.compose_named(&templates).await?;
            let ids = if ids.is_empty() {
                custody
                    .list(Some(ParcelView::Awaiting), today)
                    .await?
                    .into_iter()
                    .chain(custody.list(Some(ParcelView::Expired), today).await?)
                    .map(|p| p.control_number)
                    .collect()
            } else {
                control_numbers(&ids)
            };
            let artifact = notifier.generate_batch(&ids, &composed, today).await?;

            let writer = ArtifactWriter::new(config.output_dir());
            let title = config.facility_name().unwrap_or("Avisos de retirada");
            let path = writer.write_html(&artifact, title)?;
            println!("{} entries, {} skipped -> {}", artifact.entries.len(), artifact.skipped.len(), path.display());
            if json {
                println!("{}", writer.write_json(&artifact)?.display());
            }
        }
    }

    if dirty {
        store.save(&store_file).with_context(|| format!("Failed to save store {store_file}"))?;
    }
    metrics.report().log();
    Ok(())
}
