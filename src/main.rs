use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod align;
mod config;
mod dataset;
mod dates;
mod error;
mod ingest;
mod logging;
mod metrics;
mod models;
mod periods;
mod presentation;
mod report;
mod schema;
mod stats;
mod store;
mod views;

use config::{Manifest, Settings};
use dataset::AppContext;
use ingest::IngestOutcome;
use store::PgDocumentStore;

#[derive(Parser)]
#[command(name = "wearable-health-dashboard")]
#[command(about = "Fitbit and WHOOP health data ingestion and dashboard views", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the document store schema
    InitDb,
    /// Ingest every source file listed in a manifest
    Ingest {
        /// TOML manifest; the bundled source list is used when omitted
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Ingest one CSV file into a collection
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        collection: String,
    },
    /// List subject ids found in the multi-subject sources
    Subjects,
    /// Render every dashboard view to markdown
    Report {
        #[arg(long)]
        subject: Option<i64>,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
    /// Write every dashboard view as JSON
    Export {
        #[arg(long)]
        subject: Option<i64>,
        #[arg(long, default_value = "dashboard.json")]
        out: PathBuf,
    },
}

fn print_outcome(outcome: &IngestOutcome) {
    println!(
        "Inserted {} documents from {} into {}.",
        outcome.confirmed,
        outcome.path.display(),
        outcome.collection
    );
    if outcome.unparsed_dates > 0 {
        println!("  {} date cells could not be parsed.", outcome.unparsed_dates);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let database_url = settings
        .require_database_url()
        .context("DATABASE_URL must point at the Postgres document store")?
        .to_string();

    let store =
        PgDocumentStore::connect(&database_url, settings.load.timeout, settings.insert_batch)
            .await
            .context("failed to connect to Postgres")?;
    let store = Arc::new(store);
    let context = AppContext::new(settings, store.clone());

    match cli.command {
        Commands::InitDb => {
            store.init_schema().await?;
            println!("Schema ready.");
        }
        Commands::Ingest { manifest } => {
            let manifest = match manifest {
                Some(path) => Manifest::load(&path)?,
                None => Manifest::default(),
            };
            let outcomes =
                ingest::ingest_sources(context.store.as_ref(), &manifest.sources).await;

            let mut failed = 0usize;
            for (source, outcome) in &outcomes {
                match outcome {
                    Ok(outcome) => print_outcome(outcome),
                    Err(err) => {
                        failed += 1;
                        println!("Failed {}: {err}", source.path.display());
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{failed} of {} sources failed to ingest", outcomes.len());
            }
        }
        Commands::Import { csv, collection } => {
            let outcome = ingest::ingest_file(context.store.as_ref(), &csv, &collection)
                .await
                .with_context(|| format!("failed to ingest {}", csv.display()))?;
            print_outcome(&outcome);
        }
        Commands::Subjects => {
            let dataset = context.load_dataset().await?;
            let activity = dataset::subject_ids(&dataset.activity.rows);
            let sleep = dataset::subject_ids(&dataset.sleep_day.rows);

            if activity.is_empty() && sleep.is_empty() {
                println!("No subjects found.");
                return Ok(());
            }
            println!("Activity subjects ({}):", activity.len());
            for id in &activity {
                println!("- {id}");
            }
            println!("Sleep subjects ({}):", sleep.len());
            for id in &sleep {
                println!("- {id}");
            }
        }
        Commands::Report { subject, out } => {
            let dataset = context.load_dataset().await?;
            let dashboard = views::build_dashboard(&dataset, subject);
            let report = report::build_report(subject, &dashboard);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { subject, out } => {
            let dataset = context.load_dataset().await?;
            let dashboard = views::build_dashboard(&dataset, subject);
            let json = serde_json::to_string_pretty(&dashboard)?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Dashboard written to {}.", out.display());
        }
    }

    Ok(())
}
