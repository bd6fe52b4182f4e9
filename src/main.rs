use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use vendure_storyblok_sync::catalog;
use vendure_storyblok_sync::config;
use vendure_storyblok_sync::model::{EntityKind, OperationType, SyncJob, SyncResponse};
use vendure_storyblok_sync::processor::SyncProcessor;
use vendure_storyblok_sync::reconcile::{run_full_sync, RetryPolicy};
use vendure_storyblok_sync::storyblok::StoryblokClient;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Product,
    Variant,
    Collection,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Product => EntityKind::Product,
            KindArg::Variant => EntityKind::Variant,
            KindArg::Collection => EntityKind::Collection,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OperationArg {
    Create,
    Update,
    Delete,
}

impl From<OperationArg> for OperationType {
    fn from(op: OperationArg) -> Self {
        match op {
            OperationArg::Create => OperationType::Create,
            OperationArg::Update => OperationType::Update,
            OperationArg::Delete => OperationType::Delete,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sweep every entity of a kind into Storyblok, with bounded retries
    FullSync {
        #[arg(long, value_enum)]
        kind: KindArg,
    },
    /// Sync a single entity through the same pipeline
    Sync {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        id: i64,
        #[arg(long, value_enum, default_value = "update")]
        operation: OperationArg,
    },
    /// Print an example config file
    ExampleConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Command::ExampleConfig = args.command {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))?;
    let catalog = Arc::new(catalog::load_snapshot(Path::new(&cfg.catalog.file))?);
    let content = Arc::new(StoryblokClient::from_config(&cfg.storyblok)?);
    let processor = SyncProcessor::new(catalog.clone(), content);

    match args.command {
        Command::FullSync { kind } => {
            let policy = RetryPolicy::from_config(&cfg.sync);
            let outcome =
                run_full_sync(kind.into(), &processor, catalog.as_ref(), &policy).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Command::Sync {
            kind,
            id,
            operation,
        } => {
            let job = SyncJob::new(kind.into(), id, operation.into());
            info!(kind = %job.entity_type, id, op = %job.operation, "manual sync");
            let response = SyncResponse::new(id, processor.process(&job).await);
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }
        Command::ExampleConfig => unreachable!(),
    }
    Ok(())
}
