use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use renec_harvester::checkpoint::{self, CheckpointStore, DataLayout};
use renec_harvester::coordinator::{Coordinator, CoordinatorConfig, RunOutcome};
use renec_harvester::environment::{HarvestConfig, DEFAULT_UNIVERSE_FILE};
use renec_harvester::extract::{
    BrowserlessSource, DetailSource, Extractor, PortalApiSource, RetryPolicy, Source,
};
use renec_harvester::logging::configure_logging;
use renec_harvester::registry::{self, Registries};
use renec_harvester::stats::RegistryStats;
use renec_harvester::status::StatusReport;
use renec_harvester::universe::WorkUniverse;

#[derive(Parser)]
#[clap(
    name = "renec-harvester",
    about = "Harvest RENEC certifier data and build deduplicated registries"
)]
struct Cli {
    /// Directory holding the checkpoint and every generated artifact
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON or text file listing the work-item codes
    #[clap(long, global = true)]
    universe: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every remaining work item, resuming from the checkpoint
    Extract {
        /// Concurrent extractions
        #[clap(short, long)]
        workers: Option<usize>,

        /// Persist the checkpoint every N completions
        #[clap(short, long)]
        save_every: Option<usize>,

        /// Attempt previously failed items again
        #[clap(long)]
        retry_failed: bool,
    },

    /// Build the registries, matrix and statistics from extracted data
    Build,

    /// Show extraction progress
    Status {
        /// Build the registries if extraction is complete
        #[clap(short, long)]
        build: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let args = Cli::parse();

    let mut config = HarvestConfig::from_env()?;
    if let Some(dir) = args.data_dir {
        if std::env::var_os("RENEC_UNIVERSE_FILE").is_none() && args.universe.is_none() {
            config.universe_file = dir.join(DEFAULT_UNIVERSE_FILE);
        }
        config.data_dir = dir;
    }
    if let Some(universe) = args.universe {
        config.universe_file = universe;
    }

    match args.command {
        Commands::Extract {
            workers,
            save_every,
            retry_failed,
        } => {
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(save_every) = save_every {
                config.save_every = save_every;
            }
            config.validate()?;
            extract(&config, retry_failed).await?;
        }
        Commands::Build => {
            build(&config)?;
        }
        Commands::Status { build: and_build } => {
            status(&config, and_build)?;
        }
    }

    Ok(())
}

fn detail_sources(config: &HarvestConfig) -> Vec<Arc<dyn DetailSource>> {
    config
        .sources
        .iter()
        .map(|source| -> Arc<dyn DetailSource> {
            match source {
                Source::Api => Arc::new(PortalApiSource::new(&config.api_base, config.timeout)),
                Source::RenderedPage => Arc::new(BrowserlessSource::new(
                    &config.browserless_url,
                    config.browserless_token.as_deref(),
                    &config.portal_url,
                    config.timeout,
                )),
            }
        })
        .collect()
}

async fn extract(config: &HarvestConfig, retry_failed: bool) -> Result<()> {
    // Fatal before any extraction begins.
    let universe = WorkUniverse::load(&config.universe_file)?;
    let layout = DataLayout::new(&config.data_dir);
    let store = CheckpointStore::new(layout.checkpoint());
    let mut checkpoint = store.load()?;

    if retry_failed {
        let reset = checkpoint.reset_failed();
        info!("Cleared {} failed item(s) for another attempt", reset);
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        let mut interrupts = 0;
        loop {
            if signal::ctrl_c().await.is_err() {
                error!("Failed to listen for ctrl-c");
                return;
            }
            interrupts += 1;
            if interrupts == 1 {
                warn!("Interrupt received, finishing in-flight extractions (ctrl-c again to abort)");
                let _ = cancel_tx.send(true);
            } else {
                // Unsaved completions since the last checkpoint are lost.
                warn!("Second interrupt received, exiting without draining");
                std::process::exit(130);
            }
        }
    });

    let extractor = Extractor::new(
        detail_sources(config),
        RetryPolicy {
            max_retries: config.max_retries,
            delay: config.retry_delay,
        },
    );
    let mut coordinator = Coordinator::new(
        Arc::new(extractor),
        layout,
        CoordinatorConfig {
            workers: config.workers,
            save_every: config.save_every,
            request_delay: config.request_delay,
        },
    );

    let summary = coordinator
        .run(&universe, &mut checkpoint, cancel_rx)
        .await
        .context("extraction aborted; the last saved checkpoint is the recovery point")?;

    println!(
        "Attempted: {} | succeeded: {} | failed: {} | remaining: {}",
        summary.attempted, summary.succeeded, summary.failed, summary.remaining
    );
    if summary.outcome == RunOutcome::Interrupted {
        println!("Interrupted. Run `extract` again to resume.");
    }
    Ok(())
}

fn build(config: &HarvestConfig) -> Result<()> {
    let layout = DataLayout::new(&config.data_dir);
    let records = checkpoint::load_records(&layout)?;
    if records.is_empty() {
        anyhow::bail!(
            "no extraction data found in {}; run `extract` first",
            layout.dir().display()
        );
    }

    let registries = registry::build(&records);
    let stats = RegistryStats::compute(&registries);
    registry::write_artifacts(&layout, &registries, &stats)?;

    print_summary(&registries, &stats);
    Ok(())
}

fn print_summary(registries: &Registries, stats: &RegistryStats) {
    let summary = &stats.extraction_summary;
    println!("ECs processed: {}", summary.total_ecs_processed);
    println!("ECs with certifiers: {}", summary.ecs_with_certifiers);
    println!("Certifier relationships: {}", summary.total_certifier_relationships);
    println!("Unique certifiers: {}", registries.certifiers.len());
    println!("Unique courses/centres: {}", registries.offerings.len());

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("#"),
        Cell::new("ID"),
        Cell::new("Certifier"),
        Cell::new("ECs"),
    ]));
    for (rank, entity) in registries.certifiers.iter().take(5).enumerate() {
        let name: String = entity.canonical_name.chars().take(50).collect();
        table.add_row(Row::new(vec![
            Cell::new(&(rank + 1).to_string()),
            Cell::new(&entity.id),
            Cell::new(&name),
            Cell::new(&entity.relation_count.to_string()),
        ]));
    }
    table.printstd();
}

fn status(config: &HarvestConfig, and_build: bool) -> Result<()> {
    let universe = WorkUniverse::load(&config.universe_file)?;
    let layout = DataLayout::new(&config.data_dir);
    let checkpoint = CheckpointStore::new(layout.checkpoint()).load()?;

    let report = StatusReport::from_parts(universe.len(), &checkpoint);
    report.to_table().printstd();

    if and_build {
        if report.complete {
            build(config)?;
        } else {
            println!("Extraction still in progress; not building registries.");
        }
    }
    Ok(())
}
