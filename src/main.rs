use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use geopages::clock::TokioSleeper;
use geopages::config;
use geopages::gateway::AnthropicClient;
use geopages::pipeline::ContentPipeline;
use geopages::publish::pacing::Pacer;
use geopages::publish::{Publisher, SchemaFilter};
use geopages::refdata;
use geopages::schema::LocalBusinessSchema;
use geopages::store::sqlite::SqlitePageStore;

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
    /// Generate or update every region and sub-region page
    All,
    /// Generate or update one region page
    Region { region: String },
    /// Generate or update one sub-region page
    Subregion { region: String, subregion: String },
    /// Generate or update every sub-region page of a region
    Subregions {
        region: String,
        /// Also refresh the region page first
        #[arg(long)]
        with_region: bool,
    },
    /// Re-run the update branch for every stored page
    RefreshAll,
    /// Delete a sub-region page, or a region page plus all of its sub-region pages
    Delete {
        region: String,
        subregion: Option<String>,
    },
    /// Regenerate structured data for existing pages, without generation calls
    Schema {
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        subregion: Option<String>,
        /// Only touch region-level pages
        #[arg(long)]
        region_only: bool,
    },
    /// Probe the generation API with the configured credential
    Check,
    /// Print the example configuration file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    if matches!(args.command, Command::InitConfig) {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let sleeper = Arc::new(TokioSleeper);
    let client = AnthropicClient::new(&cfg.anthropic, sleeper.clone());

    if matches!(args.command, Command::Check) {
        if !client.is_configured() {
            return Err(anyhow!(
                "no API credential: set anthropic.api_key or ANTHROPIC_API_KEY"
            ));
        }
        return match client.validate_credentials().await? {
            true => {
                println!("credential OK");
                Ok(())
            }
            false => Err(anyhow!("probe succeeded but reply lacked the expected token")),
        };
    }

    let refdata_path = match cfg.app.refdata_file.trim() {
        "" => None,
        path => Some(PathBuf::from(path)),
    };
    let refdata = Arc::new(refdata::load(refdata_path.as_deref())?);
    info!(
        regions = refdata.regions.len(),
        keywords = refdata.keywords.len(),
        "reference data loaded"
    );

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/geopages.db", cfg.app.data_dir));
    let store = Arc::new(SqlitePageStore::connect(&database_url).await?);

    let pipeline = ContentPipeline::new(Arc::new(client), refdata.clone(), cfg.site.clone());
    let schema = Arc::new(LocalBusinessSchema::new(cfg.site.clone()));
    let pacer = Pacer::new(Duration::from_secs(cfg.app.pacing_seconds), sleeper);
    let publisher = Publisher::new(store, pipeline, schema, refdata, pacer);

    match args.command {
        Command::All => {
            let summary = publisher.publish_all().await?;
            println!("{summary}");
        }
        Command::Region { region } => {
            let summary = publisher.publish_region(&region).await?;
            println!("{summary}");
        }
        Command::Subregion { region, subregion } => {
            let summary = publisher.publish_subregion(&region, &subregion).await?;
            println!("{summary}");
        }
        Command::Subregions {
            region,
            with_region,
        } => {
            let summary = publisher
                .publish_region_subregions(&region, with_region)
                .await?;
            println!("{summary}");
        }
        Command::RefreshAll => {
            let summary = publisher.refresh_all().await?;
            println!("{summary}");
        }
        Command::Delete { region, subregion } => {
            let deleted = match subregion {
                Some(subregion) => publisher.delete_subregion(&region, &subregion).await?,
                None => publisher.delete_region(&region).await?,
            };
            println!("{deleted} page(s) deleted");
        }
        Command::Schema {
            region,
            subregion,
            region_only,
        } => {
            let filter = SchemaFilter {
                region,
                subregion,
                region_only,
            };
            let count = publisher.regenerate_schema(&filter).await?;
            println!("structured data regenerated for {count} page(s)");
        }
        Command::Check | Command::InitConfig => unreachable!("handled above"),
    }

    Ok(())
}
