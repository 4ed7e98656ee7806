//! Kagami CLI
//!
//! Creates the image collection, ingests a directory of images, and runs
//! reverse image searches against a Milvus server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kagami::config::{DEFAULT_DB_IMAGES, DEFAULT_LIMIT, DEFAULT_QUERY_IMAGE};
use kagami::{Match, Pipeline, PipelineConfig};
use kagami_core::{Backbone, FeatureExtractor, WeightSource};
use kagami_vecdb::{MilvusClient, MilvusConfig, VectorIndex};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI arguments
#[derive(Parser)]
#[command(name = "kagami")]
#[command(about = "Reverse image search backed by Milvus")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Milvus endpoint
    #[arg(long, global = true, env = "KAGAMI_MILVUS_URI", default_value = kagami_vecdb::milvus::DEFAULT_URI)]
    uri: String,

    /// Milvus database name
    #[arg(long, global = true, env = "KAGAMI_DB_NAME", default_value = kagami_vecdb::milvus::DEFAULT_DB_NAME)]
    db_name: String,

    /// Milvus bearer token
    #[arg(long, global = true, env = "KAGAMI_MILVUS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Collection holding the image embeddings
    #[arg(short, long, global = true, env = "KAGAMI_COLLECTION", default_value = kagami_vecdb::collection::DEFAULT_COLLECTION)]
    collection: String,

    /// Feature extraction backbone (resnet18, resnet34, resnet50)
    #[arg(short, long, global = true, env = "KAGAMI_MODEL", default_value = "resnet34")]
    model: Backbone,

    /// Local safetensors weights instead of downloading from the hub
    #[arg(short, long, global = true, env = "KAGAMI_WEIGHTS")]
    weights: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, global = true, default_value_t = kagami_vecdb::milvus::DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the collection if it does not exist
    Init,
    /// Embed every image in a directory and insert it
    Ingest {
        /// Directory to scan recursively
        #[arg(default_value = DEFAULT_DB_IMAGES)]
        dir: PathBuf,

        /// Records per insert call
        #[arg(short, long, default_value_t = kagami::config::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Find the images closest to a query image
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Only print the matches, do not write image files
        #[arg(long)]
        no_save: bool,
    },
    /// Ensure the collection, optionally ingest, then search and save
    Run {
        #[command(flatten)]
        query: QueryArgs,

        /// Ingest this directory before searching
        #[arg(long)]
        ingest: Option<PathBuf>,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Query image
    #[arg(default_value = DEFAULT_QUERY_IMAGE)]
    image: PathBuf,

    /// Number of matches
    #[arg(short = 'k', long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,

    /// Directory the matches are written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        let weights = match &self.weights {
            Some(path) => WeightSource::Local(path.clone()),
            None => WeightSource::default(),
        };
        let mut config = PipelineConfig::new()
            .with_collection_name(self.collection.clone())
            .with_backbone(self.model)
            .with_weights(weights);

        match &self.command {
            Commands::Ingest { batch_size, .. } => {
                config = config.with_batch_size(*batch_size);
            }
            Commands::Search { query, .. } | Commands::Run { query, .. } => {
                config = config
                    .with_limit(query.limit)
                    .with_output_dir(query.out_dir.clone());
            }
            Commands::Init => {}
        }
        config
    }

    fn milvus_config(&self) -> MilvusConfig {
        MilvusConfig::new(self.uri.clone())
            .with_db_name(self.db_name.clone())
            .with_token(self.token.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

fn print_matches(matches: &[Match]) -> Result<()> {
    for found in matches {
        println!("{}", serde_json::to_string(found)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.pipeline_config();

    let index = MilvusClient::new(cli.milvus_config()).context("failed to build Milvus client")?;

    match &cli.command {
        Commands::Init => {
            // No model needed just to create the collection.
            let created = index.ensure_collection(&config.collection)?;
            info!(collection = %config.collection.name, created, "collection ready");
        }
        Commands::Ingest { dir, .. } => {
            let pipeline = load_pipeline(index, config)?;
            pipeline.ensure_collection()?;
            let report = pipeline
                .ingest(dir)
                .with_context(|| format!("failed to ingest {}", dir.display()))?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Commands::Search { query, no_save } => {
            let pipeline = load_pipeline(index, config)?;
            pipeline.ensure_collection()?;
            let matches = pipeline
                .search(&query.image)
                .with_context(|| format!("search for {} failed", query.image.display()))?;
            print_matches(&matches)?;
            if !no_save {
                pipeline.save_matches(&matches, &query.out_dir)?;
            }
        }
        Commands::Run { query, ingest } => {
            let pipeline = load_pipeline(index, config)?;
            if let Some(dir) = ingest {
                pipeline.ensure_collection()?;
                pipeline
                    .ingest(dir)
                    .with_context(|| format!("failed to ingest {}", dir.display()))?;
            }
            let report = pipeline.run(&query.image)?;
            print_matches(&report.matches)?;
        }
    }

    Ok(())
}

fn load_pipeline(
    index: MilvusClient,
    config: PipelineConfig,
) -> Result<Pipeline<FeatureExtractor, MilvusClient>> {
    let extractor = FeatureExtractor::new(config.backbone, &config.weights)
        .context("failed to load feature extractor")?;
    Ok(Pipeline::new(extractor, index, config)?)
}
