use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repograph::{Config, Direction, RepoGraphClient, SearchMode, SearchOptions};
use serde::Serialize;
use std::path::PathBuf;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "repograph",
    about = "Index Java repositories into a code graph and search it",
    version = VERSION
)]
struct Cli {
    /// Configuration file (TOML); defaults to <config_dir>/repograph/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite graph database path
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Vector index backend: lancedb or memory
    #[arg(long, global = true)]
    vector_backend: Option<String>,

    /// Embedding provider: fastembed or hashing
    #[arg(long, global = true)]
    embedding_provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a branch if it is new or its head commit moved
    Index {
        url: String,
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Show the index state of a branch without indexing it
    Status {
        url: String,
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Search indexed entities
    Search {
        query: String,
        /// Restrict to repository ids (repeatable)
        #[arg(long = "repo")]
        repos: Vec<String>,
        /// structural, semantic, temporal or hybrid; detected from the query if absent
        #[arg(long)]
        mode: Option<SearchMode>,
        /// Lower the mode's result ceiling
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Direct relationships of an entity
    Deps {
        entity_id: String,
        #[arg(long, default_value_t = 1)]
        depth: usize,
        /// incoming, outgoing or both
        #[arg(long, default_value = "both")]
        direction: Direction,
    },

    /// Shortest relationship path between two entities
    Explain { from: String, to: String },

    /// List indexed repositories
    Repos,

    /// Entity counts for one repository
    Stats { repository_id: String },

    /// Delete a branch's index
    Remove {
        url: String,
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Print the effective configuration
    Config,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

/// Defaults < config file < environment < command-line flags
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            config.apply_env_overrides();
            config
        }
        None => Config::new()?,
    };

    if let Some(path) = &cli.db_path {
        config.graph_store.db_path = path.clone();
    }
    if let Some(backend) = &cli.vector_backend {
        config.vector_index.backend = backend.clone();
    }
    if let Some(provider) = &cli.embedding_provider {
        config.embedding.provider = provider.clone();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Commands::Config = cli.command {
        return print_json(&config);
    }

    let client = RepoGraphClient::with_config(config).await?;

    match cli.command {
        Commands::Index { url, branch } => {
            let outcome = client.ensure_indexed(&url, &branch).await?;
            print_json(&outcome)?;
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Status { url, branch } => {
            print_json(&client.check_index_status(&url, &branch).await?)?;
        }
        Commands::Search {
            query,
            repos,
            mode,
            limit,
        } => {
            let options = SearchOptions {
                repository_ids: repos,
                preferred_mode: mode,
                max_results: limit,
            };
            print_json(&client.search(&query, &options).await?)?;
        }
        Commands::Deps {
            entity_id,
            depth,
            direction,
        } => {
            print_json(&client.find_dependencies(&entity_id, depth, direction).await?)?;
        }
        Commands::Explain { from, to } => {
            print_json(&client.explain_relationship(&from, &to).await?)?;
        }
        Commands::Repos => {
            print_json(&client.list_repositories().await?)?;
        }
        Commands::Stats { repository_id } => {
            print_json(&client.repository_stats(&repository_id).await?)?;
        }
        Commands::Remove { url, branch } => {
            let removed = client.remove_repository(&url, &branch).await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        // printed before the client is built
        Commands::Config => {}
    }

    client.shutdown().await;
    Ok(())
}
