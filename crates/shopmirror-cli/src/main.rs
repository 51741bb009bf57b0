mod ingest;
mod stats;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shopmirror-cli")]
#[command(about = "Storefront mirror command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Ingest a batch file or replay an audit log
    Ingest {
        /// Entity kind (customers, products, orders). Optional when the file
        /// declares `sync_type` or is an audit log.
        #[arg(long)]
        kind: Option<String>,
        /// Envelope JSON file, or a `.jsonl` audit log to replay
        file: PathBuf,
        /// Validate the file without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Product sales statistics
    Stats {
        #[command(subcommand)]
        command: StatsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum StatsCommands {
    /// KPI summary for a product
    Summary {
        #[arg(long)]
        product: i64,
        /// Aggregate over the product's whole family
        #[arg(long)]
        include_variants: bool,
        /// Inclusive lower bound (RFC 3339)
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Inclusive upper bound (RFC 3339)
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    /// Show a product's family
    Family {
        #[arg(long)]
        product: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("SHOPMIRROR_LOG_LEVEL").unwrap_or_else(|_| "info".into()))
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("shopmirror-cli: no command given; see --help");
        return Ok(());
    };

    if let Commands::Ingest {
        kind,
        file,
        dry_run: true,
    } = &command
    {
        return ingest::run_ingest_dry_run(file, kind.as_deref());
    }

    let config = shopmirror_core::load_app_config()?;
    let pool = shopmirror_db::connect_pool(
        &config.database_url,
        shopmirror_db::PoolConfig::from_app_config(&config),
    )
    .await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            shopmirror_db::ping(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = shopmirror_db::run_migrations(&pool).await?;
            println!("migrations applied: {applied}");
        }
        Commands::Ingest { kind, file, .. } => {
            ingest::run_ingest(&pool, &config, &file, kind.as_deref()).await?;
        }
        Commands::Stats {
            command:
                StatsCommands::Summary {
                    product,
                    include_variants,
                    from,
                    to,
                },
        } => {
            let range = shopmirror_core::DateRange { from, to };
            stats::run_summary(&pool, product, include_variants, range).await?;
        }
        Commands::Stats {
            command: StatsCommands::Family { product },
        } => stats::run_family(&pool, product).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
