use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use happynest_core::{storage::Database, AppConfig};

mod commands;

use commands::digest::DigestArgs;

#[derive(Parser)]
#[command(name = "happynest")]
#[command(author, version, about = "Good-news feed server and digest runner")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Fetch, classify and store good news for a place
    Digest {
        /// City to search for
        #[arg(long, conflicts_with = "global")]
        city: Option<String>,
        #[arg(long, requires = "city")]
        state: Option<String>,
        #[arg(long, requires = "city")]
        country: Option<String>,
        /// Latitude; reverse geocoded when no city is given
        #[arg(long, requires = "lon", allow_negative_numbers = true, conflicts_with = "global")]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Digest a random sample of cities
        #[arg(long)]
        global: bool,
        /// Number of cities for --global
        #[arg(long, requires = "global")]
        cities: Option<usize>,
        /// Also synthesize a spoken digest
        #[arg(long)]
        narrate: bool,
    },
    /// List stored articles
    List {
        /// Only articles for this city
        #[arg(long)]
        city: Option<String>,
    },
    /// Show one stored article as JSON
    Show {
        /// Article id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may come from a .env file in the working directory
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Initialize database
    let db = Database::new(&config).await?;

    match cli.command {
        Some(Commands::Serve) | None => commands::serve::run(db, config).await,
        Some(Commands::Digest {
            city,
            state,
            country,
            lat,
            lon,
            global,
            cities,
            narrate,
        }) => {
            let args = DigestArgs {
                city,
                state,
                country,
                lat,
                lon,
                global,
                cities,
                narrate,
            };
            commands::digest::run(db, &config, args).await
        }
        Some(Commands::List { city }) => commands::list::run(&db, city.as_deref()).await,
        Some(Commands::Show { id }) => commands::show::run(&db, &id).await,
    }
}
