//! pitstop-queue - inspect and drain the persisted offline request queue.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use pitstop_client::config::DEFAULT_DATABASE_URL;
use pitstop_client::{ClientConfig, HttpExecutor, OfflineQueue, SqliteStore};
use pitstop_engine::{HttpMethod, QueuedRequest};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pitstop-queue")]
#[command(about = "Inspect and drain the Pitstop offline request queue", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database holding the queue
    #[arg(long, default_value = DEFAULT_DATABASE_URL, env = "PITSTOP_DATABASE_URL")]
    database_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print queued requests, oldest first
    List,
    /// Replay queued requests against PITSTOP_API_URL
    Drain,
    /// Discard one queued request
    Remove {
        /// Request id
        id: String,
    },
    /// Discard every queued request
    Clear,
    /// Queue a request
    Enqueue {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: HttpMethod,
        /// Endpoint path relative to the API base URL
        endpoint: String,
        /// JSON body
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitstop_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let store = SqliteStore::connect(&cli.database_url).await?;
    let queue = OfflineQueue::open(store.clone()).await;

    match cli.command {
        Commands::List => {
            for request in queue.queue() {
                println!("{}", describe(&request));
            }
        }
        Commands::Drain => {
            let config = ClientConfig::from_env()?;
            let executor = HttpExecutor::from_config(&config)?;
            let report = queue.process_queue(&executor).await;

            println!("sent {} request(s)", report.sent.len());
            if let Some(failed) = &report.failed {
                println!("stopped at {failed}, {} still queued", report.remaining);
            }
        }
        Commands::Remove { id } => {
            if queue.remove(&id).await? {
                println!("removed {id}");
            } else {
                println!("no queued request {id}");
            }
        }
        Commands::Clear => {
            let count = queue.len();
            queue.clear().await?;
            println!("cleared {count} request(s)");
        }
        Commands::Enqueue {
            method,
            endpoint,
            body,
        } => {
            let body = body.map(|raw| serde_json::from_str(&raw)).transpose()?;
            let request = queue.enqueue(method, endpoint, body).await?;
            println!("{}", describe(&request));
        }
    }

    queue.dispose().await?;
    store.close().await;
    Ok(())
}

fn describe(request: &QueuedRequest) -> String {
    let queued_at = DateTime::<Utc>::from_timestamp_millis(request.created_at as i64)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| request.created_at.to_string());

    format!(
        "{}  {:<6} {}  queued {}  retries {}",
        request.id,
        request.method.as_str(),
        request.endpoint,
        queued_at,
        request.retry_count
    )
}
