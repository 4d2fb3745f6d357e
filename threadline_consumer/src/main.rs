use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use threadline_consumer::config::{StoreLocation, ThreadlineConfig};
use threadline_consumer::database::models::{COMMENT_BUCKET, THREAD_BUCKET, USER_BUCKET};
use threadline_consumer::node::ThreadlineNode;
use threadline_consumer::telemetry;
use threadline_consumer::utils;

#[derive(Parser)]
#[command(author, version, about = "Applies queued social actions to the document store")]
struct Args {
    /// Queue server URI (overrides THREADLINE_QUEUE_URI)
    #[arg(long, global = true)]
    queue_uri: Option<String>,
    /// Stream to consume from (overrides THREADLINE_QUEUE)
    #[arg(long, global = true)]
    queue: Option<String>,
    /// Store path, or `memory` (overrides THREADLINE_STORE)
    #[arg(long, global = true)]
    store: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Consume the action queue until Ctrl-C
    Consume,
    /// Apply a newline-delimited JSON file of actions
    Replay { file: PathBuf },
    /// Print a stored document
    Show { bucket: Bucket, id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Bucket {
    User,
    Thread,
    Comment,
}

impl Bucket {
    fn name(self) -> &'static str {
        match self {
            Bucket::User => USER_BUCKET,
            Bucket::Thread => THREAD_BUCKET,
            Bucket::Comment => COMMENT_BUCKET,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let mut config = ThreadlineConfig::from_env()?;
    if let Some(uri) = args.queue_uri {
        config.queue.uri = uri;
    }
    if let Some(queue) = args.queue {
        config.queue.queue_name = queue;
    }
    if let Some(store) = args.store {
        config.store.location = StoreLocation::parse(&store);
    }

    let node = ThreadlineNode::start(config)?;
    tracing::info!(
        queue = %node.config().queue.queue_name,
        store = ?node.config().store.location,
        "bootstrap complete"
    );

    match args.command.unwrap_or(Command::Consume) {
        Command::Consume => {
            node.run_consumer().await?;
        }
        Command::Replay { file } => {
            let stats = node.replay(&file).await?;
            println!(
                "replayed {} messages: {} applied, {} rejected, {} unknown, {} requeued",
                stats.received, stats.applied, stats.rejected, stats.unknown, stats.requeued
            );
        }
        Command::Show { bucket, id } => {
            let document = node.show(bucket.name(), &id)?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }
    Ok(())
}
