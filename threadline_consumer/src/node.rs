use crate::bootstrap;
use crate::config::ThreadlineConfig;
use crate::database::EntityStore;
use crate::mutations::MutationService;
use crate::queue::{consumer, run_consume_loop, ConsumerState, ConsumerStats, JetStreamSource};
use crate::replay;
use crate::router::Router;
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Wires the store and router once and hands them to whichever entrypoint
/// (queue consumer, replay, inspection) the binary was started with.
pub struct ThreadlineNode {
    config: ThreadlineConfig,
    store: Arc<dyn EntityStore>,
    router: Router,
}

impl ThreadlineNode {
    pub fn start(config: ThreadlineConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config)?;
        let service = MutationService::new(bootstrap.store.clone(), config.mutations.clone());
        let router = Router::new(service);

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            store = ?config.store.location,
            fan_out_unread = config.mutations.fan_out_unread,
            "threadline node initialized"
        );

        Ok(Self {
            config,
            store: bootstrap.store,
            router,
        })
    }

    pub fn config(&self) -> &ThreadlineConfig {
        &self.config
    }

    /// Consumes the configured queue until Ctrl-C or until the queue
    /// connection is closed.
    pub async fn run_consumer(&self) -> Result<ConsumerStats> {
        let shutdown = CancellationToken::new();
        spawn_ctrl_c(shutdown.clone());

        let source = JetStreamSource::connect(&self.config.queue, shutdown.clone()).await?;
        let (state_tx, mut state_rx) = consumer::state_channel();
        tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let state = *state_rx.borrow_and_update();
                tracing::debug!(?state, "consumer state changed");
                if state == ConsumerState::Stopped {
                    break;
                }
            }
        });

        run_consume_loop(
            source,
            self.router.clone(),
            self.config.queue.max_deliveries,
            shutdown,
            state_tx,
        )
        .await
    }

    pub async fn replay(&self, path: &Path) -> Result<ConsumerStats> {
        let shutdown = CancellationToken::new();
        spawn_ctrl_c(shutdown.clone());
        replay::replay_file(
            path,
            self.router.clone(),
            self.config.queue.max_deliveries,
            shutdown,
        )
        .await
    }

    /// Reads one stored document as JSON.
    pub fn show(&self, bucket: &str, id: &str) -> Result<serde_json::Value> {
        let body = self
            .store
            .get(bucket, id)?
            .ok_or_else(|| anyhow!("{bucket} {id} not found"))?;
        serde_json::from_str(&body).with_context(|| format!("{bucket} {id} is not valid JSON"))
    }
}

fn spawn_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl-C");
            shutdown.cancel();
        }
    });
}
