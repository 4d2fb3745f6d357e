use super::{AckHandle, Delivery, EventSource};
use crate::config::QueueConfig;
use crate::utils::APP_NAME;
use anyhow::{anyhow, Context, Result};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy},
    AckKind,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

/// Durable pull consumer on the JetStream stream named by the queue config.
///
/// The server-side consumer has no delivery limit. Giving up on a message is
/// the consume loop's call, and it stops instead of discarding.
pub struct JetStreamSource {
    client: async_nats::Client,
    messages: pull::Stream,
}

impl JetStreamSource {
    /// Connects and binds to an existing stream. `shutdown` is cancelled when
    /// the server connection is closed for good.
    pub async fn connect(config: &QueueConfig, shutdown: CancellationToken) -> Result<Self> {
        let client = async_nats::ConnectOptions::new()
            .name(APP_NAME)
            .event_callback(move |event| {
                let shutdown = shutdown.clone();
                async move {
                    match event {
                        async_nats::Event::Connected => {
                            tracing::info!("queue connection established");
                        }
                        async_nats::Event::Closed => {
                            tracing::warn!("queue connection closed; stopping consumer");
                            shutdown.cancel();
                        }
                        other => tracing::warn!(event = %other, "queue connection event"),
                    }
                }
            })
            .connect(config.uri.as_str())
            .await
            .with_context(|| format!("failed to connect to queue at {}", config.uri))?;

        let context = jetstream::new(client.clone());
        let stream = context
            .get_stream(&config.queue_name)
            .await
            .with_context(|| format!("queue stream {} not found", config.queue_name))?;
        let consumer = stream
            .get_or_create_consumer(
                &config.consumer_name,
                pull::Config {
                    durable_name: Some(config.consumer_name.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("failed to bind consumer {}", config.consumer_name))?;
        let messages = consumer
            .messages()
            .await
            .context("failed to open consumer message stream")?;

        tracing::info!(
            uri = %config.uri,
            queue = %config.queue_name,
            consumer = %config.consumer_name,
            "subscribed to queue"
        );
        Ok(Self { client, messages })
    }
}

#[async_trait]
impl EventSource for JetStreamSource {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>> {
        loop {
            match self.messages.next().await {
                Some(Ok(message)) => {
                    let attempt = message
                        .info()
                        .ok()
                        .and_then(|info| u32::try_from(info.delivered).ok())
                        .unwrap_or(1);
                    let payload = message.message.payload.clone();
                    return Ok(Some(Delivery::new(
                        payload,
                        attempt,
                        Box::new(JetStreamAck { message }),
                    )));
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "failed to pull message from queue");
                }
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.client
            .flush()
            .await
            .map_err(|err| anyhow!("failed to flush queue connection: {err}"))
    }
}

struct JetStreamAck {
    message: jetstream::Message,
}

#[async_trait]
impl AckHandle for JetStreamAck {
    async fn ack(self: Box<Self>) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|err| anyhow!("failed to ack message: {err}"))
    }

    async fn requeue(self: Box<Self>) -> Result<()> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|err| anyhow!("failed to nak message: {err}"))
    }
}
