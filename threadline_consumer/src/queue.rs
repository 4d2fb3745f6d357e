//! Inbound message sources and the single-worker consumer loop.

pub mod channel;
pub mod consumer;
pub mod jetstream;

use crate::router::Disposition;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub use channel::{AckLog, ChannelSource, Redeliveries};
pub use consumer::{run_consume_loop, ConsumerState, ConsumerStats};
pub use jetstream::JetStreamSource;

/// Settles one delivery with the queue it came from.
#[async_trait]
pub trait AckHandle: Send {
    async fn ack(self: Box<Self>) -> Result<()>;

    async fn requeue(self: Box<Self>) -> Result<()>;
}

/// A message pulled from an [`EventSource`], owned until it is settled.
pub struct Delivery {
    pub payload: Bytes,
    /// 1 on first delivery.
    pub attempt: u32,
    handle: Box<dyn AckHandle>,
}

impl Delivery {
    pub fn new(payload: Bytes, attempt: u32, handle: Box<dyn AckHandle>) -> Self {
        Self {
            payload,
            attempt,
            handle,
        }
    }

    pub async fn settle(self, disposition: Disposition) -> Result<()> {
        match disposition {
            Disposition::Ack => self.handle.ack().await,
            Disposition::Requeue => self.handle.requeue().await,
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("bytes", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Pull-based source of action messages.
#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next message. `None` means the stream has ended.
    async fn next_delivery(&mut self) -> Result<Option<Delivery>>;

    async fn close(&mut self) -> Result<()>;
}
