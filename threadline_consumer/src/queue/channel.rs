//! In-process [`EventSource`] over a tokio channel, used by `replay` and tests.

use super::{AckHandle, Delivery, EventSource};
use crate::router::Disposition;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One settled delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub payload: Bytes,
    pub attempt: u32,
    pub disposition: Disposition,
}

/// Shared record of every settlement made through a [`ChannelSource`].
#[derive(Debug, Clone, Default)]
pub struct AckLog {
    entries: Arc<Mutex<Vec<Settlement>>>,
}

impl AckLog {
    pub fn entries(&self) -> Vec<Settlement> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self, disposition: Disposition) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.disposition == disposition)
            .count()
    }

    fn record(&self, settlement: Settlement) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(settlement);
    }
}

/// Requeued messages waiting to be delivered again, with their next attempt
/// number. Shared between a source and every handle it gives out.
#[derive(Debug, Clone, Default)]
pub struct Redeliveries {
    queue: Arc<Mutex<VecDeque<(Bytes, u32)>>>,
}

impl Redeliveries {
    pub fn payloads(&self) -> Vec<Bytes> {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(payload, _)| payload.clone())
            .collect()
    }

    fn push(&self, payload: Bytes, attempt: u32) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back((payload, attempt));
    }

    fn pop(&self) -> Option<(Bytes, u32)> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }
}

/// Requeued messages are never discarded; they are served again ahead of new
/// ones until something acks them.
pub struct ChannelSource {
    rx: mpsc::Receiver<Bytes>,
    redeliveries: Redeliveries,
    log: AckLog,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            rx,
            redeliveries: Redeliveries::default(),
            log: AckLog::default(),
        }
    }

    /// Creates a bounded channel and the source reading from it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    pub fn ack_log(&self) -> AckLog {
        self.log.clone()
    }

    pub fn redeliveries(&self) -> Redeliveries {
        self.redeliveries.clone()
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>> {
        let (payload, attempt) = match self.redeliveries.pop() {
            Some(pending) => pending,
            None => match self.rx.recv().await {
                Some(payload) => (payload, 1),
                None => return Ok(None),
            },
        };
        let handle = ChannelAck {
            payload: payload.clone(),
            attempt,
            redeliveries: self.redeliveries.clone(),
            log: self.log.clone(),
        };
        Ok(Some(Delivery::new(payload, attempt, Box::new(handle))))
    }

    async fn close(&mut self) -> Result<()> {
        self.rx.close();
        Ok(())
    }
}

struct ChannelAck {
    payload: Bytes,
    attempt: u32,
    redeliveries: Redeliveries,
    log: AckLog,
}

#[async_trait]
impl AckHandle for ChannelAck {
    async fn ack(self: Box<Self>) -> Result<()> {
        self.log.record(Settlement {
            payload: self.payload,
            attempt: self.attempt,
            disposition: Disposition::Ack,
        });
        Ok(())
    }

    async fn requeue(self: Box<Self>) -> Result<()> {
        self.redeliveries
            .push(self.payload.clone(), self.attempt.saturating_add(1));
        self.log.record(Settlement {
            payload: self.payload,
            attempt: self.attempt,
            disposition: Disposition::Requeue,
        });
        Ok(())
    }
}
