//! Feeds a newline-delimited JSON file of action payloads through the
//! consumer loop without a queue server.

use crate::queue::{consumer, run_consume_loop, ChannelSource, ConsumerStats};
use crate::router::Router;
use anyhow::{Context, Result};
use bytes::Bytes;
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;

const REPLAY_BUFFER: usize = 64;

/// One payload per non-blank line; lines starting with `#` are comments.
pub fn parse_payloads(contents: &str) -> Vec<Bytes> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Bytes::copy_from_slice(line.as_bytes()))
        .collect()
}

pub async fn replay_file(
    path: &Path,
    router: Router,
    max_deliveries: u32,
    shutdown: CancellationToken,
) -> Result<ConsumerStats> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read replay file {}", path.display()))?;
    let payloads = parse_payloads(&contents);
    tracing::info!(path = %path.display(), messages = payloads.len(), "replaying actions");

    let (tx, source) = ChannelSource::channel(REPLAY_BUFFER);
    let feeder = tokio::spawn(async move {
        for payload in payloads {
            if tx.send(payload).await.is_err() {
                break;
            }
        }
    });

    let (state_tx, _state_rx) = consumer::state_channel();
    let stats = run_consume_loop(source, router, max_deliveries, shutdown, state_tx).await?;
    feeder.await.context("replay feeder task failed")?;
    Ok(stats)
}
