//! Polling log scanner.
//!
//! Each scanner owns a background task that walks confirmed blocks in bounded
//! ranges and forwards decoded events in `(block, log index)` order. Delivery is
//! at-least-once: a range that fails mid-way is scanned again from its start.

use crate::{
    backoff::{jittered_backoff, next_backoff, INITIAL_BACKOFF},
    ledger::{bindings::PrivateRps, SignerClient},
    Error, Result,
};
use ethers::{
    contract::EthEvent,
    providers::{Http, Middleware, Provider},
};
use futures::Stream as FutStream;
use rand::{rngs::StdRng, SeedableRng};
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use veilrps_types::Observed;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Where and how often a scanner reads the log.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    /// First block to scan. When unset, scanning starts at the first confirmed head seen.
    pub from_block: Option<u64>,
    pub poll_interval: Duration,
    /// Blocks a log must be buried under before it is delivered.
    pub confirmations: u64,
    /// Maximum blocks covered by a single `eth_getLogs` query.
    pub log_range: u64,
    pub capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            from_block: None,
            poll_interval: Duration::from_secs(4),
            confirmations: 1,
            log_range: 2_000,
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Stream of decoded ledger events.
///
/// The scanning task is aborted when the stream is dropped.
pub struct Stream<T: Send + 'static> {
    receiver: mpsc::Receiver<Result<T>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl<T: Send + 'static> Drop for Stream<T> {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

impl<T: Send + 'static> Stream<T> {
    fn capacity_or_default(capacity: usize) -> usize {
        if capacity == 0 {
            DEFAULT_CHANNEL_CAPACITY
        } else {
            capacity
        }
    }

    /// Receive the next event from the stream.
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.receiver.recv().await
    }
}

impl<T: Send + 'static> Stream<Observed<T>> {
    /// Spawn a scanner for event `D`, converting each log with `convert`.
    pub(crate) fn scan<D, F>(
        provider: Provider<Http>,
        contract: PrivateRps<SignerClient>,
        config: ScanConfig,
        convert: F,
    ) -> Self
    where
        D: EthEvent + Send + Sync + 'static,
        F: Fn(D) -> Result<T> + Send + Sync + 'static,
    {
        let (tx, receiver) = mpsc::channel(Self::capacity_or_default(config.capacity));
        let handle = tokio::spawn(async move {
            let event = D::name();
            let mut scanner = Scanner {
                provider,
                contract,
                cursor: config.from_block,
                config,
            };
            let mut rng = StdRng::from_entropy();
            let mut backoff = INITIAL_BACKOFF;
            loop {
                match scanner.poll::<D, T, F>(&tx, &convert).await {
                    Ok(true) => {
                        backoff = INITIAL_BACKOFF;
                        tokio::time::sleep(scanner.config.poll_interval).await;
                    }
                    Ok(false) => {
                        debug!(%event, "receiver dropped, stopping scanner");
                        return;
                    }
                    Err(err) => {
                        let delay = jittered_backoff(&mut rng, backoff);
                        warn!(
                            %event,
                            ?err,
                            cursor = ?scanner.cursor,
                            backoff_ms = delay.as_millis() as u64,
                            "log scan failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        backoff = next_backoff(backoff);
                    }
                }
            }
        });

        Self {
            receiver,
            _handle: handle,
        }
    }
}

impl<T: Send + 'static> FutStream for Stream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

struct Scanner {
    provider: Provider<Http>,
    contract: PrivateRps<SignerClient>,
    config: ScanConfig,
    /// Next block to scan.
    cursor: Option<u64>,
}

impl Scanner {
    /// Scan every confirmed block past the cursor.
    ///
    /// Returns `Ok(false)` once the receiving side has gone away.
    async fn poll<D, T, F>(
        &mut self,
        tx: &mpsc::Sender<Result<Observed<T>>>,
        convert: &F,
    ) -> Result<bool>
    where
        D: EthEvent + Send + Sync + 'static,
        T: Send + 'static,
        F: Fn(D) -> Result<T>,
    {
        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?
            .as_u64();
        let Some(safe) = latest.checked_sub(self.config.confirmations) else {
            return Ok(true);
        };
        let cursor = *self.cursor.get_or_insert(safe.saturating_add(1));

        let mut window = next_range(cursor, safe, self.config.log_range);
        while let Some((from, to)) = window {
            let mut logs = self
                .contract
                .event::<D>()
                .from_block(from)
                .to_block(to)
                .query_with_meta()
                .await
                .map_err(|err| Error::Transport(err.to_string()))?;
            logs.sort_by_key(|(_, meta)| (meta.block_number.as_u64(), meta.log_index.low_u64()));
            trace!(event = %D::name(), from, to, count = logs.len(), "scanned range");

            for (event, meta) in logs {
                let observed = convert(event).map(|event| {
                    Observed::new(event, meta.block_number.as_u64(), meta.log_index.low_u64())
                });
                if tx.send(observed).await.is_err() {
                    return Ok(false);
                }
            }
            self.cursor = Some(to + 1);
            window = next_range(to + 1, safe, self.config.log_range);
        }
        Ok(true)
    }
}

/// Compute the next `[from, to]` window no larger than `log_range` blocks.
fn next_range(from: u64, safe: u64, log_range: u64) -> Option<(u64, u64)> {
    if from > safe {
        return None;
    }
    let span = log_range.max(1) - 1;
    Some((from, safe.min(from.saturating_add(span))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_range_bounds_window() {
        assert_eq!(next_range(10, 5, 2_000), None);
        assert_eq!(next_range(10, 10, 2_000), Some((10, 10)));
        assert_eq!(next_range(1, 5_000, 2_000), Some((1, 2_000)));
        assert_eq!(next_range(4_001, 5_000, 2_000), Some((4_001, 5_000)));
    }

    #[test]
    fn test_next_range_zero_range_scans_single_block() {
        assert_eq!(next_range(7, 9, 0), Some((7, 7)));
    }

    #[test]
    fn test_capacity_defaults_when_zero() {
        assert_eq!(Stream::<u64>::capacity_or_default(0), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(Stream::<u64>::capacity_or_default(8), 8);
    }
}
