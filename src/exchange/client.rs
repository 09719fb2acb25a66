//! Caller-side enforcement of the exchange contract.
//!
//! # Responsibilities
//! - Fail fast on a closed exchange or an already expired deadline
//! - Bound every engine call by the caller's deadline
//! - Verify returned blocks against the requested ids
//! - Account for every requested id in batch results
//!
//! # Design Decisions
//! - Engine failures pass through unchanged; the client only adds `Timeout`,
//!   `Closed` and `InvalidBlock`
//! - A bad block in a batch is reported as missing, not as a batch failure

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::config::ExchangeConfig;
use crate::exchange::contract::Exchange;
use crate::exchange::types::{Block, BlockBatch, Cid, ExchangeError, ExchangeResult};
use crate::observability::metrics;

/// Extra time an engine gets past a batch deadline to hand back what it found.
const BATCH_COLLECT_GRACE: Duration = Duration::from_millis(50);

/// Entry point for upper layers calling into an exchange engine.
#[derive(Debug)]
pub struct ExchangeClient<E> {
    engine: E,
    closed: AtomicBool,
    fetch_timeout: Duration,
}

impl<E: Exchange> ExchangeClient<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, &ExchangeConfig::default())
    }

    pub fn with_config(engine: E, config: &ExchangeConfig) -> Self {
        Self {
            engine,
            closed: AtomicBool::new(false),
            fetch_timeout: config.fetch_timeout(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn admit(&self, deadline: Instant) -> ExchangeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExchangeError::Closed);
        }
        if Instant::now() >= deadline {
            return Err(ExchangeError::Timeout);
        }
        Ok(())
    }

    /// Fetch one block before `deadline`.
    pub async fn get_block(&self, deadline: Instant, cid: &Cid) -> ExchangeResult<Block> {
        let result = match self.admit(deadline) {
            Ok(()) => timeout_at(deadline, self.engine.get_block(deadline, cid))
                .await
                .unwrap_or(Err(ExchangeError::Timeout))
                .and_then(|block| check_block(cid, block)),
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => metrics::record_exchange_request("get_block", "ok"),
            Err(e) => {
                tracing::debug!(cid = %cid, error = %e, "Block fetch failed");
                metrics::record_exchange_request("get_block", e.as_str());
            }
        }
        result
    }

    /// Fetch one block, giving up `timeout` from now.
    pub async fn get_block_within(&self, timeout: Duration, cid: &Cid) -> ExchangeResult<Block> {
        self.get_block(Instant::now() + timeout, cid).await
    }

    /// Default single-fetch budget, from `exchange.fetch_timeout_ms`.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Fetch several blocks before `deadline`.
    ///
    /// Duplicate ids are fetched once. The result lists each distinct id
    /// exactly once, in request order within `found` and `missing`.
    /// An expired deadline yields everything as missing rather than an error.
    pub async fn get_blocks(
        &self,
        deadline: Instant,
        cids: &[Cid],
    ) -> ExchangeResult<BlockBatch> {
        let requested = dedup(cids);

        match self.admit(deadline) {
            Ok(()) => {}
            Err(ExchangeError::Timeout) => {
                metrics::record_exchange_request("get_blocks", "timeout");
                return Ok(BlockBatch {
                    found: Vec::new(),
                    missing: requested,
                });
            }
            Err(e) => {
                metrics::record_exchange_request("get_blocks", e.as_str());
                return Err(e);
            }
        }

        let engine_call = self.engine.get_blocks(deadline, &requested);
        let batch = match timeout_at(deadline + BATCH_COLLECT_GRACE, engine_call).await {
            Ok(Ok(batch)) => batch,
            Ok(Err(e)) => {
                metrics::record_exchange_request("get_blocks", e.as_str());
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(
                    requested = requested.len(),
                    "Exchange engine overran batch deadline"
                );
                BlockBatch::default()
            }
        };

        let batch = reconcile(&requested, batch);
        let result = if batch.is_complete() { "ok" } else { "partial" };
        metrics::record_exchange_request("get_blocks", result);
        Ok(batch)
    }

    /// Announce a locally obtained block.
    pub async fn has_block(&self, block: Block) -> ExchangeResult<()> {
        let result = if self.closed.load(Ordering::SeqCst) {
            Err(ExchangeError::Closed)
        } else if !block.verify() {
            Err(ExchangeError::InvalidBlock {
                expected: *block.cid(),
                actual: Cid::digest(block.data()),
            })
        } else {
            self.engine.has_block(block).await
        };

        match &result {
            Ok(()) => metrics::record_exchange_request("has_block", "ok"),
            Err(e) => {
                tracing::debug!(error = %e, "Block announcement refused");
                metrics::record_exchange_request("has_block", e.as_str());
            }
        }
        result
    }

    /// Non-blocking connectivity check.
    pub fn is_online(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.engine.is_online()
    }

    /// Take the exchange offline. Later calls fail with `Closed`.
    pub async fn close(&self) -> ExchangeResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.engine.close().await
    }
}

fn check_block(requested: &Cid, block: Block) -> ExchangeResult<Block> {
    if block.cid() != requested || !block.verify() {
        return Err(ExchangeError::InvalidBlock {
            expected: *requested,
            actual: Cid::digest(block.data()),
        });
    }
    Ok(block)
}

fn dedup(cids: &[Cid]) -> Vec<Cid> {
    let mut seen = HashSet::with_capacity(cids.len());
    cids.iter().copied().filter(|cid| seen.insert(*cid)).collect()
}

/// Keep only verified blocks that were asked for; everything else is missing.
fn reconcile(requested: &[Cid], batch: BlockBatch) -> BlockBatch {
    let mut returned: HashMap<Cid, Block> = HashMap::with_capacity(batch.found.len());
    for block in batch.found {
        if !block.verify() {
            tracing::warn!(cid = %block.cid(), "Discarding block that fails verification");
            continue;
        }
        returned.insert(*block.cid(), block);
    }

    let mut result = BlockBatch::default();
    for cid in requested {
        match returned.remove(cid) {
            Some(block) => result.found.push(block),
            None => result.missing.push(*cid),
        }
    }
    if !returned.is_empty() {
        tracing::warn!(extra = returned.len(), "Engine returned blocks that were not requested");
    }
    result
}
