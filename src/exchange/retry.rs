//! Re-request the missing part of a batch until it is complete.

use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::exchange::client::ExchangeClient;
use crate::exchange::contract::Exchange;
use crate::exchange::types::{BlockBatch, Cid, ExchangeResult};
use crate::resilience::backoff_delay;

/// Batch fetch with retries for missing ids.
///
/// Stops when every id is found, attempts run out, or the next backoff
/// would end past `deadline`. Blocks are listed in the order they arrived.
pub async fn fetch_with_retry<E: Exchange>(
    client: &ExchangeClient<E>,
    deadline: Instant,
    cids: &[Cid],
    policy: &RetryConfig,
) -> ExchangeResult<BlockBatch> {
    let mut batch = client.get_blocks(deadline, cids).await?;
    let mut attempt = 1;

    while !batch.is_complete() && attempt < policy.max_attempts {
        let delay = backoff_delay(attempt, policy);
        if Instant::now() + delay >= deadline {
            tracing::debug!(missing = batch.missing.len(), "No time left for another attempt");
            break;
        }
        tokio::time::sleep(delay).await;
        attempt += 1;

        let retried = client.get_blocks(deadline, &batch.missing).await?;
        tracing::debug!(
            attempt,
            recovered = retried.found.len(),
            missing = retried.missing.len(),
            "Retried missing blocks"
        );
        batch.found.extend(retried.found);
        batch.missing = retried.missing;
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::memory::{MemoryExchange, MemoryPeer};
    use crate::exchange::types::Block;
    use std::sync::Arc;
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 40,
            max_delay_ms: 200,
        }
    }

    #[tokio::test]
    async fn recovers_once_peer_comes_back() {
        let peer = Arc::new(MemoryPeer::new("flaky"));
        let block = Block::new(b"eventually".to_vec());
        peer.insert(block.clone());
        peer.set_reachable(false);

        let client = ExchangeClient::new(MemoryExchange::new(vec![peer.clone()]));
        let revive = {
            let peer = peer.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                peer.set_reachable(true);
            })
        };

        let deadline = Instant::now() + Duration::from_secs(2);
        let batch = fetch_with_retry(&client, deadline, &[*block.cid()], &policy(4)).await.unwrap();
        revive.await.unwrap();

        assert!(batch.is_complete());
        assert_eq!(batch.found, vec![block]);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let engine = MemoryExchange::new(vec![Arc::new(MemoryPeer::new("empty"))]);
        let client = ExchangeClient::new(engine);
        let cid = Cid::digest(b"never");

        let deadline = Instant::now() + Duration::from_secs(5);
        let batch = fetch_with_retry(&client, deadline, &[cid], &policy(3)).await.unwrap();

        assert_eq!(batch.missing, vec![cid]);
        // One peer, three attempts.
        assert_eq!(client.engine().peer_queries(), 3);
    }
}
