//! Calling contract of the block exchange, exercised through the client.

use std::sync::Arc;
use std::time::Duration;

use blockport::config::RetryConfig;
use blockport::exchange::{
    fetch_with_retry, Block, Cid, ExchangeClient, ExchangeError, MemoryExchange, MemoryPeer,
};
use tokio::time::Instant;

fn network(blocks: &[&Block]) -> (Arc<MemoryPeer>, ExchangeClient<MemoryExchange>) {
    let peer = Arc::new(MemoryPeer::new("peer-1"));
    for block in blocks {
        peer.insert((*block).clone());
    }
    let client = ExchangeClient::new(MemoryExchange::new(vec![peer.clone()]));
    (peer, client)
}

#[tokio::test]
async fn expired_deadline_fails_without_network_io() {
    let block = Block::new(b"available".to_vec());
    let (_peer, client) = network(&[&block]);

    let expired = Instant::now() - Duration::from_millis(1);
    assert_eq!(client.get_block(expired, block.cid()).await, Err(ExchangeError::Timeout));
    assert_eq!(client.engine().peer_queries(), 0);

    let batch = client.get_blocks(expired, &[*block.cid()]).await.unwrap();
    assert!(batch.found.is_empty());
    assert_eq!(batch.missing, vec![*block.cid()]);
    assert_eq!(client.engine().peer_queries(), 0);
}

#[tokio::test]
async fn get_block_returns_exactly_the_requested_block() {
    let block = Block::new(b"exact".to_vec());
    let (_peer, client) = network(&[&block]);

    let deadline = Instant::now() + Duration::from_secs(2);
    let fetched = client.get_block(deadline, block.cid()).await.unwrap();
    assert_eq!(fetched.cid(), block.cid());
    assert_eq!(fetched.data(), b"exact");
}

#[tokio::test]
async fn unknown_block_is_not_found() {
    let (_peer, client) = network(&[]);
    let cid = Cid::digest(b"absent");

    let deadline = Instant::now() + Duration::from_secs(2);
    assert_eq!(client.get_block(deadline, &cid).await, Err(ExchangeError::NotFound(cid)));
}

#[tokio::test]
async fn batch_returns_exactly_the_available_subset() {
    let a = Block::new(b"a".to_vec());
    let b = Block::new(b"b".to_vec());
    let absent = Cid::digest(b"absent");
    let (_peer, client) = network(&[&a, &b]);

    let deadline = Instant::now() + Duration::from_secs(2);
    let batch = client.get_blocks(deadline, &[*a.cid(), absent, *b.cid()]).await.unwrap();

    assert_eq!(batch.found, vec![a, b]);
    assert_eq!(batch.missing, vec![absent]);
    assert!(!batch.is_complete());
}

#[tokio::test]
async fn batch_keeps_what_arrived_before_deadline() {
    let fast_peer = Arc::new(MemoryPeer::new("fast"));
    let slow_peer = Arc::new(MemoryPeer::new("slow").with_latency(Duration::from_secs(5)));
    let quick = Block::new(b"quick".to_vec());
    let late = Block::new(b"late".to_vec());
    fast_peer.insert(quick.clone());
    slow_peer.insert(late.clone());

    let client = ExchangeClient::new(MemoryExchange::new(vec![fast_peer, slow_peer]));
    let deadline = Instant::now() + Duration::from_millis(100);
    let started = std::time::Instant::now();
    let batch = client.get_blocks(deadline, &[*quick.cid(), *late.cid()]).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(batch.found, vec![quick]);
    assert_eq!(batch.missing, vec![*late.cid()]);
}

#[tokio::test]
async fn announced_block_is_served_locally() {
    let client = ExchangeClient::new(MemoryExchange::offline());
    assert!(!client.is_online());

    let block = Block::new(b"mine".to_vec());
    client.has_block(block.clone()).await.unwrap();
    assert_eq!(client.engine().take_announcements(), vec![*block.cid()]);

    let deadline = Instant::now() + Duration::from_secs(1);
    assert_eq!(client.get_block(deadline, block.cid()).await.unwrap(), block);
}

#[tokio::test]
async fn close_makes_every_call_fail_fast() {
    let block = Block::new(b"x".to_vec());
    let (_peer, client) = network(&[&block]);
    assert!(client.is_online());

    client.close().await.unwrap();
    client.close().await.unwrap();
    assert!(!client.is_online());

    let deadline = Instant::now() + Duration::from_secs(1);
    let calls = tokio::time::timeout(Duration::from_millis(500), async {
        (
            client.get_block(deadline, block.cid()).await,
            client.get_blocks(deadline, &[*block.cid()]).await,
            client.has_block(block.clone()).await,
        )
    })
    .await
    .expect("closed exchange must not hang");

    assert_eq!(calls.0, Err(ExchangeError::Closed));
    assert_eq!(calls.1, Err(ExchangeError::Closed));
    assert_eq!(calls.2, Err(ExchangeError::Closed));
    assert_eq!(client.engine().peer_queries(), 0);
}

#[tokio::test]
async fn retry_fills_in_blocks_announced_later() {
    let peer = Arc::new(MemoryPeer::new("provider"));
    let early = Block::new(b"early".to_vec());
    let later = Block::new(b"later".to_vec());
    peer.insert(early.clone());

    let client = ExchangeClient::new(MemoryExchange::new(vec![peer.clone()]));
    let publisher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        peer.insert(later);
    });

    let policy = RetryConfig {
        max_attempts: 5,
        base_delay_ms: 50,
        max_delay_ms: 200,
    };
    let deadline = Instant::now() + Duration::from_secs(3);
    let wanted = [*early.cid(), Cid::digest(b"later")];
    let batch = fetch_with_retry(&client, deadline, &wanted, &policy).await.unwrap();
    publisher.await.unwrap();

    assert!(batch.is_complete());
    assert_eq!(batch.found.len(), 2);
    assert_eq!(batch.found[0], early);
}
