//! In-process exchange engine.
//!
//! # Responsibilities
//! - Keep a local block store and a set of simulated peers
//! - Fetch from peers concurrently, with per-peer latency and reachability
//! - Deliver announced blocks to peers that asked for them
//! - Queue announcements for a provider to publish later
//!
//! Used by tests and local development in place of a network engine.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::time::{timeout_at, Instant};

use crate::exchange::contract::Exchange;
use crate::exchange::types::{Block, BlockBatch, Cid, ExchangeError, ExchangeResult};

/// Announcements kept for a provider that has not drained them yet.
/// The oldest are dropped first once the queue is full.
pub const MAX_PENDING_ANNOUNCEMENTS: usize = 1024;

/// A simulated remote peer.
#[derive(Debug)]
pub struct MemoryPeer {
    name: String,
    blocks: DashMap<Cid, Block>,
    wants: DashSet<Cid>,
    latency: Duration,
    reachable: AtomicBool,
}

impl MemoryPeer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: DashMap::new(),
            wants: DashSet::new(),
            latency: Duration::ZERO,
            reachable: AtomicBool::new(true),
        }
    }

    /// Delay applied to every request served by this peer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&self, block: Block) {
        self.blocks.insert(*block.cid(), block);
    }

    pub fn has(&self, cid: &Cid) -> bool {
        self.blocks.contains_key(cid)
    }

    /// Register interest in a block this peer does not have yet.
    pub fn want(&self, cid: Cid) {
        self.wants.insert(cid);
    }

    pub fn wants(&self, cid: &Cid) -> bool {
        self.wants.contains(cid)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn fetch(&self, cid: &Cid) -> ExchangeResult<Option<Block>> {
        if !self.is_reachable() {
            return Err(ExchangeError::Network(format!("peer {} unreachable", self.name)));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.blocks.get(cid).map(|entry| entry.value().clone()))
    }

    /// Hand over an announced block if this peer wanted it.
    fn notify(&self, block: &Block) -> bool {
        if self.wants.remove(block.cid()).is_some() {
            self.insert(block.clone());
            true
        } else {
            false
        }
    }
}

/// Exchange engine backed by in-memory peers.
#[derive(Debug)]
pub struct MemoryExchange {
    local: DashMap<Cid, Block>,
    peers: Vec<Arc<MemoryPeer>>,
    announcements: Mutex<VecDeque<Cid>>,
    closed: AtomicBool,
    peer_queries: AtomicU64,
}

impl MemoryExchange {
    pub fn new(peers: Vec<Arc<MemoryPeer>>) -> Self {
        Self {
            local: DashMap::new(),
            peers,
            announcements: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            peer_queries: AtomicU64::new(0),
        }
    }

    /// An engine with no peers: only locally announced blocks are available.
    pub fn offline() -> Self {
        Self::new(Vec::new())
    }

    /// Requests sent to peers so far.
    pub fn peer_queries(&self) -> u64 {
        self.peer_queries.load(Ordering::SeqCst)
    }

    pub fn local_block(&self, cid: &Cid) -> Option<Block> {
        self.local.get(cid).map(|entry| entry.value().clone())
    }

    /// Take the queued announcements, oldest first.
    ///
    /// The owner is expected to drain these periodically; at most
    /// [`MAX_PENDING_ANNOUNCEMENTS`] are kept.
    pub fn take_announcements(&self) -> Vec<Cid> {
        self.announcements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect()
    }

    fn ensure_open(&self) -> ExchangeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ExchangeError::Closed)
        } else {
            Ok(())
        }
    }

    /// Ask every peer at once; the first one holding the block wins.
    async fn fetch_from_peers(&self, cid: &Cid) -> ExchangeResult<Block> {
        if self.peers.is_empty() {
            return Err(ExchangeError::Network("no peers connected".into()));
        }

        self.peer_queries.fetch_add(self.peers.len() as u64, Ordering::SeqCst);
        let mut pending: FuturesUnordered<_> =
            self.peers.iter().map(|peer| peer.fetch(cid)).collect();

        let mut answered = false;
        let mut last_error = None;
        while let Some(result) = pending.next().await {
            match result {
                Ok(Some(block)) => return Ok(block),
                Ok(None) => answered = true,
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) if !answered => Err(e),
            _ => Err(ExchangeError::NotFound(*cid)),
        }
    }

    async fn fetch_one(&self, cid: &Cid) -> ExchangeResult<Block> {
        if let Some(block) = self.local_block(cid) {
            return Ok(block);
        }
        let block = self.fetch_from_peers(cid).await?;
        self.local.insert(*cid, block.clone());
        Ok(block)
    }
}

#[async_trait]
impl Exchange for MemoryExchange {
    async fn get_block(&self, deadline: Instant, cid: &Cid) -> ExchangeResult<Block> {
        self.ensure_open()?;
        if Instant::now() >= deadline {
            return Err(ExchangeError::Timeout);
        }
        timeout_at(deadline, self.fetch_one(cid))
            .await
            .unwrap_or(Err(ExchangeError::Timeout))
    }

    async fn get_blocks(&self, deadline: Instant, cids: &[Cid]) -> ExchangeResult<BlockBatch> {
        self.ensure_open()?;
        if Instant::now() >= deadline {
            return Ok(BlockBatch {
                found: Vec::new(),
                missing: cids.to_vec(),
            });
        }

        let fetches = cids.iter().map(|cid| timeout_at(deadline, self.fetch_one(cid)));
        let results = join_all(fetches).await;

        let mut batch = BlockBatch::default();
        for (cid, result) in cids.iter().zip(results) {
            match result {
                Ok(Ok(block)) => batch.found.push(block),
                _ => batch.missing.push(*cid),
            }
        }
        Ok(batch)
    }

    async fn has_block(&self, block: Block) -> ExchangeResult<()> {
        self.ensure_open()?;
        let cid = *block.cid();

        for peer in self.peers.iter().filter(|p| p.is_reachable()) {
            if peer.notify(&block) {
                tracing::debug!(peer = peer.name(), cid = %cid, "Delivered announced block");
            }
        }

        self.local.insert(cid, block);
        let mut queue = self
            .announcements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if queue.len() >= MAX_PENDING_ANNOUNCEMENTS {
            if let Some(dropped) = queue.pop_front() {
                tracing::debug!(cid = %dropped, "Announcement queue full, dropping oldest");
            }
        }
        queue.push_back(cid);
        Ok(())
    }

    fn is_online(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.peers.iter().any(|p| p.is_reachable())
    }

    async fn close(&self) -> ExchangeResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.local.clear();
            self.announcements
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clear();
            tracing::info!(peers = self.peers.len(), "Memory exchange closed");
        }
        Ok(())
    }
}
