//! The block exchange contract.
//!
//! Anything that implements [`Exchange`] can serve as the node's block
//! exchange protocol. Upper layers do not call engines directly; they go
//! through [`ExchangeClient`](crate::exchange::ExchangeClient), which enforces
//! deadlines, the closed state and content verification uniformly.
//!
//! # Contract
//! - Every fetch carries the caller's deadline. An engine must give up once
//!   the deadline passes and report [`ExchangeError::Timeout`].
//! - `get_block` never returns a block other than the one requested.
//! - `get_blocks` is best-effort: it returns whatever was found before the
//!   deadline and lists every other requested id as missing. Expiry of the
//!   deadline is not an error for a batch.
//! - `has_block` records the announcement locally and returns; it does not
//!   wait for any peer.
//! - `is_online` must not block.
//! - After `close`, every other operation fails with [`ExchangeError::Closed`].

use async_trait::async_trait;
use tokio::time::Instant;

use crate::exchange::types::{Block, BlockBatch, Cid, ExchangeResult};

#[async_trait]
pub trait Exchange: Send + Sync {
    /// Retrieve one block from peers before `deadline`.
    async fn get_block(&self, deadline: Instant, cid: &Cid) -> ExchangeResult<Block>;

    /// Retrieve several blocks before `deadline`, returning the subset found.
    async fn get_blocks(&self, deadline: Instant, cids: &[Cid]) -> ExchangeResult<BlockBatch>;

    /// Announce a locally obtained block so interested peers can be told.
    async fn has_block(&self, block: Block) -> ExchangeResult<()>;

    /// Whether the engine believes it has usable peer connectivity.
    fn is_online(&self) -> bool;

    /// Go offline and release resources. Closing twice is not an error.
    async fn close(&self) -> ExchangeResult<()>;
}

#[async_trait]
impl<E> Exchange for std::sync::Arc<E>
where
    E: Exchange + ?Sized,
{
    async fn get_block(&self, deadline: Instant, cid: &Cid) -> ExchangeResult<Block> {
        (**self).get_block(deadline, cid).await
    }

    async fn get_blocks(&self, deadline: Instant, cids: &[Cid]) -> ExchangeResult<BlockBatch> {
        (**self).get_blocks(deadline, cids).await
    }

    async fn has_block(&self, block: Block) -> ExchangeResult<()> {
        (**self).has_block(block).await
    }

    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    async fn close(&self) -> ExchangeResult<()> {
        (**self).close().await
    }
}
