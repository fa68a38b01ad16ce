//! Interfaces to the rest of the node
//!
//! The mining interface never validates or stores blocks itself. It reads
//! chain state, asks an assembler for block contents and hands solved blocks
//! to an acceptor, all through the traits below.

use crate::types::{CandidateBlock, ChainTip};
use bitcoin::{Block, Script};
use chrono::Utc;

/// Read-only view of the node's chain and mempool
pub trait ChainState: Send + Sync {
    /// Current best block
    fn tip(&self) -> ChainTip;

    /// Counter that advances whenever the mempool changes
    fn mempool_version(&self) -> u64;

    /// Tip and mempool version observed together. Implementations backed by
    /// a lock should read both under it.
    fn snapshot(&self) -> (ChainTip, u64) {
        (self.tip(), self.mempool_version())
    }

    fn is_initial_block_download(&self) -> bool;
}

/// Transaction selection
pub trait BlockAssembler: Send + Sync {
    /// Build an unfinalized block on top of `tip` paying its reward to
    /// `payout`. `None` means the assembler ran out of resources or `tip` is
    /// no longer the best block.
    fn create_new_block(&self, tip: &ChainTip, payout: &Script) -> Option<Block>;
}

/// Consensus validation and connection of solved blocks
pub trait BlockAcceptor: Send + Sync {
    /// Returns whether the block was accepted. Rejection is a normal outcome.
    fn process_new_block(&self, block: CandidateBlock) -> bool;
}

/// Peer-to-peer layer
pub trait PeerNetwork: Send + Sync {
    fn peer_count(&self) -> usize;
}

/// Source of wall-clock time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Chain-wide mining parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParams {
    /// Merged-mining chain identifier reported to aux miners
    pub aux_chain_id: u32,
    /// Regtest-style networks mine without peers or sync
    pub mine_blocks_on_demand: bool,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            aux_chain_id: 6,
            mine_blocks_on_demand: false,
        }
    }
}
