//! Candidate block cache
//!
//! Keeps every candidate handed out since the last tip change, reachable by
//! block hash (merged mining) and by merkle root (getwork). The cache is
//! only ever cleared when the chain tip moves; a mempool-driven refresh adds
//! a new current candidate but leaves older ones valid for submission.

use crate::chain::BlockAssembler;
use crate::types::{CandidateBlock, ChainTip};
use crate::{Error, Result};
use bitcoin::{BlockHash, Script, TxMerkleNode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Seconds that must pass before a mempool change triggers a rebuild
pub const REFRESH_INTERVAL_SECS: i64 = 60;

/// What `get_or_build_current` has to do for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Hand out the current candidate
    Reuse,
    /// Same tip, build a fresh candidate alongside the existing ones
    Rebuild,
    /// Tip moved (or first request): drop everything, then build
    NewEpoch,
}

/// Snapshot of the chain state the current candidate was built against
#[derive(Debug, Default)]
pub struct MiningSessionState {
    tip: Option<ChainTip>,
    mempool_version: u64,
    last_build: i64,
    extra_nonce: u32,
    current: Option<Arc<CandidateBlock>>,
}

impl MiningSessionState {
    /// Decide between reuse and rebuild. Pure function of the state and the
    /// observed chain tip, mempool version and time.
    pub fn refresh_needed(&self, tip: &ChainTip, mempool_version: u64, now: i64) -> Refresh {
        if self.tip.as_ref() != Some(tip) {
            return Refresh::NewEpoch;
        }
        if self.current.is_none() {
            return Refresh::Rebuild;
        }
        if mempool_version != self.mempool_version
            && now - self.last_build > REFRESH_INTERVAL_SECS
        {
            return Refresh::Rebuild;
        }
        Refresh::Reuse
    }

    pub fn tip(&self) -> Option<&ChainTip> {
        self.tip.as_ref()
    }

    pub fn current(&self) -> Option<&Arc<CandidateBlock>> {
        self.current.as_ref()
    }

    pub fn last_build(&self) -> i64 {
        self.last_build
    }
}

/// Lookup maps into the outstanding candidates
#[derive(Debug, Default)]
pub struct TemplateIndex {
    by_hash: HashMap<BlockHash, Arc<CandidateBlock>>,
    by_merkle_root: HashMap<TxMerkleNode, Arc<CandidateBlock>>,
}

impl TemplateIndex {
    fn insert(&mut self, candidate: Arc<CandidateBlock>) {
        self.by_hash
            .insert(candidate.block_hash(), Arc::clone(&candidate));
        self.by_merkle_root
            .insert(candidate.merkle_root(), candidate);
    }

    fn clear(&mut self) {
        self.by_hash.clear();
        self.by_merkle_root.clear();
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// Session state plus index, always accessed under one lock
#[derive(Debug, Default)]
pub struct TemplateCache {
    state: MiningSessionState,
    index: TemplateIndex,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the candidate miners should work on, building a new one when
    /// the tip moved or the mempool changed long enough ago.
    pub fn get_or_build_current(
        &mut self,
        payout: &Script,
        tip: ChainTip,
        mempool_version: u64,
        now: i64,
        builder: &dyn BlockAssembler,
    ) -> Result<Arc<CandidateBlock>> {
        let refresh = self.state.refresh_needed(&tip, mempool_version, now);

        if refresh == Refresh::NewEpoch {
            if let Some(old) = self.state.tip {
                info!(
                    old_tip = %old,
                    new_tip = %tip,
                    dropped = self.index.len(),
                    "Chain tip changed, dropping outstanding candidates"
                );
            }
            self.index.clear();
            self.state.current = None;
            self.state.extra_nonce = 0;
        }

        if refresh != Refresh::Reuse {
            let block = builder
                .create_new_block(&tip, payout)
                .ok_or(Error::OutOfResources)?;

            let extra_nonce = self.state.extra_nonce.wrapping_add(1);
            let mut candidate = CandidateBlock::new(block, tip.height + 1);
            candidate.finalize(extra_nonce)?;

            self.state.extra_nonce = extra_nonce;
            self.state.tip = Some(tip);
            self.state.mempool_version = mempool_version;
            self.state.last_build = now;

            let candidate = Arc::new(candidate);
            info!(
                hash = %candidate.block_hash(),
                height = candidate.height,
                transactions = candidate.block.txdata.len(),
                extra_nonce,
                "Built new candidate block"
            );
            self.index.insert(Arc::clone(&candidate));
            self.state.current = Some(candidate);
        } else {
            debug!(tip = %tip, "Reusing current candidate block");
        }

        self.state
            .current
            .clone()
            .ok_or_else(|| Error::internal("no current candidate after refresh"))
    }

    pub fn lookup_by_hash(&self, hash: &BlockHash) -> Result<&Arc<CandidateBlock>> {
        self.index
            .by_hash
            .get(hash)
            .ok_or(Error::unknown_key("block hash"))
    }

    pub fn lookup_by_merkle_root(&self, root: &TxMerkleNode) -> Result<&Arc<CandidateBlock>> {
        self.index
            .by_merkle_root
            .get(root)
            .ok_or(Error::unknown_key("Merkle root"))
    }

    pub fn state(&self) -> &MiningSessionState {
        &self.state
    }

    pub fn index(&self) -> &TemplateIndex {
        &self.index
    }
}
