//! Mining session
//!
//! Ties the gate, the template cache and the codecs together into the four
//! operations exposed to miners. All cache access goes through one mutex;
//! solved blocks are copied out under the lock and handed to the acceptor
//! after it is released.

use crate::auxpow::AuxPow;
use crate::chain::{
    BlockAcceptor, BlockAssembler, ChainParams, ChainState, Clock, PeerNetwork, SystemClock,
};
use crate::template::TemplateCache;
use crate::types::{format_bits, AuxBlock, CandidateBlock, Solution, WorkTemplate, AUX_ALGO, WORK_ALGO};
use crate::utils::decode_hex_param;
use crate::{gate, target, work, Error, Result};
use bitcoin::pow::Target;
use bitcoin::{BlockHash, Script};
use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Candidate builds attempted before giving up on a fast-moving tip
const MAX_BUILD_ATTEMPTS: usize = 3;

/// Mining session manager shared by all RPC handlers
pub struct MiningSession {
    params: ChainParams,
    chain: Arc<dyn ChainState>,
    assembler: Arc<dyn BlockAssembler>,
    acceptor: Arc<dyn BlockAcceptor>,
    network: Option<Arc<dyn PeerNetwork>>,
    clock: Arc<dyn Clock>,
    cache: Mutex<TemplateCache>,
}

impl MiningSession {
    /// Create a session. `network` is `None` when the node runs without a
    /// peer-to-peer layer, which disables mining entirely.
    pub fn new(
        params: ChainParams,
        chain: Arc<dyn ChainState>,
        assembler: Arc<dyn BlockAssembler>,
        acceptor: Arc<dyn BlockAcceptor>,
        network: Option<Arc<dyn PeerNetwork>>,
    ) -> Self {
        Self {
            params,
            chain,
            assembler,
            acceptor,
            network,
            clock: Arc::new(SystemClock),
            cache: Mutex::new(TemplateCache::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Number of candidates that can currently be submitted against
    pub fn outstanding_candidates(&self) -> usize {
        self.cache.lock().index().len()
    }

    fn gate(&self) -> Result<()> {
        gate::check(
            self.network.as_deref(),
            self.params.mine_blocks_on_demand,
            self.chain.is_initial_block_download(),
        )
    }

    /// Current candidate and its decoded target
    fn current_candidate(&self, payout: &Script) -> Result<(Arc<CandidateBlock>, Target)> {
        let mut cache = self.cache.lock();
        let candidate = self.build_on_live_tip(&mut cache, payout)?;
        let target = target::decode(candidate.bits()).map_err(|e| {
            error!(hash = %candidate.block_hash(), error = %e, "Candidate has corrupt difficulty");
            e
        })?;
        Ok((candidate, target))
    }

    /// Refresh the cache, retrying when a block connects while the candidate
    /// is being assembled. A candidate is only returned if the tip it extends
    /// is still the best block afterwards.
    fn build_on_live_tip(
        &self,
        cache: &mut TemplateCache,
        payout: &Script,
    ) -> Result<Arc<CandidateBlock>> {
        for attempt in 1..=MAX_BUILD_ATTEMPTS {
            let (tip, mempool_version) = self.chain.snapshot();
            let built = cache.get_or_build_current(
                payout,
                tip,
                mempool_version,
                self.clock.now(),
                self.assembler.as_ref(),
            );

            let live = self.chain.tip();
            if live == tip {
                return built;
            }
            warn!(%tip, %live, attempt, "Chain tip moved during candidate build");
        }
        Err(Error::internal("chain tip kept moving while building a candidate"))
    }

    /// Hand out the current candidate to a merged-mining client
    pub fn create_aux_block(&self, payout: &Script) -> Result<AuxBlock> {
        self.gate()?;
        let (candidate, target) = self.current_candidate(payout)?;

        Ok(AuxBlock {
            hash: candidate.block_hash().to_string(),
            algo: AUX_ALGO.to_string(),
            chain_id: self.params.aux_chain_id,
            previous_block_hash: candidate.header().prev_blockhash.to_string(),
            coinbase_value: candidate.coinbase_value()?.to_sat(),
            bits: format_bits(candidate.bits()),
            height: candidate.height,
            target: target::to_hex(&target),
        })
    }

    /// Hand out the current candidate as a getwork payload
    pub fn create_work(&self, payout: &Script) -> Result<WorkTemplate> {
        self.gate()?;
        let (candidate, target) = self.current_candidate(payout)?;

        Ok(WorkTemplate {
            data: work::encode(candidate.header()),
            algo: WORK_ALGO.to_string(),
            previous_block_hash: candidate.header().prev_blockhash.to_string(),
            coinbase_value: candidate.coinbase_value()?.to_sat(),
            bits: format_bits(candidate.bits()),
            height: candidate.height,
            target: target::to_hex(&target),
        })
    }

    /// Submit a merged-mining proof for the candidate with the given hash
    pub fn submit_aux_block(&self, hash_hex: &str, proof_hex: &str) -> Result<bool> {
        self.gate()?;
        let hash =
            BlockHash::from_str(hash_hex).map_err(|_| Error::unknown_key("block hash"))?;

        let mut block = {
            let cache = self.cache.lock();
            let candidate = cache.lookup_by_hash(&hash).map_err(|e| {
                warn!(%hash, "Aux submission for unknown block");
                e
            })?;
            CandidateBlock::clone(candidate)
        };

        let proof = AuxPow::from_hex(proof_hex)?;
        Solution::Aux(proof).apply(&mut block);
        check_reconstructed(&block, hash)?;

        Ok(self.forward(block))
    }

    /// Submit a solved getwork payload
    pub fn submit_work(&self, data_hex: &str) -> Result<bool> {
        self.gate()?;
        let data = decode_hex_param("data", data_hex)?;
        let header = work::decode(&data)?;

        let mut block = {
            let cache = self.cache.lock();
            let candidate = cache.lookup_by_merkle_root(&header.merkle_root).map_err(|e| {
                warn!(merkle_root = %header.merkle_root, "Work submission for unknown candidate");
                e
            })?;
            CandidateBlock::clone(candidate)
        };

        Solution::Nonce(header).apply(&mut block);
        check_reconstructed(&block, header.block_hash())?;

        Ok(self.forward(block))
    }

    fn forward(&self, block: CandidateBlock) -> bool {
        let hash = block.block_hash();
        let height = block.height;
        let accepted = self.acceptor.process_new_block(block);
        if accepted {
            info!(%hash, height, "Mined block accepted");
        } else {
            warn!(%hash, height, "Mined block rejected");
        }
        accepted
    }
}

fn check_reconstructed(block: &CandidateBlock, expected: BlockHash) -> Result<()> {
    let actual = block.block_hash();
    if actual != expected {
        error!(%expected, %actual, "Reconstructed block does not match its key");
        return Err(Error::internal(format!(
            "reconstructed block hash {} does not match {}",
            actual, expected
        )));
    }
    Ok(())
}
