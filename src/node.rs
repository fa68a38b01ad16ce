//! In-memory development chain
//!
//! Implements every collaborator the mining session needs so the daemon can
//! run stand-alone, regtest style: blocks are assembled from a simple
//! mempool, accepted after basic header and proof-of-work checks, and kept
//! only in memory.

use crate::chain::{BlockAcceptor, BlockAssembler, ChainState, Clock, PeerNetwork, SystemClock};
use crate::types::{CandidateBlock, ChainTip};
use bitcoin::absolute::LockTime;
use bitcoin::block::{Header, Version};
use bitcoin::hashes::Hash;
use bitcoin::pow::CompactTarget;
use bitcoin::{
    transaction, Amount, Block, BlockHash, OutPoint, Script, ScriptBuf, Sequence, Transaction,
    TxIn, TxMerkleNode, TxOut, Txid, Witness,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings for a development chain
#[derive(Debug, Clone)]
pub struct DevNodeConfig {
    /// Reward paid by every coinbase
    pub subsidy: Amount,
    /// Difficulty used for every block
    pub pow_limit: CompactTarget,
    /// Simulated number of connected peers
    pub peers: usize,
    /// Start out in initial block download
    pub initial_sync: bool,
    /// Timestamp of the genesis block
    pub genesis_time: u32,
}

impl Default for DevNodeConfig {
    fn default() -> Self {
        Self {
            subsidy: Amount::from_sat(50 * 100_000_000),
            pow_limit: CompactTarget::from_consensus(0x207fffff),
            peers: 1,
            initial_sync: false,
            genesis_time: 1_296_688_602,
        }
    }
}

#[derive(Debug)]
struct ChainData {
    headers: Vec<Header>,
    mempool: Vec<Transaction>,
    mempool_version: u64,
}

impl ChainData {
    fn tip(&self) -> ChainTip {
        // headers always holds at least the genesis block
        let height = self.headers.len().saturating_sub(1);
        let hash = self
            .headers
            .last()
            .map(Header::block_hash)
            .unwrap_or_else(BlockHash::all_zeros);
        ChainTip {
            hash,
            height: height as u32,
        }
    }
}

/// In-memory chain implementing all node collaborators
pub struct DevNode {
    config: DevNodeConfig,
    data: RwLock<ChainData>,
    peers: AtomicUsize,
    initial_sync: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl DevNode {
    pub fn new(config: DevNodeConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: DevNodeConfig, clock: Arc<dyn Clock>) -> Self {
        let genesis = Header {
            version: Version::ONE,
            prev_blockhash: BlockHash::all_zeros(),
            merkle_root: TxMerkleNode::all_zeros(),
            time: config.genesis_time,
            bits: config.pow_limit,
            nonce: 0,
        };
        info!(genesis = %genesis.block_hash(), "Initialized development chain");

        Self {
            peers: AtomicUsize::new(config.peers),
            initial_sync: AtomicBool::new(config.initial_sync),
            data: RwLock::new(ChainData {
                headers: vec![genesis],
                mempool: Vec::new(),
                mempool_version: 0,
            }),
            config,
            clock,
        }
    }

    pub fn height(&self) -> u32 {
        self.data.read().tip().height
    }

    /// Header at `height`, if connected
    pub fn header_at(&self, height: u32) -> Option<Header> {
        self.data.read().headers.get(height as usize).copied()
    }

    /// Queue a transaction for the next candidate
    pub fn add_transaction(&self, tx: Transaction) {
        let mut data = self.data.write();
        debug!(txid = %tx.compute_txid(), "Transaction added to mempool");
        data.mempool.push(tx);
        data.mempool_version += 1;
    }

    pub fn mempool_size(&self) -> usize {
        self.data.read().mempool.len()
    }

    pub fn set_peer_count(&self, peers: usize) {
        self.peers.store(peers, Ordering::SeqCst);
    }

    pub fn set_initial_block_download(&self, syncing: bool) {
        self.initial_sync.store(syncing, Ordering::SeqCst);
    }

    fn coinbase(&self, payout: &Script) -> Transaction {
        Transaction {
            version: transaction::Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: self.config.subsidy,
                script_pubkey: payout.to_owned(),
            }],
        }
    }

    fn check_block(&self, data: &ChainData, candidate: &CandidateBlock) -> Result<(), String> {
        let header = candidate.header();
        let tip = data.tip();

        if header.prev_blockhash != tip.hash {
            return Err(format!("does not extend tip {}", tip));
        }
        if !candidate.block.check_merkle_root() {
            return Err("merkle root mismatch".to_string());
        }
        if header.bits != self.config.pow_limit {
            return Err(format!("unexpected bits {:08x}", header.bits.to_consensus()));
        }

        let target = header.target();
        let pow_hash = match &candidate.auxpow {
            Some(auxpow) => auxpow.parent_header.block_hash(),
            None => header.block_hash(),
        };
        if !target.is_met_by(pow_hash) {
            return Err(format!("proof of work {} above target", pow_hash));
        }
        Ok(())
    }
}

impl ChainState for DevNode {
    fn tip(&self) -> ChainTip {
        self.data.read().tip()
    }

    fn mempool_version(&self) -> u64 {
        self.data.read().mempool_version
    }

    fn snapshot(&self) -> (ChainTip, u64) {
        let data = self.data.read();
        (data.tip(), data.mempool_version)
    }

    fn is_initial_block_download(&self) -> bool {
        self.initial_sync.load(Ordering::SeqCst)
    }
}

impl BlockAssembler for DevNode {
    fn create_new_block(&self, tip: &ChainTip, payout: &Script) -> Option<Block> {
        let data = self.data.read();
        let best = data.tip();
        if best != *tip {
            warn!(%tip, %best, "Asked to build on a block that is not the tip");
            return None;
        }
        let parent = data.headers.get(tip.height as usize)?;

        let now = u32::try_from(self.clock.now()).unwrap_or(u32::MAX);
        let mut txdata = vec![self.coinbase(payout)];
        txdata.extend(data.mempool.iter().cloned());

        Some(Block {
            header: Header {
                version: Version::TWO,
                prev_blockhash: tip.hash,
                merkle_root: TxMerkleNode::all_zeros(),
                time: now.max(parent.time.saturating_add(1)),
                bits: self.config.pow_limit,
                nonce: 0,
            },
            txdata,
        })
    }
}

impl BlockAcceptor for DevNode {
    fn process_new_block(&self, candidate: CandidateBlock) -> bool {
        let mut data = self.data.write();
        if let Err(reason) = self.check_block(&data, &candidate) {
            warn!(hash = %candidate.block_hash(), %reason, "Block rejected");
            return false;
        }

        let included: HashSet<Txid> = candidate
            .block
            .txdata
            .iter()
            .map(Transaction::compute_txid)
            .collect();
        data.mempool.retain(|tx| !included.contains(&tx.compute_txid()));
        data.mempool_version += 1;
        data.headers.push(candidate.block.header);

        info!(
            hash = %candidate.block_hash(),
            height = data.tip().height,
            auxpow = candidate.auxpow.is_some(),
            "Connected block"
        );
        true
    }
}

impl PeerNetwork for DevNode {
    fn peer_count(&self) -> usize {
        self.peers.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_tip() {
        let node = DevNode::new(DevNodeConfig::default());
        let tip = node.tip();
        assert_eq!(tip.height, 0);
        assert_eq!(Some(tip.hash), node.header_at(0).map(|h| h.block_hash()));
        assert_eq!(node.mempool_version(), 0);
    }

    #[test]
    fn test_assembles_on_tip() {
        let node = DevNode::new(DevNodeConfig::default());
        let tip = node.tip();
        let payout = ScriptBuf::new();
        let block = node.create_new_block(&tip, &payout).unwrap();
        assert_eq!(block.header.prev_blockhash, tip.hash);
        assert_eq!(block.txdata.len(), 1);
        assert_eq!(block.txdata[0].output[0].value, DevNodeConfig::default().subsidy);
    }

    #[test]
    fn test_refuses_unknown_parent() {
        let node = DevNode::new(DevNodeConfig::default());
        let bogus = ChainTip {
            hash: BlockHash::from_byte_array([9; 32]),
            height: 0,
        };
        assert!(node.create_new_block(&bogus, &ScriptBuf::new()).is_none());
        let missing = ChainTip {
            hash: node.tip().hash,
            height: 5,
        };
        assert!(node.create_new_block(&missing, &ScriptBuf::new()).is_none());
    }

    #[test]
    fn test_refuses_superseded_tip() {
        let node = DevNode::new(DevNodeConfig::default());
        let old = node.tip();
        let block = node.create_new_block(&old, &ScriptBuf::new()).unwrap();
        let mut candidate = CandidateBlock::new(block, 1);
        candidate.finalize(1).unwrap();
        while !candidate.block.header.target().is_met_by(candidate.block_hash()) {
            candidate.block.header.nonce += 1;
        }
        assert!(node.process_new_block(candidate));

        assert!(node.create_new_block(&old, &ScriptBuf::new()).is_none());
        let (tip, mempool_version) = node.snapshot();
        assert_eq!(tip.height, 1);
        assert_eq!(mempool_version, 1);
        assert!(node.create_new_block(&tip, &ScriptBuf::new()).is_some());
    }

    #[test]
    fn test_accepts_solved_block() {
        let node = DevNode::new(DevNodeConfig::default());
        let tip = node.tip();
        let block = node.create_new_block(&tip, &ScriptBuf::new()).unwrap();
        let mut candidate = CandidateBlock::new(block, tip.height + 1);
        candidate.finalize(1).unwrap();

        while !candidate.header().target().is_met_by(candidate.block_hash()) {
            candidate.block.header.nonce += 1;
        }
        let version = node.mempool_version();
        assert!(node.process_new_block(candidate.clone()));
        assert_eq!(node.height(), 1);
        assert_eq!(node.tip().hash, candidate.block_hash());
        assert!(node.mempool_version() > version);

        // Same block again no longer extends the tip
        assert!(!node.process_new_block(candidate));
    }

    #[test]
    fn test_rejects_unfinalized_block() {
        let node = DevNode::new(DevNodeConfig::default());
        let tip = node.tip();
        let block = node.create_new_block(&tip, &ScriptBuf::new()).unwrap();
        assert!(!node.process_new_block(CandidateBlock::new(block, 1)));
        assert_eq!(node.height(), 0);
    }

    #[test]
    fn test_peer_and_sync_flags() {
        let node = DevNode::new(DevNodeConfig::default());
        assert_eq!(node.peer_count(), 1);
        node.set_peer_count(0);
        assert_eq!(node.peer_count(), 0);
        assert!(!node.is_initial_block_download());
        node.set_initial_block_download(true);
        assert!(node.is_initial_block_download());
    }
}
