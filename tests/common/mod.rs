//! Hand-written collaborators shared by the integration tests

#![allow(dead_code)]

use auxpow_miner::chain::{
    BlockAcceptor, BlockAssembler, ChainParams, ChainState, Clock, PeerNetwork,
};
use auxpow_miner::{CandidateBlock, ChainTip, MiningSession};
use bitcoin::absolute::LockTime;
use bitcoin::block::{Header, Version};
use bitcoin::hashes::Hash;
use bitcoin::pow::{CompactTarget, Target};
use bitcoin::{
    transaction, Amount, Block, BlockHash, OutPoint, Script, ScriptBuf, Sequence, Transaction,
    TxIn, TxMerkleNode, TxOut, Witness,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

pub const SUBSIDY: u64 = 1_250_000_000;
pub const BITS: u32 = 0x207fffff;

pub struct MockChain {
    tip: Mutex<ChainTip>,
    mempool_version: AtomicU64,
    syncing: AtomicBool,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            tip: Mutex::new(tip(1, 100)),
            mempool_version: AtomicU64::new(0),
            syncing: AtomicBool::new(false),
        }
    }

    pub fn set_tip(&self, tip: ChainTip) {
        *self.tip.lock() = tip;
    }

    pub fn bump_mempool(&self) {
        self.mempool_version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_syncing(&self, syncing: bool) {
        self.syncing.store(syncing, Ordering::SeqCst);
    }
}

impl ChainState for MockChain {
    fn tip(&self) -> ChainTip {
        *self.tip.lock()
    }

    fn mempool_version(&self) -> u64 {
        self.mempool_version.load(Ordering::SeqCst)
    }

    fn is_initial_block_download(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }
}

pub struct MockAssembler {
    pub calls: AtomicUsize,
    pub exhausted: AtomicBool,
    pub bits: AtomicU64,
}

impl MockAssembler {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            exhausted: AtomicBool::new(false),
            bits: AtomicU64::new(u64::from(BITS)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BlockAssembler for MockAssembler {
    fn create_new_block(&self, tip: &ChainTip, payout: &Script) -> Option<Block> {
        if self.exhausted.load(Ordering::SeqCst) {
            return None;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(Block {
            header: Header {
                version: Version::TWO,
                prev_blockhash: tip.hash,
                merkle_root: TxMerkleNode::all_zeros(),
                time: 1_700_000_000,
                bits: CompactTarget::from_consensus(self.bits.load(Ordering::SeqCst) as u32),
                nonce: 0,
            },
            txdata: vec![coinbase(payout)],
        })
    }
}

pub struct MockAcceptor {
    pub accept: AtomicBool,
    pub received: Mutex<Vec<CandidateBlock>>,
}

impl MockAcceptor {
    pub fn new() -> Self {
        Self {
            accept: AtomicBool::new(true),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<CandidateBlock> {
        self.received.lock().clone()
    }
}

impl BlockAcceptor for MockAcceptor {
    fn process_new_block(&self, block: CandidateBlock) -> bool {
        self.received.lock().push(block);
        self.accept.load(Ordering::SeqCst)
    }
}

pub struct MockPeers(pub AtomicUsize);

impl PeerNetwork for MockPeers {
    fn peer_count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self(AtomicI64::new(start))
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A session wired to mocks, with handles to all of them
pub struct Harness {
    pub chain: Arc<MockChain>,
    pub assembler: Arc<MockAssembler>,
    pub acceptor: Arc<MockAcceptor>,
    pub peers: Arc<MockPeers>,
    pub clock: Arc<ManualClock>,
    pub session: Arc<MiningSession>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_params(ChainParams {
            aux_chain_id: 6,
            mine_blocks_on_demand: false,
        })
    }

    pub fn with_params(params: ChainParams) -> Self {
        let chain = Arc::new(MockChain::new());
        let assembler = Arc::new(MockAssembler::new());
        let acceptor = Arc::new(MockAcceptor::new());
        let peers = Arc::new(MockPeers(AtomicUsize::new(8)));
        let clock = Arc::new(ManualClock::new(1_000_000));
        let session = Arc::new(
            MiningSession::new(
                params,
                chain.clone(),
                assembler.clone(),
                acceptor.clone(),
                Some(peers.clone() as Arc<dyn PeerNetwork>),
            )
            .with_clock(clock.clone()),
        );
        Self {
            chain,
            assembler,
            acceptor,
            peers,
            clock,
            session,
        }
    }

    pub fn set_peers(&self, peers: usize) {
        self.peers.0.store(peers, Ordering::SeqCst);
    }
}

pub fn tip(byte: u8, height: u32) -> ChainTip {
    ChainTip {
        hash: BlockHash::from_byte_array([byte; 32]),
        height,
    }
}

pub fn payout() -> ScriptBuf {
    ScriptBuf::from_bytes(vec![0x51])
}

pub fn coinbase(payout: &Script) -> Transaction {
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
            value: Amount::from_sat(SUBSIDY),
            script_pubkey: payout.to_owned(),
        }],
    }
}

/// A transfer spending a made-up outpoint, for filling mempools
pub fn transfer(seed: u8) -> Transaction {
    Transaction {
        version: transaction::Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: bitcoin::Txid::from_byte_array([seed; 32]),
                vout: 0,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
        }],
    }
}

/// Parent-chain proof whose header meets the given compact target
pub fn solved_auxpow(bits: CompactTarget) -> auxpow_miner::auxpow::AuxPow {
    let mut parent_header = Header {
        version: Version::ONE,
        prev_blockhash: BlockHash::all_zeros(),
        merkle_root: TxMerkleNode::all_zeros(),
        time: 1_700_000_000,
        bits: CompactTarget::from_consensus(0x1d00ffff),
        nonce: 0,
    };
    let target = Target::from_compact(bits);
    while !target.is_met_by(parent_header.block_hash()) {
        parent_header.nonce += 1;
    }
    auxpow_miner::auxpow::AuxPow {
        coinbase_tx: coinbase(&ScriptBuf::new()),
        parent_hash: parent_header.block_hash(),
        coinbase_branch: Vec::new(),
        coinbase_index: 0,
        chain_branch: Vec::new(),
        chain_index: 0,
        parent_header,
    }
}

/// Find a nonce making `header` meet its own target
pub fn solve(header: &mut Header) {
    while !header.target().is_met_by(header.block_hash()) {
        header.nonce += 1;
    }
}
