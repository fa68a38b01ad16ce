//! Core types for the mining interface
//!
//! Candidate blocks handed out to miners, the records returned by the two
//! mining protocols, and the solutions miners send back.

use crate::auxpow::AuxPow;
use crate::work::WorkPayload;
use crate::{Error, Result};
use bitcoin::block::Header;
use bitcoin::pow::CompactTarget;
use bitcoin::script::{Builder, PushBytes};
use bitcoin::{Amount, Block, BlockHash, TxMerkleNode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag appended to every coinbase input script after height and extra nonce
pub const COINBASE_TAG: &[u8] = b"/auxpow/";

/// Hashing algorithm advertised to merged-mining clients
pub const AUX_ALGO: &str = "sha256d";

/// Hashing algorithm advertised to getwork clients
pub const WORK_ALGO: &str = "neoscrypt";

/// Reference to the best block a candidate is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainTip {
    pub hash: BlockHash,
    pub height: u32,
}

impl fmt::Display for ChainTip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.hash, self.height)
    }
}

/// A block proposal handed out to miners.
///
/// Once finalized and stored in the template cache it is never mutated;
/// submissions work on a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBlock {
    pub block: Block,
    /// Height the block would have once connected
    pub height: u32,
    /// Merged-mining proof, present only on submitted copies
    pub auxpow: Option<AuxPow>,
}

impl CandidateBlock {
    pub fn new(block: Block, height: u32) -> Self {
        Self {
            block,
            height,
            auxpow: None,
        }
    }

    pub fn header(&self) -> &Header {
        &self.block.header
    }

    pub fn block_hash(&self) -> BlockHash {
        self.block.block_hash()
    }

    pub fn merkle_root(&self) -> TxMerkleNode {
        self.block.header.merkle_root
    }

    pub fn bits(&self) -> CompactTarget {
        self.block.header.bits
    }

    /// Reward paid by the first coinbase output
    pub fn coinbase_value(&self) -> Result<Amount> {
        self.block
            .txdata
            .first()
            .and_then(|tx| tx.output.first())
            .map(|out| out.value)
            .ok_or_else(|| Error::internal("candidate block has no coinbase output"))
    }

    /// Stamp height and extra nonce into the coinbase and recompute the
    /// merkle root, making the candidate ready to hand out.
    pub fn finalize(&mut self, extra_nonce: u32) -> Result<()> {
        let tag = <&PushBytes>::try_from(COINBASE_TAG)
            .map_err(|e| Error::internal(format!("coinbase tag: {}", e)))?;
        let script_sig = Builder::new()
            .push_int(i64::from(self.height))
            .push_int(i64::from(extra_nonce))
            .push_slice(tag)
            .into_script();

        let coinbase_input = self
            .block
            .txdata
            .first_mut()
            .and_then(|tx| tx.input.first_mut())
            .ok_or_else(|| Error::internal("candidate block has no coinbase input"))?;
        coinbase_input.script_sig = script_sig;

        self.block.header.merkle_root = self
            .block
            .compute_merkle_root()
            .ok_or_else(|| Error::internal("candidate block has no transactions"))?;
        Ok(())
    }
}

/// Solution returned by a miner, grafted onto a cloned candidate
#[derive(Debug, Clone)]
pub enum Solution {
    /// Merged-mining proof for a candidate keyed by block hash
    Aux(AuxPow),
    /// Solved getwork header for a candidate keyed by merkle root
    Nonce(Header),
}

impl Solution {
    pub fn apply(self, candidate: &mut CandidateBlock) {
        match self {
            Solution::Aux(proof) => candidate.auxpow = Some(proof),
            Solution::Nonce(header) => candidate.block.header.nonce = header.nonce,
        }
    }
}

/// Reply to `createauxblock`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxBlock {
    pub hash: String,
    pub algo: String,
    #[serde(rename = "chainid")]
    pub chain_id: u32,
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: String,
    #[serde(rename = "coinbasevalue")]
    pub coinbase_value: u64,
    pub bits: String,
    pub height: u32,
    pub target: String,
}

/// Reply to `getwork` without arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTemplate {
    pub data: WorkPayload,
    pub algo: String,
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: String,
    #[serde(rename = "coinbasevalue")]
    pub coinbase_value: u64,
    pub bits: String,
    pub height: u32,
    pub target: String,
}

/// Render compact bits the way miners expect them
pub fn format_bits(bits: CompactTarget) -> String {
    format!("{:08x}", bits.to_consensus())
}
