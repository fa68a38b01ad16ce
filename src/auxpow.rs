//! Auxiliary proof-of-work
//!
//! Links a block of this chain to a parent chain block whose coinbase commits
//! to it. Only the wire format lives here; checking the linkage is the job
//! of the block acceptor.

use crate::utils::decode_hex_param;
use crate::{Error, Result};
use bitcoin::block::Header;
use bitcoin::consensus::encode::{deserialize_partial, serialize, Decodable, VarInt};
use bitcoin::{BlockHash, Transaction, TxMerkleNode};

/// Upper bound on merkle branch length accepted from clients
const MAX_BRANCH_LENGTH: u64 = 30;

/// Merged-mining proof attached to a submitted block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxPow {
    /// Parent chain coinbase carrying the merged-mining commitment
    pub coinbase_tx: Transaction,
    /// Hash of the parent block (unused by validation, kept for the format)
    pub parent_hash: BlockHash,
    /// Branch linking the coinbase to the parent merkle root
    pub coinbase_branch: Vec<TxMerkleNode>,
    pub coinbase_index: i32,
    /// Branch linking this chain's block hash to the aux merkle root
    pub chain_branch: Vec<TxMerkleNode>,
    pub chain_index: i32,
    /// Parent block header whose hash carries the proof of work
    pub parent_header: Header,
}

impl AuxPow {
    /// Parse a proof from consensus-encoded bytes; trailing bytes are rejected
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ProofReader { bytes, pos: 0 };
        let proof = Self {
            coinbase_tx: reader.read()?,
            parent_hash: reader.read()?,
            coinbase_branch: reader.read_branch()?,
            coinbase_index: reader.read()?,
            chain_branch: reader.read_branch()?,
            chain_index: reader.read()?,
            parent_header: reader.read()?,
        };
        if reader.pos != bytes.len() {
            return Err(Error::malformed_proof(format!(
                "{} trailing bytes",
                bytes.len() - reader.pos
            )));
        }
        Ok(proof)
    }

    /// Parse a proof from a hex string as sent by merged-mining clients
    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_bytes(&decode_hex_param("auxpow", s)?)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = serialize(&self.coinbase_tx);
        out.extend(serialize(&self.parent_hash));
        write_branch(&mut out, &self.coinbase_branch);
        out.extend(serialize(&self.coinbase_index));
        write_branch(&mut out, &self.chain_branch);
        out.extend(serialize(&self.chain_index));
        out.extend(serialize(&self.parent_header));
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

fn write_branch(out: &mut Vec<u8>, branch: &[TxMerkleNode]) {
    out.extend(serialize(&VarInt(branch.len() as u64)));
    for node in branch {
        out.extend(serialize(node));
    }
}

struct ProofReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl ProofReader<'_> {
    fn read<T: Decodable>(&mut self) -> Result<T> {
        let (value, used) = deserialize_partial::<T>(&self.bytes[self.pos..])
            .map_err(|e| Error::malformed_proof(e.to_string()))?;
        self.pos += used;
        Ok(value)
    }

    fn read_branch(&mut self) -> Result<Vec<TxMerkleNode>> {
        let VarInt(len) = self.read()?;
        if len > MAX_BRANCH_LENGTH {
            return Err(Error::malformed_proof(format!(
                "merkle branch of length {} exceeds {}",
                len, MAX_BRANCH_LENGTH
            )));
        }
        (0..len).map(|_| self.read()).collect()
    }
}
