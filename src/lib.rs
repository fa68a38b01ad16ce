//! AuxPow Miner
//!
//! External mining interface for a proof-of-work node:
//! - Merged mining via `createauxblock` / `submitauxblock`
//! - Legacy `getwork` with the historical 128-byte padded payload
//! - One candidate cache shared by both, rebuilt on tip changes and
//!   throttled mempool refreshes
//! - JSON-RPC server on top of an in-memory development chain

pub mod auxpow;
pub mod chain;
pub mod config;
pub mod error;
pub mod gate;
pub mod node;
pub mod rpc;
pub mod session;
pub mod target;
pub mod template;
pub mod types;
pub mod utils;
pub mod work;

pub use config::Config;
pub use error::{Error, Result};
pub use session::MiningSession;
pub use types::*;

/// Application information
pub const APP_NAME: &str = "auxpow-minerd";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
