//! Configuration management for the mining daemon
//!
//! Supports configuration via command line arguments, environment variables,
//! and configuration files (YAML/JSON).

use crate::chain::ChainParams;
use crate::node::DevNodeConfig;
use crate::{Error, Result};
use bitcoin::address::NetworkUnchecked;
use bitcoin::pow::CompactTarget;
use bitcoin::{Address, Amount, Network, ScriptBuf};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Networks payout addresses are validated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Bitcoin,
    Testnet,
    Signet,
    Regtest,
}

impl From<NetworkKind> for Network {
    fn from(kind: NetworkKind) -> Self {
        match kind {
            NetworkKind::Bitcoin => Network::Bitcoin,
            NetworkKind::Testnet => Network::Testnet,
            NetworkKind::Signet => Network::Signet,
            NetworkKind::Regtest => Network::Regtest,
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkKind::Bitcoin => write!(f, "bitcoin"),
            NetworkKind::Testnet => write!(f, "testnet"),
            NetworkKind::Signet => write!(f, "signet"),
            NetworkKind::Regtest => write!(f, "regtest"),
        }
    }
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

/// Complete configuration for the mining daemon
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "auxpow-minerd",
    version = env!("CARGO_PKG_VERSION"),
    about = "Merged-mining and getwork server",
    long_about = "Serves createauxblock/submitauxblock and getwork to external miners on top of an in-memory development chain"
)]
pub struct Config {
    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(skip)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// RPC server interface
    #[arg(long, env = "AUXPOW_RPC_INTERFACE", default_value = "127.0.0.1")]
    #[serde(default = "default_rpc_interface")]
    pub rpc_interface: String,

    /// RPC server port
    #[arg(short = 'p', long, env = "AUXPOW_RPC_PORT", default_value = "18443")]
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Network used to validate payout addresses
    #[arg(short = 'n', long, default_value = "regtest")]
    #[serde(default = "default_network")]
    pub network: NetworkKind,

    /// Address paid by getwork and argument-less getauxblock candidates
    #[arg(short = 'a', long, env = "AUXPOW_PAYOUT_ADDRESS")]
    #[serde(default)]
    pub payout_address: Option<String>,

    /// Merged-mining chain id reported to aux miners
    #[arg(long, default_value = "6")]
    #[serde(default = "default_aux_chain_id")]
    pub aux_chain_id: u32,

    /// Hand out work without peers and during initial download
    #[arg(long)]
    #[serde(default)]
    pub mine_on_demand: bool,

    /// Run without a peer-to-peer layer (disables mining)
    #[arg(long)]
    #[serde(default)]
    pub disable_networking: bool,

    /// Simulated number of connected peers
    #[arg(long, default_value = "1")]
    #[serde(default = "default_peers")]
    pub peers: usize,

    /// Start the development chain in initial block download
    #[arg(long)]
    #[serde(default)]
    pub initial_sync: bool,

    /// Coinbase reward in satoshis
    #[arg(long, default_value = "5000000000")]
    #[serde(default = "default_block_subsidy")]
    pub block_subsidy: u64,

    /// Compact difficulty bits for every block (hex)
    #[arg(long, default_value = "207fffff")]
    #[serde(default = "default_pow_limit_bits")]
    pub pow_limit_bits: String,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, default_value = "plain")]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Config {
    /// Parse the command line, merge an optional config file and validate
    pub async fn load() -> Result<Self> {
        let args = Self::command().get_matches();
        let mut config = Self::from_arg_matches(&args).unwrap_or_else(|e| e.exit());

        if let Some(config_file) = &config.config_file {
            let file_config = Self::load_from_file(config_file).await?;
            config = config.merge_with_file(file_config, &args);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    async fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// File values apply wherever the option was not given on the command
    /// line or through the environment.
    fn merge_with_file(mut self, file: Self, args: &ArgMatches) -> Self {
        let explicit = |id: &str| {
            matches!(
                args.value_source(id),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            )
        };

        if !explicit("rpc_interface") {
            self.rpc_interface = file.rpc_interface;
        }
        if !explicit("rpc_port") {
            self.rpc_port = file.rpc_port;
        }
        if !explicit("network") {
            self.network = file.network;
        }
        if !explicit("payout_address") {
            self.payout_address = file.payout_address;
        }
        if !explicit("aux_chain_id") {
            self.aux_chain_id = file.aux_chain_id;
        }
        if !explicit("mine_on_demand") {
            self.mine_on_demand = file.mine_on_demand;
        }
        if !explicit("disable_networking") {
            self.disable_networking = file.disable_networking;
        }
        if !explicit("peers") {
            self.peers = file.peers;
        }
        if !explicit("initial_sync") {
            self.initial_sync = file.initial_sync;
        }
        if !explicit("block_subsidy") {
            self.block_subsidy = file.block_subsidy;
        }
        if !explicit("pow_limit_bits") {
            self.pow_limit_bits = file.pow_limit_bits;
        }
        if !explicit("log_level") {
            self.log_level = file.log_level;
        }
        if !explicit("log_format") {
            self.log_format = file.log_format;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.rpc_socket_addr()?;
        self.pow_limit()?;
        self.payout_script()?;
        Ok(())
    }

    pub fn rpc_socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .rpc_interface
            .parse()
            .map_err(|e| Error::config(format!("Invalid RPC interface: {}", e)))?;
        Ok(SocketAddr::new(ip, self.rpc_port))
    }

    pub fn pow_limit(&self) -> Result<CompactTarget> {
        let bits = u32::from_str_radix(self.pow_limit_bits.trim_start_matches("0x"), 16)
            .map_err(|e| Error::config(format!("Invalid pow limit bits: {}", e)))?;
        let compact = CompactTarget::from_consensus(bits);
        crate::target::decode(compact)
            .map_err(|e| Error::config(format!("Unusable pow limit bits: {}", e)))?;
        Ok(compact)
    }

    /// Script for the configured payout address, if any
    pub fn payout_script(&self) -> Result<Option<ScriptBuf>> {
        self.payout_address
            .as_deref()
            .map(|address| parse_payout_address(address, self.network.into()))
            .transpose()
    }

    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            aux_chain_id: self.aux_chain_id,
            mine_blocks_on_demand: self.mine_on_demand,
        }
    }

    pub fn dev_node_config(&self) -> Result<DevNodeConfig> {
        Ok(DevNodeConfig {
            subsidy: Amount::from_sat(self.block_subsidy),
            pow_limit: self.pow_limit()?,
            peers: self.peers,
            initial_sync: self.initial_sync,
            ..DevNodeConfig::default()
        })
    }
}

/// Turn a payout address into its output script, checking the network
pub fn parse_payout_address(address: &str, network: Network) -> Result<ScriptBuf> {
    let unchecked = address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| Error::invalid_address(e.to_string()))?;
    let checked = unchecked
        .require_network(network)
        .map_err(|e| Error::invalid_address(e.to_string()))?;
    Ok(checked.script_pubkey())
}

// Default value functions for serde
fn default_rpc_interface() -> String { "127.0.0.1".to_string() }
fn default_rpc_port() -> u16 { 18443 }
fn default_network() -> NetworkKind { NetworkKind::Regtest }
fn default_aux_chain_id() -> u32 { 6 }
fn default_peers() -> usize { 1 }
fn default_block_subsidy() -> u64 { 5_000_000_000 }
fn default_pow_limit_bits() -> String { "207fffff".to_string() }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_format() -> LogFormat { LogFormat::Plain }

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const REGTEST_ADDRESS: &str = "bcrt1qw508d6qejxtdg4y5r3zarvary0c5xw7kygt080";
    const MAINNET_ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    #[test]
    fn test_config_defaults() {
        let config = Config::try_parse_from(["auxpow-minerd"]).unwrap();

        assert_eq!(config.rpc_port, 18443);
        assert_eq!(config.network, NetworkKind::Regtest);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.log_format, LogFormat::Plain);
        assert!(!config.mine_on_demand);
        assert!(config.validate().is_ok());
        assert_eq!(config.pow_limit().unwrap().to_consensus(), 0x207fffff);
    }

    #[tokio::test]
    async fn test_config_from_yaml() {
        let yaml_content = r#"
rpc_port: 9000
network: regtest
payout_address: "bcrt1qw508d6qejxtdg4y5r3zarvary0c5xw7kygt080"
mine_on_demand: true
aux_chain_id: 42
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = Config::load_from_file(&temp_file.path().to_path_buf())
            .await
            .unwrap();

        assert_eq!(config.rpc_port, 9000);
        assert_eq!(config.aux_chain_id, 42);
        assert!(config.mine_on_demand);
        assert_eq!(config.peers, 1);
        assert!(config.payout_script().unwrap().is_some());
    }

    fn parse_args(argv: &[&str]) -> (Config, ArgMatches) {
        let args = Config::command().try_get_matches_from(argv).unwrap();
        (Config::from_arg_matches(&args).unwrap(), args)
    }

    #[tokio::test]
    async fn test_file_fills_options_left_at_default() {
        let yaml_content = r#"
rpc_port: 9000
aux_chain_id: 42
peers: 5
log_format: json
payout_address: "bcrt1qw508d6qejxtdg4y5r3zarvary0c5xw7kygt080"
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();
        let file = Config::load_from_file(&temp_file.path().to_path_buf())
            .await
            .unwrap();

        let (cli, args) = parse_args(&["auxpow-minerd", "--peers", "3", "--mine-on-demand"]);
        let merged = cli.merge_with_file(file, &args);

        assert_eq!(merged.rpc_port, 9000);
        assert_eq!(merged.aux_chain_id, 42);
        assert_eq!(merged.log_format, LogFormat::Json);
        assert_eq!(merged.payout_address.as_deref(), Some(REGTEST_ADDRESS));
        // Explicit command line values win
        assert_eq!(merged.peers, 3);
        assert!(merged.mine_on_demand);
        // Options absent from both keep their defaults
        assert_eq!(merged.network, NetworkKind::Regtest);
        assert_eq!(merged.block_subsidy, 5_000_000_000);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_merge_prefers_command_line_address() {
        let (cli, args) = parse_args(&["auxpow-minerd", "--payout-address", REGTEST_ADDRESS]);
        let (mut file, _) = parse_args(&["auxpow-minerd", "--mine-on-demand"]);
        file.payout_address = Some("other".to_string());

        let merged = cli.merge_with_file(file, &args);
        assert_eq!(merged.payout_address.as_deref(), Some(REGTEST_ADDRESS));
        assert!(merged.mine_on_demand);
    }

    #[test]
    fn test_payout_address_network() {
        assert!(parse_payout_address(REGTEST_ADDRESS, Network::Regtest).is_ok());
        assert_matches!(
            parse_payout_address(MAINNET_ADDRESS, Network::Regtest),
            Err(Error::InvalidAddress { .. })
        );
        assert_matches!(
            parse_payout_address("not-an-address", Network::Regtest),
            Err(Error::InvalidAddress { .. })
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config =
            Config::try_parse_from(["auxpow-minerd", "--rpc-interface", "localhost"]).unwrap();
        assert_matches!(config.validate(), Err(Error::Config { .. }));

        let config =
            Config::try_parse_from(["auxpow-minerd", "--pow-limit-bits", "04923456"]).unwrap();
        assert_matches!(config.validate(), Err(Error::Config { .. }));

        let config =
            Config::try_parse_from(["auxpow-minerd", "--payout-address", MAINNET_ADDRESS])
                .unwrap();
        assert_matches!(config.validate(), Err(Error::InvalidAddress { .. }));
    }

    #[test]
    fn test_network_display() {
        assert_eq!(NetworkKind::Regtest.to_string(), "regtest");
        assert_eq!(Network::from(NetworkKind::Signet), Network::Signet);
    }
}
