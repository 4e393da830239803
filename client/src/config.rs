//! Process configuration shared by the binaries.
//!
//! The connection triple (RPC endpoint, signing key, contract) is mandatory and
//! taken from flags or the environment. Everything else lives in an optional
//! YAML file with per-field defaults.

use crate::{
    codec::EncryptionContext,
    events::ScanConfig,
    gateway::{DecryptionProtocol, GatewayConfig},
};
use clap::Args;
use ethers::signers::{LocalWallet, Signer};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;
use veilrps_types::Address;

/// Decryption verifier used for `user_decrypt` authorizations on Sepolia.
pub const DEFAULT_DECRYPTION_VERIFIER: &str = "0x5D8BD78e2ea6bbE41f26dFe9fdaEAa349e077478";

/// Public relayer serving input proofs and user decryption.
pub const DEFAULT_GATEWAY_URL: &str = "https://relayer.testnet.zama.cloud";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {field} (pass --{flag} or set {env})")]
    Missing {
        field: &'static str,
        flag: &'static str,
        env: &'static str,
    },
    #[error("{field} must be a 32-byte hex secp256k1 key")]
    InvalidKey { field: &'static str },
    #[error("{field} must be a 20-byte hex address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("{field} must be a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("{field} URL scheme must be http or https: {value}")]
    InvalidUrlScheme { field: &'static str, value: String },
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Connection flags shared by every binary.
#[derive(Args, Clone, Default)]
pub struct ConnectionArgs {
    /// JSON-RPC endpoint of the ledger
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Hex private key signing transactions and decryption authorizations
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Fallback signing key, read when `--private-key` is unset
    #[arg(long, env = "ADMIN_PRIVATE_KEY", hide = true, hide_env_values = true)]
    pub admin_private_key: Option<String>,

    /// Address of the game contract
    #[arg(long = "contract", env = "CONTRACT_ADDRESS")]
    pub contract_address: Option<String>,

    /// Chain id used for signing (queried from the RPC when omitted)
    #[arg(long, env = "CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Optional YAML file with tunables
    #[arg(long = "config")]
    pub config_path: Option<PathBuf>,
}

impl fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionArgs")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field(
                "admin_private_key",
                &self.admin_private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("contract_address", &self.contract_address)
            .field("chain_id", &self.chain_id)
            .field("config_path", &self.config_path)
            .finish()
    }
}

/// Optional settings, loaded from YAML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunables {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_log_range")]
    pub log_range: u64,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_gateway_timeout_ms")]
    pub gateway_timeout_ms: u64,
    #[serde(default)]
    pub decryption_protocol: DecryptionProtocol,
    #[serde(default = "default_decryption_verifier")]
    pub decryption_verifier: String,
    #[serde(default = "default_authorization_days")]
    pub authorization_days: Option<u64>,
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            confirmations: default_confirmations(),
            log_range: default_log_range(),
            gateway_url: default_gateway_url(),
            gateway_timeout_ms: default_gateway_timeout_ms(),
            decryption_protocol: DecryptionProtocol::default(),
            decryption_verifier: default_decryption_verifier(),
            authorization_days: default_authorization_days(),
            drain_timeout_ms: default_drain_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Tunables {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn default_poll_interval_ms() -> u64 {
    4_000
}

fn default_confirmations() -> u64 {
    1
}

fn default_log_range() -> u64 {
    2_000
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_gateway_timeout_ms() -> u64 {
    30_000
}

fn default_decryption_verifier() -> String {
    DEFAULT_DECRYPTION_VERIFIER.to_string()
}

fn default_authorization_days() -> Option<u64> {
    Some(1)
}

fn default_drain_timeout_ms() -> u64 {
    5_000
}

fn default_channel_capacity() -> usize {
    1_024
}

pub struct ValidatedConfig {
    pub rpc_url: Url,
    pub signer: LocalWallet,
    pub account: Address,
    pub contract: Address,
    pub chain_id: Option<u64>,

    pub poll_interval: Duration,
    pub confirmations: u64,
    pub log_range: u64,
    pub channel_capacity: usize,

    pub gateway_url: Url,
    pub gateway_timeout: Duration,
    pub decryption_protocol: DecryptionProtocol,
    pub decryption_verifier: Address,
    pub authorization_days: Option<u64>,

    pub drain_timeout: Duration,
}

impl fmt::Debug for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("signer", &"<redacted>")
            .field("account", &self.account)
            .field("contract", &self.contract)
            .field("chain_id", &self.chain_id)
            .field("poll_interval", &self.poll_interval)
            .field("confirmations", &self.confirmations)
            .field("log_range", &self.log_range)
            .field("channel_capacity", &self.channel_capacity)
            .field("gateway_url", &self.gateway_url.as_str())
            .field("gateway_timeout", &self.gateway_timeout)
            .field("decryption_protocol", &self.decryption_protocol)
            .field("decryption_verifier", &self.decryption_verifier)
            .field("authorization_days", &self.authorization_days)
            .field("drain_timeout", &self.drain_timeout)
            .finish()
    }
}

impl ValidatedConfig {
    pub fn scan(&self, from_block: Option<u64>) -> ScanConfig {
        ScanConfig {
            from_block,
            poll_interval: self.poll_interval,
            confirmations: self.confirmations,
            log_range: self.log_range,
            capacity: self.channel_capacity,
        }
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            protocol: self.decryption_protocol,
            verifier: self.decryption_verifier,
            validity_days: self.authorization_days,
            timeout: self.gateway_timeout,
        }
    }

    /// Binding for moves this process submits.
    pub fn encryption_context(&self) -> EncryptionContext {
        EncryptionContext {
            contract: self.contract,
            submitter: self.account,
        }
    }
}

impl ConnectionArgs {
    /// Validate flags and load tunables. Performs no network I/O.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let rpc_url = require(&self.rpc_url, "RPC URL", "rpc-url", "RPC_URL")?;
        let private_key = require(&self.private_key, "signing key", "private-key", "PRIVATE_KEY")
            .or_else(|err| {
                require(&self.admin_private_key, "signing key", "private-key", "PRIVATE_KEY")
                    .map_err(|_| err)
            })?;
        let contract = require(
            &self.contract_address,
            "contract address",
            "contract",
            "CONTRACT_ADDRESS",
        )?;

        let rpc_url = parse_http_url("rpc_url", rpc_url)?;
        let signer = parse_wallet("private_key", private_key)?;
        let contract = parse_address("contract", contract)?;
        if let Some(chain_id) = self.chain_id {
            ensure_nonzero("chain_id", chain_id)?;
        }

        let tunables = match &self.config_path {
            Some(path) => Tunables::load(path)?,
            None => Tunables::default(),
        };
        ensure_nonzero("poll_interval_ms", tunables.poll_interval_ms)?;
        ensure_nonzero("log_range", tunables.log_range)?;
        ensure_nonzero("gateway_timeout_ms", tunables.gateway_timeout_ms)?;
        ensure_nonzero("channel_capacity", tunables.channel_capacity as u64)?;
        let mut gateway_url = parse_http_url("gateway_url", &tunables.gateway_url)?;
        if !gateway_url.path().ends_with('/') {
            let path = format!("{}/", gateway_url.path());
            gateway_url.set_path(&path);
        }

        Ok(ValidatedConfig {
            rpc_url,
            account: Address(signer.address().0),
            signer,
            contract,
            chain_id: self.chain_id,
            poll_interval: Duration::from_millis(tunables.poll_interval_ms),
            confirmations: tunables.confirmations,
            log_range: tunables.log_range,
            channel_capacity: tunables.channel_capacity,
            gateway_url,
            gateway_timeout: Duration::from_millis(tunables.gateway_timeout_ms),
            decryption_protocol: tunables.decryption_protocol,
            decryption_verifier: parse_address(
                "decryption_verifier",
                &tunables.decryption_verifier,
            )?,
            authorization_days: tunables.authorization_days,
            drain_timeout: Duration::from_millis(tunables.drain_timeout_ms),
        })
    }
}

fn require<'a>(
    value: &'a Option<String>,
    field: &'static str,
    flag: &'static str,
    env: &'static str,
) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing { field, flag, env })
}

fn parse_http_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        _ => {
            return Err(ConfigError::InvalidUrlScheme {
                field,
                value: value.to_string(),
            })
        }
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
    Ok(url)
}

fn parse_wallet(field: &'static str, value: &str) -> Result<LocalWallet, ConfigError> {
    value
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|_| ConfigError::InvalidKey { field })
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn ensure_nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}
