//! Facilitator service configuration.
//!
//! All options are read from the environment (or command line) via clap.
//! A `.env` file is honored when present; see the binary's startup.

use std::net::IpAddr;

use clap::Parser;

/// Configuration for the facilitator server.
#[derive(Debug, Clone, Parser)]
#[command(name = "s402-facilitator", about = "s402 payment facilitator server")]
pub struct FacilitatorConfig {
    /// Server bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Server port.
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Payment address reported by `/health`.
    #[arg(
        long,
        env = "FACILITATOR_ADDRESS",
        default_value = "FACILITATOR_SETTLEMENT_ADDRESS"
    )]
    pub facilitator_address: String,

    /// Settlement network this facilitator serves.
    #[arg(long, env = "NETWORK", default_value = "solana-devnet")]
    pub network: String,

    /// Asset this facilitator settles in, when pinned.
    #[arg(long, env = "ASSET")]
    pub asset: Option<String>,

    /// How long a registered nonce stays eligible for settlement.
    #[arg(long, env = "NONCE_TTL_MS", default_value_t = 15 * 60 * 1000)]
    pub nonce_ttl_ms: u64,

    /// How long a consumed nonce record is retained for observability.
    #[arg(long, env = "USED_NONCE_RETENTION_MS", default_value_t = 60 * 60 * 1000)]
    pub used_nonce_retention_ms: u64,

    /// Interval between background sweeps of the nonce registry.
    #[arg(long, env = "CLEANUP_INTERVAL_MS", default_value_t = 60 * 1000)]
    pub cleanup_interval_ms: u64,

    /// Maximum accepted request body size, in bytes.
    #[arg(long, env = "REQUEST_BODY_LIMIT", default_value_t = 1024 * 1024)]
    pub request_body_limit: usize,

    /// Simulate transfers instead of submitting them to a real network.
    #[arg(
        long,
        env = "SIMULATE_TRANSACTIONS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub simulate_transactions: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_without_environment() {
        let config = FacilitatorConfig::parse_from(["s402-facilitator"]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.network, "solana-devnet");
        assert_eq!(config.nonce_ttl_ms, 15 * 60 * 1000);
        assert!(config.simulate_transactions);
    }

    #[test]
    fn flags_override_defaults() {
        let config = FacilitatorConfig::parse_from([
            "s402-facilitator",
            "--port",
            "4021",
            "--network",
            "solana-mainnet",
            "--nonce-ttl-ms",
            "1000",
        ]);
        assert_eq!(config.port, 4021);
        assert_eq!(config.network, "solana-mainnet");
        assert_eq!(config.nonce_ttl_ms, 1000);
    }
}
