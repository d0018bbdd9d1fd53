use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::crypto::session::DEFAULT_TTL_MIN;
use crate::storage::walrus::WalrusConfig;

/// One key server in the cluster, with its failover weight.
///
/// Higher weight means tried earlier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyServerEntry {
    pub url: String,
    pub weight: u32,
}

/// Immutable configuration for a vault instance.
///
/// Built once (preset, env, or by hand) and shared read-only from then on.
#[derive(Clone, Debug)]
pub struct VaultConfig {
    /// Deployed access-control program all policies live under
    pub program_id: String,
    /// Key-server shares required to decrypt
    pub threshold: u8,
    /// Key server cluster
    pub key_servers: Vec<KeyServerEntry>,
    /// Default session lifetime in minutes
    pub session_ttl_min: u32,
    /// Blob store endpoints
    pub walrus: WalrusConfig,
}

impl VaultConfig {
    pub fn testnet() -> Self {
        VaultConfig {
            program_id: std::env::var("VAULT_PROGRAM_ID").unwrap_or_else(|_| {
                "0x4f2e63be8e7fe287836e29cde6f3d5cbc96eefd0c0e3f3747668faa2ae7324b0".to_string()
            }),
            threshold: 1,
            key_servers: vec![
                KeyServerEntry {
                    url: std::env::var("VAULT_KEY_SERVER_1")
                        .unwrap_or_else(|_| "https://keys-testnet-1.fabstir.com".to_string()),
                    weight: 2,
                },
                KeyServerEntry {
                    url: std::env::var("VAULT_KEY_SERVER_2")
                        .unwrap_or_else(|_| "https://keys-testnet-2.fabstir.com".to_string()),
                    weight: 1,
                },
            ],
            session_ttl_min: DEFAULT_TTL_MIN,
            walrus: WalrusConfig::default(),
        }
    }

    /// Build a config entirely from environment variables.
    ///
    /// Missing variables fall back to the testnet preset. `VAULT_KEY_SERVERS`
    /// is a comma-separated list of `url=weight` entries (weight defaults
    /// to 1 when omitted).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::testnet();

        let key_servers = match std::env::var("VAULT_KEY_SERVERS") {
            Ok(raw) => {
                let servers = parse_key_servers(&raw)?;
                if servers.is_empty() {
                    return Err(anyhow!("VAULT_KEY_SERVERS is set but empty"));
                }
                servers
            }
            Err(_) => defaults.key_servers,
        };

        let walrus_defaults = WalrusConfig::default();
        let config = VaultConfig {
            program_id: std::env::var("VAULT_PROGRAM_ID").unwrap_or(defaults.program_id),
            threshold: std::env::var("VAULT_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.threshold),
            key_servers,
            session_ttl_min: std::env::var("VAULT_SESSION_TTL_MIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_ttl_min),
            walrus: WalrusConfig {
                publisher_url: std::env::var("WALRUS_PUBLISHER_URL")
                    .unwrap_or(walrus_defaults.publisher_url),
                aggregator_url: std::env::var("WALRUS_AGGREGATOR_URL")
                    .unwrap_or(walrus_defaults.aggregator_url),
                epochs: std::env::var("WALRUS_EPOCHS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(walrus_defaults.epochs),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the config can actually drive a vault.
    pub fn validate(&self) -> Result<()> {
        if self.program_id.is_empty() {
            return Err(anyhow!("program_id must not be empty"));
        }
        if self.threshold == 0 {
            return Err(anyhow!("threshold must be at least 1"));
        }
        if self.key_servers.is_empty() {
            return Err(anyhow!("at least one key server is required"));
        }
        if self.threshold as usize > self.key_servers.len() {
            return Err(anyhow!(
                "threshold {} exceeds the {} configured key server(s)",
                self.threshold,
                self.key_servers.len()
            ));
        }
        if self.session_ttl_min == 0 {
            return Err(anyhow!("session_ttl_min must be at least 1"));
        }
        Ok(())
    }
}

fn parse_key_servers(raw: &str) -> Result<Vec<KeyServerEntry>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((url, weight)) => {
                let weight = weight
                    .parse()
                    .map_err(|_| anyhow!("invalid key server weight in '{}'", entry))?;
                Ok(KeyServerEntry {
                    url: url.trim().to_string(),
                    weight,
                })
            }
            None => Ok(KeyServerEntry {
                url: entry.to_string(),
                weight: 1,
            }),
        })
        .collect()
}
