// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP Key Server Backend
//!
//! Talks to a cluster of threshold key servers over HTTPS. Each server
//! exposes:
//!
//! - `POST /v1/encrypt` - seal a payload under a policy
//! - `POST /v1/decrypt` - release a payload to an authorized session
//! - `GET  /v1/service` - advertise the program the server holds shares for
//!   (checked by [`KeyServerBackend::verify_servers`])
//!
//! ## Failover
//!
//! Servers are tried in descending weight order. Network failures and 5xx
//! responses move on to the next server. A 401 or 403 is terminal: the
//! cluster has *decided* to refuse, and asking another member would only
//! produce the same refusal.
//!
//! ## Timeouts
//!
//! Requests carry no client-side timeout. Callers that need a deadline wrap
//! the call (`tokio::time::timeout`) at their own layer.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::KeyServerEntry;
use crate::crypto::object::EncryptedObject;
use crate::crypto::session::SessionKey;
use crate::threshold::backend::{
    BackendError, DecryptRequest, EncryptRequest, ThresholdEncryption,
};

/// Serializable session proof sent to key servers.
///
/// Carries the session parameters plus the consent signature. The server
/// re-renders the consent message from these fields and recovers the signer,
/// so any altered field invalidates the certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCertificate {
    /// Principal the session acts for
    pub address: String,
    /// Access-control program the session is scoped to
    pub program_id: String,
    /// Session creation time, unix seconds
    pub created_at: i64,
    /// Lifetime in minutes from `created_at`
    pub ttl_min: u32,
    /// Hex-encoded 65-byte consent signature
    pub signature: String,
}

impl From<&SessionKey> for SessionCertificate {
    fn from(session: &SessionKey) -> Self {
        Self {
            address: session.address.to_string(),
            program_id: session.program_id.clone(),
            created_at: session.created_at.timestamp(),
            ttl_min: session.ttl_min,
            signature: hex::encode(&session.signature),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptWireRequest {
    threshold: u8,
    program_id: String,
    policy_id: String,
    /// Base64-encoded plaintext
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptWireResponse {
    encrypted_object: EncryptedObject,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecryptWireRequest {
    encrypted_object: EncryptedObject,
    session: SessionCertificate,
    /// Base64-encoded proof bytes
    proof: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecryptWireResponse {
    /// Base64-encoded plaintext
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceInfo {
    /// Access-control program this server holds shares for
    program_id: String,
    #[serde(default)]
    version: Option<String>,
}

/// Client for a weighted cluster of key servers.
#[derive(Debug, Clone)]
pub struct KeyServerBackend {
    client: reqwest::Client,
    servers: Vec<KeyServerEntry>,
}

impl KeyServerBackend {
    /// Build a backend over the given servers.
    ///
    /// Servers are sorted by descending weight once here; every request walks
    /// them in that order.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidConfig`] if the list is empty or any
    /// url fails to parse.
    pub fn connect(servers: &[KeyServerEntry]) -> Result<Self, BackendError> {
        // 1. At least one server
        if servers.is_empty() {
            return Err(BackendError::InvalidConfig(
                "no key servers configured".to_string(),
            ));
        }

        // 2. Every url must parse
        for server in servers {
            Url::parse(&server.url).map_err(|e| {
                BackendError::InvalidConfig(format!(
                    "invalid key server url '{}': {}",
                    server.url, e
                ))
            })?;
        }

        // 3. Highest weight first
        let mut servers = servers.to_vec();
        servers.sort_by(|a, b| b.weight.cmp(&a.weight));

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BackendError::InvalidConfig(format!("http client: {}", e)))?;

        info!("🔑 Connected to {} key server(s)", servers.len());
        Ok(Self { client, servers })
    }

    /// Ask every configured server which program it serves and require a
    /// match against `program_id`.
    ///
    /// Optional: clients that trust their configuration skip this. Useful
    /// when the server list comes from an untrusted registry.
    pub async fn verify_servers(&self, program_id: &str) -> Result<(), BackendError> {
        for server in &self.servers {
            let url = endpoint(&server.url, "v1/service");
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| BackendError::NetworkError(e.to_string()))?;

            if !response.status().is_success() {
                return Err(BackendError::ServerError {
                    status: response.status().as_u16(),
                    message: format!("service check failed for {}", server.url),
                });
            }

            let info: ServiceInfo = response
                .json()
                .await
                .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

            if info.program_id != program_id {
                return Err(BackendError::InvalidConfig(format!(
                    "key server {} serves program {}, expected {}",
                    server.url, info.program_id, program_id
                )));
            }

            debug!(
                "Key server {} verified (version {:?})",
                server.url, info.version
            );
        }
        Ok(())
    }
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

#[async_trait]
impl ThresholdEncryption for KeyServerBackend {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptedObject, BackendError> {
        let wire = EncryptWireRequest {
            threshold: request.threshold,
            program_id: request.program_id,
            policy_id: request.policy_id.as_str().to_string(),
            data: BASE64.encode(&request.data),
        };

        let mut last_error = None;

        for server in &self.servers {
            let url = endpoint(&server.url, "v1/encrypt");
            debug!("Encrypting via key server {}", server.url);

            let response = match self.client.post(&url).json(&wire).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Key server {} unreachable: {}", server.url, e);
                    last_error = Some(BackendError::NetworkError(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: EncryptWireResponse = response
                    .json()
                    .await
                    .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;
                return Ok(parsed.encrypted_object);
            }

            if status.is_server_error() {
                warn!("Key server {} failed with {}, trying next", server.url, status);
                last_error = Some(BackendError::ServerError {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
                continue;
            }

            // 4xx: the request itself is bad, another server won't differ
            return Err(BackendError::ServerError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Err(last_error
            .unwrap_or_else(|| BackendError::InvalidConfig("no key servers configured".to_string())))
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<Vec<u8>, BackendError> {
        let wire = DecryptWireRequest {
            encrypted_object: request.object,
            session: SessionCertificate::from(&request.session),
            proof: BASE64.encode(&request.proof),
        };

        let mut last_error = None;

        for server in &self.servers {
            let url = endpoint(&server.url, "v1/decrypt");
            debug!("Decrypting via key server {}", server.url);

            let response = match self.client.post(&url).json(&wire).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Key server {} unreachable: {}", server.url, e);
                    last_error = Some(BackendError::NetworkError(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: DecryptWireResponse = response
                    .json()
                    .await
                    .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;
                return BASE64
                    .decode(&parsed.data)
                    .map_err(|e| BackendError::MalformedResponse(e.to_string()));
            }

            // A refusal is the cluster's answer, not a server fault
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let reason = response.text().await.unwrap_or_default();
                return Err(BackendError::AccessDenied { reason });
            }

            if status.is_server_error() {
                warn!("Key server {} failed with {}, trying next", server.url, status);
                last_error = Some(BackendError::ServerError {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
                continue;
            }

            return Err(BackendError::ServerError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Err(last_error
            .unwrap_or_else(|| BackendError::InvalidConfig("no key servers configured".to_string())))
    }
}
