// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Store response contained no blob id")]
    MissingBlobId,
}

/// Content-addressed blob storage.
///
/// `store` returns the blob id under which `retrieve` finds the bytes again.
/// Blobs are immutable; storing identical content may return the same id.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, data: Vec<u8>) -> Result<String, StorageError>;
    async fn retrieve(&self, blob_id: &str) -> Result<Vec<u8>, StorageError>;

    // Mock-specific method (no-op for real backend)
    async fn inject_error(&self, _error: StorageError) {}
}

#[derive(Debug, Clone)]
pub struct WalrusConfig {
    pub publisher_url: String,
    pub aggregator_url: String,
    /// How many storage epochs a blob is paid for
    pub epochs: u32,
}

impl Default for WalrusConfig {
    fn default() -> Self {
        Self {
            publisher_url: "https://publisher.walrus-testnet.walrus.space".to_string(),
            aggregator_url: "https://aggregator.walrus-testnet.walrus.space".to_string(),
            epochs: 5,
        }
    }
}

/// Upload response: exactly one of the two branches is present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreResponse {
    newly_created: Option<NewlyCreated>,
    already_certified: Option<AlreadyCertified>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewlyCreated {
    blob_object: BlobObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobObject {
    blob_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyCertified {
    blob_id: String,
}

impl StoreResponse {
    fn blob_id(self) -> Option<String> {
        self.newly_created
            .map(|n| n.blob_object.blob_id)
            .or_else(|| self.already_certified.map(|a| a.blob_id))
    }
}

/// HTTP client for a Walrus publisher/aggregator pair.
#[derive(Debug, Clone)]
pub struct WalrusClient {
    client: reqwest::Client,
    config: WalrusConfig,
}

impl WalrusClient {
    pub fn new(config: WalrusConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl BlobStore for WalrusClient {
    async fn store(&self, data: Vec<u8>) -> Result<String, StorageError> {
        let url = format!(
            "{}/v1/store?epochs={}",
            self.config.publisher_url.trim_end_matches('/'),
            self.config.epochs
        );

        let response = self
            .client
            .put(&url)
            .header("Content-Type", "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::ServerError(format!(
                "Upload failed: {}",
                response.status()
            )));
        }

        let result: StoreResponse = response
            .json()
            .await
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let blob_id = result.blob_id().ok_or(StorageError::MissingBlobId)?;
        debug!("Stored blob {}", blob_id);
        Ok(blob_id)
    }

    async fn retrieve(&self, blob_id: &str) -> Result<Vec<u8>, StorageError> {
        let url = format!(
            "{}/v1/{}",
            self.config.aggregator_url.trim_end_matches('/'),
            blob_id
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(blob_id.to_string()));
        }

        if !response.status().is_success() {
            return Err(StorageError::ServerError(format!(
                "Download failed: {}",
                response.status()
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;
        Ok(data.to_vec())
    }
}

/// In-memory blob store addressing blobs by content hash.
///
/// Ids are the url-safe base64 of the content's SHA-256, so storing the same
/// bytes twice yields the same id, like a real Walrus `alreadyCertified`.
#[derive(Debug)]
pub struct MockBlobStore {
    storage: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    injected_error: Arc<Mutex<Option<StorageError>>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            injected_error: Arc::new(Mutex::new(None)),
        }
    }

    async fn take_injected_error(&self) -> Option<StorageError> {
        self.injected_error.lock().await.take()
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn store(&self, data: Vec<u8>) -> Result<String, StorageError> {
        if let Some(error) = self.take_injected_error().await {
            return Err(error);
        }

        let blob_id = URL_SAFE_NO_PAD.encode(Sha256::digest(&data));
        let mut storage = self.storage.lock().await;
        storage.insert(blob_id.clone(), data);
        Ok(blob_id)
    }

    async fn retrieve(&self, blob_id: &str) -> Result<Vec<u8>, StorageError> {
        if let Some(error) = self.take_injected_error().await {
            return Err(error);
        }

        let storage = self.storage.lock().await;
        storage
            .get(blob_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(blob_id.to_string()))
    }

    async fn inject_error(&self, error: StorageError) {
        let mut injected_error = self.injected_error.lock().await;
        *injected_error = Some(error);
    }
}

/// Build a blob store from environment variables.
///
/// `VAULT_MOCK_STORAGE=true` selects the in-memory mock. Otherwise a
/// [`WalrusClient`] is built from `WALRUS_PUBLISHER_URL`,
/// `WALRUS_AGGREGATOR_URL` and `WALRUS_EPOCHS`, falling back to the testnet
/// endpoints.
pub fn create_blob_store_from_env() -> Result<Arc<dyn BlobStore>, StorageError> {
    let use_mock = std::env::var("VAULT_MOCK_STORAGE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if use_mock {
        info!("📦 Using in-memory blob store");
        return Ok(Arc::new(MockBlobStore::new()));
    }

    let defaults = WalrusConfig::default();
    let config = WalrusConfig {
        publisher_url: std::env::var("WALRUS_PUBLISHER_URL")
            .unwrap_or(defaults.publisher_url),
        aggregator_url: std::env::var("WALRUS_AGGREGATOR_URL")
            .unwrap_or(defaults.aggregator_url),
        epochs: std::env::var("WALRUS_EPOCHS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.epochs),
    };

    info!("📦 Using Walrus blob store at {}", config.publisher_url);
    Ok(Arc::new(WalrusClient::new(config)?))
}
