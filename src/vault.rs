//! Context Vault Facade
//!
//! One object wiring the whole pipeline together: seal text for a principal,
//! park the envelope in blob storage, mint consent-backed sessions, and open
//! blobs back into plaintext. Library users who need finer control use the
//! gateways directly; the facade is the whole story for everyone else.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::VaultConfig;
use crate::crypto::decrypt::{DecryptionGateway, ProofBuilder};
use crate::crypto::encrypt::EncryptionGateway;
use crate::crypto::error::{ConsentDenied, DecryptionError, EncryptionError};
use crate::crypto::policy::{PolicyId, Principal};
use crate::crypto::session::{SessionKey, SessionManager};
use crate::crypto::signer::WalletSigner;
use crate::storage::walrus::{BlobStore, MockBlobStore, StorageError, WalrusClient};
use crate::threshold::backend::ThresholdEncryption;
use crate::threshold::keyserver::KeyServerBackend;
use crate::threshold::mock::MockThresholdBackend;

/// Receipt for a sealed-and-stored context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedContext {
    /// Blob id the envelope is stored under
    pub blob_id: String,
    /// Policy gating decryption
    pub policy_id: PolicyId,
}

/// Any failure the facade can produce.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Invalid vault config: {0}")]
    Config(String),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Consent(#[from] ConsentDenied),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct ContextVault {
    config: VaultConfig,
    backend: Arc<dyn ThresholdEncryption>,
    encryption: EncryptionGateway,
    decryption: DecryptionGateway,
    sessions: SessionManager,
    blobs: Arc<dyn BlobStore>,
}

impl ContextVault {
    /// Assemble a vault from explicit parts.
    pub fn new(
        config: VaultConfig,
        backend: Arc<dyn ThresholdEncryption>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, VaultError> {
        config
            .validate()
            .map_err(|e| VaultError::Config(e.to_string()))?;

        let encryption = EncryptionGateway::new(
            Arc::clone(&backend),
            config.program_id.clone(),
            config.threshold,
        )?;
        let decryption = DecryptionGateway::new(Arc::clone(&backend));
        let sessions = SessionManager::new(config.program_id.clone());

        info!("✅ Context vault ready (program {})", config.program_id);
        Ok(Self {
            config,
            backend,
            encryption,
            decryption,
            sessions,
            blobs,
        })
    }

    /// Connect to the configured key servers and blob store.
    pub fn connect(config: VaultConfig) -> Result<Self, VaultError> {
        let backend = KeyServerBackend::connect(&config.key_servers)
            .map_err(|e| VaultError::Config(e.to_string()))?;
        let blobs = WalrusClient::new(config.walrus.clone())?;
        Self::new(config, Arc::new(backend), Arc::new(blobs))
    }

    /// Fully in-process vault: simulated key servers, in-memory blobs.
    pub fn in_memory(config: VaultConfig) -> Result<Self, VaultError> {
        Self::new(
            config,
            Arc::new(MockThresholdBackend::new()),
            Arc::new(MockBlobStore::new()),
        )
    }

    /// Replace the proof builder used when opening contexts.
    pub fn with_proof_builder(mut self, proof_builder: Arc<dyn ProofBuilder>) -> Self {
        self.decryption =
            DecryptionGateway::with_proof_builder(Arc::clone(&self.backend), proof_builder);
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Mint a session for `signer`'s address via the wallet consent flow.
    ///
    /// # Arguments
    ///
    /// * `signer` - Wallet capability for the principal
    /// * `ttl_min` - Lifetime in minutes, or `None` for the configured default
    pub async fn create_session(
        &self,
        signer: &dyn WalletSigner,
        ttl_min: Option<u32>,
    ) -> Result<SessionKey, VaultError> {
        let ttl = ttl_min.unwrap_or(self.config.session_ttl_min);
        let session = self.sessions.create_session(signer, Some(ttl)).await?;
        Ok(session)
    }

    /// Seal plaintext for `recipient` and store the envelope.
    pub async fn seal(
        &self,
        recipient: &Principal,
        plaintext: &[u8],
    ) -> Result<SealedContext, VaultError> {
        let object = self.encryption.seal(recipient, plaintext).await?;

        let envelope = object.to_bytes().map_err(|e| {
            VaultError::Encryption(EncryptionError::MalformedObject {
                reason: e.to_string(),
            })
        })?;

        let blob_id = self.blobs.store(envelope).await?;
        info!("📦 Context stored as blob {}", blob_id);

        Ok(SealedContext {
            blob_id,
            policy_id: object.policy_id,
        })
    }

    /// Seal a text context for a raw address string.
    pub async fn seal_text(
        &self,
        recipient_address: &str,
        text: &str,
    ) -> Result<SealedContext, VaultError> {
        let recipient = Principal::parse(recipient_address)
            .map_err(EncryptionError::InvalidPrincipal)?;
        self.seal(&recipient, text.as_bytes()).await
    }

    /// Retrieve a stored envelope and unseal it under `session`.
    ///
    /// # Errors
    ///
    /// Storage problems (missing blob, unreachable store) surface as
    /// [`VaultError::Storage`]. Once the envelope bytes are in hand, every
    /// further failure is the uniform [`VaultError::Decryption`].
    pub async fn open(
        &self,
        blob_id: &str,
        session: &SessionKey,
    ) -> Result<Vec<u8>, VaultError> {
        let envelope = self.blobs.retrieve(blob_id).await?;
        let plaintext = self.decryption.open_bytes(&envelope, session).await?;
        Ok(plaintext)
    }

    /// Open a context and decode it as UTF-8 text.
    pub async fn open_text(
        &self,
        blob_id: &str,
        session: &SessionKey,
    ) -> Result<String, VaultError> {
        let plaintext = self.open(blob_id, session).await?;
        String::from_utf8(plaintext)
            .map_err(|_| VaultError::Decryption(DecryptionError::new("plaintext is not utf-8")))
    }
}
