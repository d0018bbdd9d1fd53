// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decryption Gateway
//!
//! Unseals envelopes under a session key. Sessions that are obviously dead
//! (unsigned, expired) are refused before any backend traffic; every real
//! authorization decision lives in the threshold backend, which re-checks
//! those two as well and never trusts caller-side session state. What the
//! gateway owns is the error surface. Every failure, from a tampered
//! envelope to an expired session to an unreachable server, leaves here as
//! the one uniform [`DecryptionError`]. Real causes go to the debug log and
//! nowhere else.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::crypto::error::DecryptionError;
use crate::crypto::object::EncryptedObject;
use crate::crypto::session::SessionKey;
use crate::threshold::backend::{DecryptRequest, ThresholdEncryption};

/// Builds the proof bytes the access-control program evaluates.
///
/// The default [`EmptyIntentProof`] suits programs whose policy check needs
/// no caller-supplied evidence. Richer deployments (allowlists, paid access)
/// plug in their own builder.
#[async_trait]
pub trait ProofBuilder: Send + Sync {
    async fn build_proof(
        &self,
        object: &EncryptedObject,
        session: &SessionKey,
    ) -> anyhow::Result<Vec<u8>>;
}

/// Proof builder for policies that take no evidence: proves nothing, sends
/// nothing.
pub struct EmptyIntentProof;

#[async_trait]
impl ProofBuilder for EmptyIntentProof {
    async fn build_proof(
        &self,
        _object: &EncryptedObject,
        _session: &SessionKey,
    ) -> anyhow::Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

pub struct DecryptionGateway {
    backend: Arc<dyn ThresholdEncryption>,
    proof_builder: Arc<dyn ProofBuilder>,
}

impl DecryptionGateway {
    /// Create a gateway with the default empty proof.
    pub fn new(backend: Arc<dyn ThresholdEncryption>) -> Self {
        Self::with_proof_builder(backend, Arc::new(EmptyIntentProof))
    }

    /// Create a gateway with a custom proof builder.
    pub fn with_proof_builder(
        backend: Arc<dyn ThresholdEncryption>,
        proof_builder: Arc<dyn ProofBuilder>,
    ) -> Self {
        Self {
            backend,
            proof_builder,
        }
    }

    /// Unseal an envelope under a session key.
    ///
    /// # Errors
    ///
    /// Always [`DecryptionError`], whatever actually went wrong.
    pub async fn open(
        &self,
        object: &EncryptedObject,
        session: &SessionKey,
    ) -> Result<Vec<u8>, DecryptionError> {
        // Local checks first; the backend re-validates them independently
        if session.signature.len() != 65 {
            return Err(self.collapse("session signature missing or malformed".to_string()));
        }
        if session.is_expired() {
            return Err(self.collapse("session has expired".to_string()));
        }

        let proof = self
            .proof_builder
            .build_proof(object, session)
            .await
            .map_err(|e| self.collapse(format!("proof construction failed: {}", e)))?;

        let plaintext = self
            .backend
            .decrypt(DecryptRequest {
                object: object.clone(),
                session: session.clone(),
                proof,
            })
            .await
            .map_err(|e| self.collapse(e.to_string()))?;

        info!("🔓 Unsealed {} byte(s) for {}", plaintext.len(), session.address);
        Ok(plaintext)
    }

    /// Parse envelope bytes, then unseal them.
    ///
    /// Used when the envelope comes straight out of blob storage. A payload
    /// that does not even parse fails exactly like one the caller may not
    /// open.
    pub async fn open_bytes(
        &self,
        envelope: &[u8],
        session: &SessionKey,
    ) -> Result<Vec<u8>, DecryptionError> {
        let object = EncryptedObject::from_bytes(envelope)
            .map_err(|e| self.collapse(format!("envelope parse failed: {}", e)))?;
        self.open(&object, session).await
    }

    fn collapse(&self, cause: String) -> DecryptionError {
        let error = DecryptionError::new(cause);
        debug!("Unlock failed: {}", error.cause());
        error
    }
}
