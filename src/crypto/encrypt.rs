// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encryption Gateway
//!
//! Seals plaintext for a principal: derives the access policy from the
//! recipient's address, hands the payload to the threshold backend, and
//! returns the self-describing envelope. The gateway holds no key material
//! and no mutable state.

use std::sync::Arc;

use tracing::info;

use crate::crypto::error::EncryptionError;
use crate::crypto::object::EncryptedObject;
use crate::crypto::policy::{PolicyId, Principal};
use crate::threshold::backend::{EncryptRequest, ThresholdEncryption};

pub struct EncryptionGateway {
    backend: Arc<dyn ThresholdEncryption>,
    program_id: String,
    threshold: u8,
}

impl EncryptionGateway {
    /// Create a gateway over a threshold backend.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::InvalidConfig`] if the threshold is zero or
    /// the program id is empty.
    pub fn new(
        backend: Arc<dyn ThresholdEncryption>,
        program_id: impl Into<String>,
        threshold: u8,
    ) -> Result<Self, EncryptionError> {
        let program_id = program_id.into();

        if threshold == 0 {
            return Err(EncryptionError::InvalidConfig {
                reason: "threshold must be at least 1".to_string(),
            });
        }
        if program_id.is_empty() {
            return Err(EncryptionError::InvalidConfig {
                reason: "program id must not be empty".to_string(),
            });
        }

        Ok(Self {
            backend,
            program_id,
            threshold,
        })
    }

    /// Seal plaintext so only `recipient` (or a session it approves) can
    /// read it.
    pub async fn seal(
        &self,
        recipient: &Principal,
        plaintext: &[u8],
    ) -> Result<EncryptedObject, EncryptionError> {
        let policy_id = PolicyId::for_principal(recipient);

        let object = self
            .backend
            .encrypt(EncryptRequest {
                threshold: self.threshold,
                program_id: self.program_id.clone(),
                policy_id: policy_id.clone(),
                data: plaintext.to_vec(),
            })
            .await?;

        // The envelope must describe exactly the request we made
        if object.policy_id != policy_id
            || object.program_id != self.program_id
            || object.threshold != self.threshold
        {
            return Err(EncryptionError::MalformedObject {
                reason: "backend returned an envelope for a different request".to_string(),
            });
        }

        info!("🔒 Sealed {} byte(s) for {}", plaintext.len(), recipient);
        Ok(object)
    }

    /// Like [`seal`](Self::seal), parsing the recipient address first.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::InvalidPrincipal`] for a malformed address.
    pub async fn seal_for_address(
        &self,
        address: &str,
        plaintext: &[u8],
    ) -> Result<EncryptedObject, EncryptionError> {
        let recipient = Principal::parse(address)?;
        self.seal(&recipient, plaintext).await
    }
}
