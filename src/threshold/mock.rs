//! In-Process Threshold Cluster
//!
//! `MockThresholdBackend` simulates a key-server cluster inside the process.
//! It is not a stub: payloads are sealed with XChaCha20-Poly1305 under keys
//! derived per policy, and decryption runs the same authorization chain a
//! real cluster runs (signed session, live session, consent recovery, policy
//! and program match) before any key material is used.
//!
//! Two instances built from the same seed derive identical policy keys, so a
//! payload sealed by one can be unsealed by the other. That makes the mock
//! usable both for tests and for single-process deployments that accept a
//! local trust root instead of a key-server cluster.

use async_trait::async_trait;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use crate::crypto::object::{EncryptedObject, ENVELOPE_VERSION};
use crate::crypto::policy::PolicyId;
use crate::crypto::signer::recover_signer;
use crate::threshold::backend::{
    BackendError, DecryptRequest, EncryptRequest, ThresholdEncryption,
};

/// Simulated key-server cluster with a single root secret.
pub struct MockThresholdBackend {
    cluster_secret: [u8; 32],
}

impl MockThresholdBackend {
    /// Create a cluster with a random root secret.
    ///
    /// Objects sealed by this instance can only be unsealed by this instance.
    pub fn new() -> Self {
        let mut cluster_secret = [0u8; 32];
        OsRng.fill_bytes(&mut cluster_secret);
        Self { cluster_secret }
    }

    /// Create a cluster with a fixed root secret.
    ///
    /// Instances sharing a seed are interchangeable, which lets tests seal in
    /// one place and unseal in another.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            cluster_secret: seed,
        }
    }

    /// Derive the 32-byte sealing key for a policy under a program.
    ///
    /// HKDF-SHA256 over the cluster secret, with policy and program ids as
    /// the info string. Different policies never share a key.
    fn derive_policy_key(
        &self,
        policy_id: &PolicyId,
        program_id: &str,
    ) -> Result<[u8; 32], BackendError> {
        let hkdf = Hkdf::<Sha256>::new(None, &self.cluster_secret);
        let info = format!("policy-key|{}|{}", policy_id, program_id);

        let mut derived_key = [0u8; 32];
        hkdf.expand(info.as_bytes(), &mut derived_key)
            .map_err(|e| BackendError::ServerError {
                status: 500,
                message: format!("key derivation failed: {}", e),
            })?;

        Ok(derived_key)
    }
}

impl Default for MockThresholdBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Additional authenticated data binding a ciphertext to its envelope.
fn envelope_aad(policy_id: &PolicyId, program_id: &str) -> Vec<u8> {
    format!("{}|{}", policy_id, program_id).into_bytes()
}

#[async_trait]
impl ThresholdEncryption for MockThresholdBackend {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptedObject, BackendError> {
        // 1. Validate request parameters
        if request.threshold == 0 {
            return Err(BackendError::InvalidConfig(
                "threshold must be at least 1".to_string(),
            ));
        }
        if request.program_id.is_empty() {
            return Err(BackendError::InvalidConfig(
                "program id must not be empty".to_string(),
            ));
        }

        // 2. Derive the policy key and a fresh nonce
        let key = self.derive_policy_key(&request.policy_id, &request.program_id)?;
        let mut nonce = [0u8; 24];
        OsRng.fill_bytes(&mut nonce);

        // 3. Seal with XChaCha20-Poly1305, binding policy and program as AAD
        let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|e| {
            BackendError::ServerError {
                status: 500,
                message: format!("failed to create cipher: {}", e),
            }
        })?;

        let aad = envelope_aad(&request.policy_id, &request.program_id);
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &request.data,
                    aad: &aad,
                },
            )
            .map_err(|e| BackendError::ServerError {
                status: 500,
                message: format!("encryption failed: {}", e),
            })?;

        Ok(EncryptedObject {
            version: ENVELOPE_VERSION,
            program_id: request.program_id,
            policy_id: request.policy_id,
            threshold: request.threshold,
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<Vec<u8>, BackendError> {
        let session = &request.session;
        let object = &request.object;

        // 1. Session must carry a signature at all
        if session.signature.is_empty() {
            return Err(BackendError::AccessDenied {
                reason: "session is not signed".to_string(),
            });
        }
        if session.signature.len() != 65 {
            return Err(BackendError::AccessDenied {
                reason: format!(
                    "session signature must be 65 bytes, got {}",
                    session.signature.len()
                ),
            });
        }

        // 2. Session must still be live
        if session.is_expired() {
            return Err(BackendError::AccessDenied {
                reason: "session has expired".to_string(),
            });
        }

        // 3. Consent signature must recover to the session's address
        let message = session.consent_message();
        let signer = recover_signer(&session.signature, message.as_bytes()).map_err(|e| {
            BackendError::AccessDenied {
                reason: format!("consent signature invalid: {}", e),
            }
        })?;
        if signer != session.address {
            return Err(BackendError::AccessDenied {
                reason: format!(
                    "consent signed by {}, session claims {}",
                    signer, session.address
                ),
            });
        }

        // 4. The session's address must satisfy the object's policy
        if !object.policy_id.is_satisfied_by(&session.address) {
            return Err(BackendError::AccessDenied {
                reason: format!(
                    "policy {} does not permit {}",
                    object.policy_id, session.address
                ),
            });
        }

        // 5. The session must be scoped to the object's program
        if session.program_id != object.program_id {
            return Err(BackendError::AccessDenied {
                reason: format!(
                    "session program {} does not match object program {}",
                    session.program_id, object.program_id
                ),
            });
        }

        // 6. Unseal. The nonce arrives from storage and can carry any
        //    length; a malformed one reads the same as denial, like a tag
        //    failure.
        let nonce: [u8; 24] =
            object
                .nonce
                .as_slice()
                .try_into()
                .map_err(|_| BackendError::AccessDenied {
                    reason: format!("nonce must be 24 bytes, got {}", object.nonce.len()),
                })?;

        let key = self.derive_policy_key(&object.policy_id, &object.program_id)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|e| {
            BackendError::ServerError {
                status: 500,
                message: format!("failed to create cipher: {}", e),
            }
        })?;

        let aad = envelope_aad(&object.policy_id, &object.program_id);
        let plaintext = cipher
            .decrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &object.ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| BackendError::AccessDenied {
                reason: "ciphertext authentication failed".to_string(),
            })?;

        Ok(plaintext)
    }
}
