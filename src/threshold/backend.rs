// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Threshold Encryption Backend Contract
//!
//! The gateways never talk to key servers directly; they go through the
//! [`ThresholdEncryption`] trait. Two implementations ship with the crate:
//!
//! - `KeyServerBackend`: HTTP client for a cluster of real key servers
//! - `MockThresholdBackend`: in-process cluster for tests and offline use
//!
//! Both enforce the same rule: decryption succeeds only for a live,
//! wallet-signed session whose address satisfies the object's policy.

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::object::EncryptedObject;
use crate::crypto::policy::PolicyId;
use crate::crypto::session::SessionKey;

/// Errors from a threshold-encryption backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Failed to reach a key server
    #[error("Key server network error: {0}")]
    NetworkError(String),

    /// A key server answered with a non-success status
    #[error("Key server error ({status}): {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// The key servers refused to release shares for this request
    ///
    /// Covers expired sessions, missing or invalid consent signatures, and
    /// policy mismatches. Terminal: trying another server cannot help.
    #[error("Access denied: {reason}")]
    AccessDenied {
        /// Why the request was refused
        reason: String,
    },

    /// Backend configuration is unusable
    #[error("Invalid backend config: {0}")]
    InvalidConfig(String),

    /// A key server answered with a body this client cannot parse
    #[error("Malformed key server response: {0}")]
    MalformedResponse(String),
}

/// Parameters for sealing a payload under a policy.
#[derive(Debug, Clone)]
pub struct EncryptRequest {
    /// Key-server shares required to decrypt
    pub threshold: u8,
    /// Deployed access-control program
    pub program_id: String,
    /// Policy gating later decryption
    pub policy_id: PolicyId,
    /// Plaintext bytes to seal
    pub data: Vec<u8>,
}

/// Parameters for unsealing a payload with a session key.
#[derive(Debug, Clone)]
pub struct DecryptRequest {
    /// Envelope to unseal
    pub object: EncryptedObject,
    /// Wallet-approved session the request acts under
    pub session: SessionKey,
    /// Proof bytes evaluated by the access-control program
    pub proof: Vec<u8>,
}

/// A cluster of key servers, real or simulated.
#[async_trait]
pub trait ThresholdEncryption: Send + Sync {
    /// Seal `request.data` so only `request.policy_id` can unseal it.
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptedObject, BackendError>;

    /// Unseal an envelope under a session key.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::AccessDenied`] when the session or policy does
    /// not authorize the unseal, and other variants for transport or server
    /// failures. Callers in the decryption gateway collapse every variant
    /// into the uniform decryption failure.
    async fn decrypt(&self, request: DecryptRequest) -> Result<Vec<u8>, BackendError>;
}
