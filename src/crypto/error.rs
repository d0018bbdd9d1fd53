// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gateway Error Types
//!
//! Error types for the encryption, session, and decryption gateways.
//!
//! ## Error Variants
//!
//! - **EncryptionError**: sealing a payload failed (bad input, backend failure)
//! - **ConsentDenied**: the wallet refused or failed the consent signature
//! - **DecryptionError**: any decryption failure, deliberately collapsed
//!
//! ## Decryption Collapse
//!
//! `DecryptionError` never reveals *why* an unlock failed. Expired session,
//! policy mismatch, tampered ciphertext, and network failure all render as the
//! same message, so a caller probing the system cannot distinguish "you are
//! not allowed" from "this data is damaged". The underlying cause is kept for
//! debug logging only.

use std::fmt;

use thiserror::Error;

use crate::crypto::policy::InvalidPrincipal;
use crate::threshold::backend::BackendError;

/// Error produced while sealing a payload.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// Recipient address failed validation
    #[error(transparent)]
    InvalidPrincipal(#[from] InvalidPrincipal),

    /// Gateway configuration is unusable
    ///
    /// This error occurs when:
    /// - The threshold is zero
    /// - The program id is empty
    #[error("Invalid encryption config: {reason}")]
    InvalidConfig {
        /// Which constraint was violated
        reason: String,
    },

    /// The threshold-encryption backend rejected or failed the request
    #[error("Encryption backend failure: {0}")]
    Backend(#[from] BackendError),

    /// The backend returned an envelope that does not serialize
    #[error("Malformed encrypted object: {reason}")]
    MalformedObject {
        /// Specific failure reason
        reason: String,
    },
}

/// Error produced when a wallet declines to sign the consent message.
///
/// Covers both an explicit user rejection and a signer that is unable to
/// produce a signature at all.
#[derive(Debug, Clone, Error)]
#[error("Consent denied: {reason}")]
pub struct ConsentDenied {
    /// Why consent was not granted
    pub reason: String,
}

impl ConsentDenied {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The uniform decryption failure.
///
/// Every failed unlock attempt, whatever the cause, renders as the same
/// message. The cause is private and surfaces only through [`fmt::Debug`] and
/// the gateway's debug-level logs.
pub struct DecryptionError {
    cause: String,
}

impl DecryptionError {
    /// Message shown for every failed unlock.
    pub const MESSAGE: &'static str = "could not unlock";

    pub(crate) fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// The internal cause, for diagnostics. Never expose this to end users.
    pub(crate) fn cause(&self) -> &str {
        &self.cause
    }
}

impl fmt::Display for DecryptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::MESSAGE)
    }
}

impl fmt::Debug for DecryptionError {
    // Debug keeps the cause visible for operator logs. Display never does.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionError")
            .field("cause", &self.cause)
            .finish()
    }
}

impl std::error::Error for DecryptionError {}
