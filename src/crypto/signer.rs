// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wallet Signing Capability
//!
//! Session approval requires a signature from the principal's wallet. The
//! [`WalletSigner`] trait is the only way the session manager can request one,
//! so key custody stays behind an explicit capability boundary: browser
//! wallets, hardware signers, and the in-process [`LocalKeySigner`] all plug
//! in the same way.
//!
//! ## Signature Format
//!
//! ```text
//! digest    = keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)
//! signature = ecdsa_sign(digest)  // 65 bytes: r(32) + s(32) + v(1), v in {27, 28}
//! ```
//!
//! The signer's address is recoverable from any signature it produces, which
//! is how the key servers verify consent without ever seeing the private key.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use tiny_keccak::{Hasher, Keccak};

use crate::crypto::error::ConsentDenied;
use crate::crypto::policy::Principal;

/// Capability to sign personal messages with a wallet key.
///
/// Implementations must never expose the private key. A signer that cannot or
/// will not sign returns [`ConsentDenied`].
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// The chain address this signer controls.
    fn address(&self) -> Principal;

    /// Sign a personal message, returning the 65-byte compact signature.
    ///
    /// Interactive wallets prompt the user here. Rejection, timeout, and any
    /// other refusal all surface as [`ConsentDenied`].
    async fn sign_personal_message(&self, message: &[u8]) -> Result<Vec<u8>, ConsentDenied>;
}

/// In-process signer backed by a raw secp256k1 private key.
///
/// Used by the CLI and by tests. Production deployments that hold keys in a
/// wallet or enclave implement [`WalletSigner`] against that custody instead.
pub struct LocalKeySigner {
    signing_key: SigningKey,
    address: Principal,
}

impl LocalKeySigner {
    /// Create a signer from a 32-byte private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid secp256k1 scalar.
    pub fn from_private_key(private_key: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_bytes(private_key.into())
            .map_err(|e| anyhow!("Invalid private key: {}", e))?;
        let address = derive_address(signing_key.verifying_key())?;
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Create a signer from a hex-encoded private key, with or without the
    /// `0x` prefix.
    pub fn from_hex(private_key_hex: &str) -> Result<Self> {
        let hex_str = private_key_hex
            .strip_prefix("0x")
            .unwrap_or(private_key_hex);

        let bytes = hex::decode(hex_str)
            .map_err(|e| anyhow!("Invalid private key hex: {}", e))?;

        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow!("Invalid private key: expected 32 bytes"))?;

        Self::from_private_key(&key)
    }

    /// Generate a signer with a fresh random key.
    pub fn random() -> Result<Self> {
        let signing_key = SigningKey::random(&mut OsRng);
        let address = derive_address(signing_key.verifying_key())?;
        Ok(Self {
            signing_key,
            address,
        })
    }
}

#[async_trait]
impl WalletSigner for LocalKeySigner {
    fn address(&self) -> Principal {
        self.address.clone()
    }

    async fn sign_personal_message(&self, message: &[u8]) -> Result<Vec<u8>, ConsentDenied> {
        // 1. Hash with the personal-message prefix
        let digest = personal_message_digest(message);

        // 2. Sign the digest using ECDSA
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| ConsentDenied::new(format!("signing failed: {}", e)))?;

        // 3. Format as 65-byte signature (r + s + v), v = 27 or 28
        let mut sig_bytes = vec![0u8; 65];
        sig_bytes[..64].copy_from_slice(&signature.to_bytes());
        sig_bytes[64] = recovery_id.to_byte() + 27;

        Ok(sig_bytes)
    }
}

/// Hash a message with the Ethereum personal-message prefix.
///
/// The prefix makes the digest domain-separated from transaction hashes, so a
/// consent signature can never double as a spendable transaction.
pub fn personal_message_digest(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());

    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    hasher.finalize(&mut hash);
    hash
}

/// Recover the signer's address from a personal-message signature.
///
/// # Arguments
///
/// * `signature` - 65-byte compact signature (r + s + v)
/// * `message` - The original message bytes (unprefixed, unhashed)
///
/// # Returns
///
/// The recovered principal address.
///
/// # Errors
///
/// Returns error if:
/// - Signature is not exactly 65 bytes
/// - Recovery ID is invalid
/// - Signature recovery fails (invalid signature)
pub fn recover_signer(signature: &[u8], message: &[u8]) -> Result<Principal> {
    // 1. Validate signature size (65 bytes: 32 + 32 + 1)
    if signature.len() != 65 {
        return Err(anyhow!(
            "Invalid signature size: expected 65 bytes, got {}",
            signature.len()
        ));
    }

    let digest = personal_message_digest(message);

    // 2. Parse signature components
    let signature_bytes = &signature[..64];
    let mut recovery_id = signature[64];

    // Normalize Ethereum-style recovery IDs (27/28) to 0/1
    if recovery_id >= 27 {
        recovery_id -= 27;
    }

    if recovery_id > 3 {
        return Err(anyhow!(
            "Invalid recovery ID: expected 0-3, got {}",
            recovery_id
        ));
    }

    // 3. Recover public key from signature
    let recovery_id = RecoveryId::try_from(recovery_id)
        .map_err(|e| anyhow!("Failed to create recovery ID: {}", e))?;

    let signature = Signature::try_from(signature_bytes)
        .map_err(|e| anyhow!("Failed to parse signature: {}", e))?;

    let verifying_key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| anyhow!("Failed to recover public key: {}", e))?;

    // 4. Derive the address from the recovered public key
    derive_address(&verifying_key)
}

/// Derive the chain address for a public key.
///
/// Ethereum standard: keccak256 of the uncompressed public key (without the
/// 0x04 prefix byte), keeping the last 20 bytes.
fn derive_address(verifying_key: &VerifyingKey) -> Result<Principal> {
    let public_key = verifying_key.to_encoded_point(false);
    let public_key_bytes = public_key.as_bytes();

    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(&public_key_bytes[1..]); // Skip first byte (0x04 prefix)
    hasher.finalize(&mut hash);

    let address = format!("0x{}", hex::encode(&hash[12..]));
    Principal::parse(&address).map_err(|e| anyhow!("Derived address invalid: {}", e))
}
