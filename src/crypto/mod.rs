// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Policy-Gated Encryption
//!
//! Cryptographic core of the vault: sealing plaintext under an address-derived
//! policy, wallet-consented session keys, and the uniform decryption failure.
//!
//! - **Policy**: validated principal addresses and the policies derived from them
//! - **Object**: the self-describing encrypted envelope
//! - **Signer**: wallet signing capability and signature recovery
//! - **Session**: time-limited decryption grants approved by wallet signature
//! - **Encrypt / Decrypt**: the two gateways applications actually call
//!
//! ## Security Considerations
//!
//! - Session keys live in memory only, never persisted
//! - A session is inert until its consent message is wallet-signed
//! - Decryption failures are indistinguishable from each other by design of
//!   the error surface; causes go to debug logs only

pub mod decrypt;
pub mod encrypt;
pub mod error;
pub mod object;
pub mod policy;
pub mod session;
pub mod signer;

pub use decrypt::{DecryptionGateway, EmptyIntentProof, ProofBuilder};
pub use encrypt::EncryptionGateway;
pub use error::{ConsentDenied, DecryptionError, EncryptionError};
pub use object::{EncryptedObject, ENVELOPE_VERSION};
pub use policy::{InvalidPrincipal, PolicyId, Principal};
pub use session::{SessionKey, SessionManager, UnsignedSessionKey, DEFAULT_TTL_MIN};
pub use signer::{personal_message_digest, recover_signer, LocalKeySigner, WalletSigner};
