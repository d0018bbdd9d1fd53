// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod crypto;
pub mod storage;
pub mod threshold;
pub mod vault;

// Re-export main types from the vault facade
pub use vault::{ContextVault, SealedContext, VaultError};

// Re-export types from the underlying modules
pub use config::{KeyServerEntry, VaultConfig};
pub use crypto::{
    ConsentDenied, DecryptionError, DecryptionGateway, EncryptedObject, EncryptionError,
    EncryptionGateway, LocalKeySigner, PolicyId, Principal, SessionKey, SessionManager,
    WalletSigner,
};
pub use storage::{BlobStore, MockBlobStore, StorageError, WalrusClient, WalrusConfig};
pub use threshold::{KeyServerBackend, MockThresholdBackend, ThresholdEncryption};
