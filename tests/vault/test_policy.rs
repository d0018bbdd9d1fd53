// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Policy Enforcement Tests
//!
//! A context sealed for address A must open for A and refuse everyone else,
//! and every refusal must read identically. Some tests build the vault from
//! explicit parts so they can also poke at the raw blob store.

use std::sync::Arc;

use chrono::Utc;

use fabstir_context_vault::{
    BlobStore, ContextVault, DecryptionError, EncryptedObject, KeyServerEntry, LocalKeySigner,
    MockBlobStore, MockThresholdBackend, PolicyId, SessionKey, VaultConfig, VaultError,
    WalletSigner, WalrusConfig,
};

const PROGRAM: &str = "0xtestprogram";

fn test_config() -> VaultConfig {
    VaultConfig {
        program_id: PROGRAM.to_string(),
        threshold: 1,
        key_servers: vec![KeyServerEntry {
            url: "https://unused.example".to_string(),
            weight: 1,
        }],
        session_ttl_min: 60,
        walrus: WalrusConfig::default(),
    }
}

fn vault_with_blob_handle() -> (ContextVault, Arc<MockBlobStore>) {
    let blobs = Arc::new(MockBlobStore::new());
    let vault = ContextVault::new(
        test_config(),
        Arc::new(MockThresholdBackend::new()),
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
    )
    .unwrap();
    (vault, blobs)
}

#[tokio::test]
async fn test_only_designated_address_can_open() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let alice = LocalKeySigner::random().unwrap();
    let bob = LocalKeySigner::random().unwrap();

    let sealed = vault
        .seal_text(alice.address().as_str(), "for alice only")
        .await
        .unwrap();

    let alice_session = vault.create_session(&alice, None).await.unwrap();
    assert_eq!(
        vault
            .open_text(&sealed.blob_id, &alice_session)
            .await
            .unwrap(),
        "for alice only"
    );

    let bob_session = vault.create_session(&bob, None).await.unwrap();
    let err = vault
        .open_text(&sealed.blob_id, &bob_session)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Decryption(_)));
}

#[tokio::test]
async fn test_each_user_opens_own_context() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let alice = LocalKeySigner::random().unwrap();
    let bob = LocalKeySigner::random().unwrap();

    let alice_blob = vault
        .seal_text(alice.address().as_str(), "alice's notes")
        .await
        .unwrap();
    let bob_blob = vault
        .seal_text(bob.address().as_str(), "bob's notes")
        .await
        .unwrap();

    let alice_session = vault.create_session(&alice, None).await.unwrap();
    let bob_session = vault.create_session(&bob, None).await.unwrap();

    assert_eq!(
        vault
            .open_text(&alice_blob.blob_id, &alice_session)
            .await
            .unwrap(),
        "alice's notes"
    );
    assert_eq!(
        vault
            .open_text(&bob_blob.blob_id, &bob_session)
            .await
            .unwrap(),
        "bob's notes"
    );

    // And never each other's
    assert!(vault
        .open_text(&bob_blob.blob_id, &alice_session)
        .await
        .is_err());
    assert!(vault
        .open_text(&alice_blob.blob_id, &bob_session)
        .await
        .is_err());
}

#[tokio::test]
async fn test_sealed_context_reports_recipient_policy() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let user = LocalKeySigner::random().unwrap();

    let sealed = vault
        .seal_text(user.address().as_str(), "data")
        .await
        .unwrap();

    assert_eq!(sealed.policy_id, PolicyId::for_principal(&user.address()));
}

#[tokio::test]
async fn test_recipient_address_case_does_not_matter() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let user = LocalKeySigner::random().unwrap();

    // Seal for the uppercase spelling of the same address
    let shouty = user.address().as_str().to_uppercase();
    let sealed = vault.seal_text(&shouty, "case test").await.unwrap();

    let session = vault.create_session(&user, None).await.unwrap();
    assert_eq!(
        vault.open_text(&sealed.blob_id, &session).await.unwrap(),
        "case test"
    );
}

#[tokio::test]
async fn test_every_refusal_reads_identically() {
    let (vault, blobs) = vault_with_blob_handle();
    let owner = LocalKeySigner::random().unwrap();
    let intruder = LocalKeySigner::random().unwrap();

    let sealed = vault
        .seal_text(owner.address().as_str(), "secret")
        .await
        .unwrap();

    let mut messages = Vec::new();

    // Wrong principal
    let intruder_session = vault.create_session(&intruder, None).await.unwrap();
    messages.push(
        vault
            .open_text(&sealed.blob_id, &intruder_session)
            .await
            .unwrap_err()
            .to_string(),
    );

    // Session that was never signed
    let unsigned = SessionKey {
        address: owner.address(),
        program_id: PROGRAM.to_string(),
        created_at: Utc::now(),
        ttl_min: 60,
        signature: Vec::new(),
    };
    messages.push(
        vault
            .open_text(&sealed.blob_id, &unsigned)
            .await
            .unwrap_err()
            .to_string(),
    );

    // Blob that was never an envelope
    let garbage_id = blobs
        .store(b"not an envelope at all".to_vec())
        .await
        .unwrap();
    let owner_session = vault.create_session(&owner, None).await.unwrap();
    messages.push(
        vault
            .open_text(&garbage_id, &owner_session)
            .await
            .unwrap_err()
            .to_string(),
    );

    for message in &messages {
        assert_eq!(message, DecryptionError::MESSAGE);
        assert_eq!(message, "could not unlock");
    }
}

#[tokio::test]
async fn test_tampered_envelope_is_refused() {
    let (vault, blobs) = vault_with_blob_handle();
    let owner = LocalKeySigner::random().unwrap();

    let sealed = vault
        .seal_text(owner.address().as_str(), "intact")
        .await
        .unwrap();

    // Flip a ciphertext byte inside the stored envelope and store the result
    let envelope = blobs.retrieve(&sealed.blob_id).await.unwrap();
    let mut object = EncryptedObject::from_bytes(&envelope).unwrap();
    object.ciphertext[0] ^= 0x01;
    let tampered_id = blobs.store(object.to_bytes().unwrap()).await.unwrap();

    let session = vault.create_session(&owner, None).await.unwrap();
    let err = vault.open_text(&tampered_id, &session).await.unwrap_err();
    assert_eq!(err.to_string(), "could not unlock");
}

#[tokio::test]
async fn test_corrupted_nonce_is_refused() {
    let (vault, blobs) = vault_with_blob_handle();
    let owner = LocalKeySigner::random().unwrap();

    let sealed = vault
        .seal_text(owner.address().as_str(), "intact")
        .await
        .unwrap();

    // Shorten the nonce inside the stored envelope and store the result;
    // even the owner's valid session must get the uniform refusal
    let envelope = blobs.retrieve(&sealed.blob_id).await.unwrap();
    let mut object = EncryptedObject::from_bytes(&envelope).unwrap();
    object.nonce.pop();
    let corrupted_id = blobs.store(object.to_bytes().unwrap()).await.unwrap();

    let session = vault.create_session(&owner, None).await.unwrap();
    let err = vault.open_text(&corrupted_id, &session).await.unwrap_err();
    assert!(matches!(err, VaultError::Decryption(_)));
    assert_eq!(err.to_string(), "could not unlock");
}
