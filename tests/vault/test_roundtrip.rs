// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-End Round Trip Tests
//!
//! The canonical pipeline: seal text for a principal, store the envelope as
//! a blob, approve a session, retrieve the blob and unseal it. Everything
//! runs in process against the simulated key-server cluster and the
//! in-memory blob store.

use fabstir_context_vault::crypto::EncryptedObject;
use fabstir_context_vault::{
    ContextVault, KeyServerEntry, LocalKeySigner, VaultConfig, VaultError, WalletSigner,
    WalrusConfig,
};

fn test_config() -> VaultConfig {
    VaultConfig {
        program_id: "0xtestprogram".to_string(),
        threshold: 1,
        key_servers: vec![KeyServerEntry {
            url: "https://unused.example".to_string(),
            weight: 1,
        }],
        session_ttl_min: 60,
        walrus: WalrusConfig::default(),
    }
}

#[tokio::test]
async fn test_hello_world_scenario() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let user = LocalKeySigner::random().unwrap();

    // Seal and store
    let sealed = vault
        .seal_text(user.address().as_str(), "hello world")
        .await
        .unwrap();
    assert!(!sealed.blob_id.is_empty());

    // Later: approve a session and open the stored context
    let session = vault.create_session(&user, None).await.unwrap();
    let text = vault.open_text(&sealed.blob_id, &session).await.unwrap();

    assert_eq!(text, "hello world");
}

#[tokio::test]
async fn test_round_trip_binary_payload() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let user = LocalKeySigner::random().unwrap();

    let payload: Vec<u8> = vec![0x00, 0xff, 0x7f, 0x80, 0x01, 0x00, 0xfe];
    let sealed = vault.seal(&user.address(), &payload).await.unwrap();

    let session = vault.create_session(&user, None).await.unwrap();
    let opened = vault.open(&sealed.blob_id, &session).await.unwrap();
    assert_eq!(opened, payload);
}

#[tokio::test]
async fn test_binary_context_opened_as_text_is_refused() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let user = LocalKeySigner::random().unwrap();

    // 0xff never begins a valid UTF-8 sequence
    let payload: Vec<u8> = vec![0xff, 0xfe, 0x01];
    let sealed = vault.seal(&user.address(), &payload).await.unwrap();

    let session = vault.create_session(&user, None).await.unwrap();
    let err = vault.open_text(&sealed.blob_id, &session).await.unwrap_err();
    assert!(matches!(err, VaultError::Decryption(_)));
    assert_eq!(err.to_string(), "could not unlock");

    // The same blob still opens as raw bytes
    let opened = vault.open(&sealed.blob_id, &session).await.unwrap();
    assert_eq!(opened, payload);
}

#[tokio::test]
async fn test_round_trip_empty_text() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let user = LocalKeySigner::random().unwrap();

    let sealed = vault
        .seal_text(user.address().as_str(), "")
        .await
        .unwrap();

    let session = vault.create_session(&user, None).await.unwrap();
    let text = vault.open_text(&sealed.blob_id, &session).await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn test_round_trip_unicode_text() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let user = LocalKeySigner::random().unwrap();

    let text = "héllo wörld 你好 🔐";
    let sealed = vault
        .seal_text(user.address().as_str(), text)
        .await
        .unwrap();

    let session = vault.create_session(&user, None).await.unwrap();
    let opened = vault.open_text(&sealed.blob_id, &session).await.unwrap();
    assert_eq!(opened, text);
}

#[tokio::test]
async fn test_round_trip_large_payload() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let user = LocalKeySigner::random().unwrap();

    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let sealed = vault.seal(&user.address(), &payload).await.unwrap();

    let session = vault.create_session(&user, None).await.unwrap();
    let opened = vault.open(&sealed.blob_id, &session).await.unwrap();
    assert_eq!(opened, payload);
}

#[tokio::test]
async fn test_two_seals_of_same_text_differ() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let user = LocalKeySigner::random().unwrap();

    // Fresh nonce per seal: identical plaintext never produces an
    // identical envelope, so the blob ids differ as well
    let first = vault
        .seal_text(user.address().as_str(), "same text")
        .await
        .unwrap();
    let second = vault
        .seal_text(user.address().as_str(), "same text")
        .await
        .unwrap();

    assert_ne!(first.blob_id, second.blob_id);

    // Both still open to the same plaintext
    let session = vault.create_session(&user, None).await.unwrap();
    assert_eq!(
        vault.open_text(&first.blob_id, &session).await.unwrap(),
        "same text"
    );
    assert_eq!(
        vault.open_text(&second.blob_id, &session).await.unwrap(),
        "same text"
    );
}

#[tokio::test]
async fn test_envelope_round_trips_through_bytes() {
    let object = EncryptedObject {
        version: 1,
        program_id: "0xtestprogram".to_string(),
        policy_id: fabstir_context_vault::PolicyId::for_principal(
            &fabstir_context_vault::Principal::parse("0xabc123").unwrap(),
        ),
        threshold: 1,
        nonce: vec![9u8; 24],
        ciphertext: vec![1, 2, 3, 4],
    };

    let bytes = object.to_bytes().unwrap();
    let parsed = EncryptedObject::from_bytes(&bytes).unwrap();
    assert_eq!(parsed, object);

    // Equal objects serialize to equal bytes
    assert_eq!(parsed.to_bytes().unwrap(), bytes);
}
