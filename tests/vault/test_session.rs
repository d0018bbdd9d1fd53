//! Session Lifecycle Tests
//!
//! Sessions are minted through the wallet consent exchange, live for a fixed
//! ttl, and are scoped to one program. These tests exercise the lifecycle
//! end to end against an in-memory vault.

use chrono::{Duration, Utc};

use fabstir_context_vault::{
    ConsentDenied, ContextVault, KeyServerEntry, LocalKeySigner, Principal, SessionManager,
    VaultConfig, VaultError, WalletSigner, WalrusConfig,
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
        session_ttl_min: 30,
        walrus: WalrusConfig::default(),
    }
}

/// Wallet that declines every signing request.
struct RefusingSigner {
    address: Principal,
}

#[async_trait::async_trait]
impl WalletSigner for RefusingSigner {
    fn address(&self) -> Principal {
        self.address.clone()
    }

    async fn sign_personal_message(&self, _message: &[u8]) -> Result<Vec<u8>, ConsentDenied> {
        Err(ConsentDenied::new("user rejected the request"))
    }
}

#[tokio::test]
async fn test_session_ttl_defaults_from_config() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let signer = LocalKeySigner::random().unwrap();

    let session = vault.create_session(&signer, None).await.unwrap();
    assert_eq!(session.ttl_min, 30);

    let short = vault.create_session(&signer, Some(5)).await.unwrap();
    assert_eq!(short.ttl_min, 5);
    assert_eq!(short.expires_at(), short.created_at + Duration::minutes(5));
}

#[tokio::test]
async fn test_expired_session_cannot_open() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let owner = LocalKeySigner::random().unwrap();

    let sealed = vault
        .seal_text(owner.address().as_str(), "time-locked")
        .await
        .unwrap();

    // Build a validly signed session whose one-minute ttl ran out an hour ago
    let manager = SessionManager::new(PROGRAM);
    let mut unsigned = manager.begin_session(&owner.address(), Some(1));
    unsigned.created_at = Utc::now() - Duration::minutes(61);
    let signature = owner
        .sign_personal_message(unsigned.consent_message().as_bytes())
        .await
        .unwrap();
    let expired = manager.complete_session(unsigned, signature).unwrap();
    assert!(expired.is_expired());

    let err = vault.open_text(&sealed.blob_id, &expired).await.unwrap_err();
    assert!(matches!(err, VaultError::Decryption(_)));
    assert_eq!(err.to_string(), "could not unlock");
}

#[tokio::test]
async fn test_wallet_refusal_surfaces_as_consent_error() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let refusing = RefusingSigner {
        address: Principal::parse("0xabc123").unwrap(),
    };

    let err = vault.create_session(&refusing, None).await.unwrap_err();
    assert!(matches!(err, VaultError::Consent(_)));
    assert!(err.to_string().contains("user rejected the request"));
}

#[tokio::test]
async fn test_one_session_opens_many_contexts() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let owner = LocalKeySigner::random().unwrap();

    let first = vault
        .seal_text(owner.address().as_str(), "first context")
        .await
        .unwrap();
    let second = vault
        .seal_text(owner.address().as_str(), "second context")
        .await
        .unwrap();

    // A single wallet approval covers every open within the ttl
    let session = vault.create_session(&owner, None).await.unwrap();
    assert_eq!(
        vault.open_text(&first.blob_id, &session).await.unwrap(),
        "first context"
    );
    assert_eq!(
        vault.open_text(&second.blob_id, &session).await.unwrap(),
        "second context"
    );
    assert_eq!(
        vault.open_text(&first.blob_id, &session).await.unwrap(),
        "first context"
    );
}

#[tokio::test]
async fn test_session_is_scoped_to_program() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let owner = LocalKeySigner::random().unwrap();

    let sealed = vault
        .seal_text(owner.address().as_str(), "scoped")
        .await
        .unwrap();

    // Valid consent, wrong program
    let foreign_manager = SessionManager::new("0xotherprogram");
    let foreign_session = foreign_manager
        .create_session(&owner, Some(30))
        .await
        .unwrap();

    let err = vault
        .open_text(&sealed.blob_id, &foreign_session)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "could not unlock");
}

#[tokio::test]
async fn test_session_minted_by_vault_matches_signer() {
    let vault = ContextVault::in_memory(test_config()).unwrap();
    let signer = LocalKeySigner::random().unwrap();

    let session = vault.create_session(&signer, None).await.unwrap();
    assert_eq!(session.address, signer.address());
    assert_eq!(session.program_id, PROGRAM);
    assert_eq!(session.signature.len(), 65);
    assert!(!session.is_expired());
}
