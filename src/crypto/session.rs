//! Session Keys with Wallet Consent
//!
//! A session key is a time-limited grant that lets its holder decrypt on
//! behalf of a principal without signing every single request. Creating one
//! is a two-phase exchange with the wallet:
//!
//! 1. [`SessionManager::begin_session`] fixes the session parameters and
//!    produces the exact consent message the wallet must sign.
//! 2. [`SessionManager::complete_session`] attaches the wallet's signature
//!    after verifying it actually covers those parameters.
//!
//! The signature is the session's only proof of authority. Key servers
//! re-derive the consent message from the session fields and recover the
//! signer, so no field can be altered after signing without invalidating
//! the grant.
//!
//! Session keys live in memory only. They are never serialized to disk and
//! there is no global registry; scoping a session is the caller's job.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::crypto::error::ConsentDenied;
use crate::crypto::policy::Principal;
use crate::crypto::signer::{recover_signer, WalletSigner};

/// Default session lifetime in minutes.
pub const DEFAULT_TTL_MIN: u32 = 60;

/// Session parameters awaiting wallet consent.
///
/// Produced by [`SessionManager::begin_session`]. Holds everything the final
/// session will contain except the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedSessionKey {
    /// Principal the session will act for
    pub address: Principal,
    /// Access-control program the session is scoped to
    pub program_id: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Lifetime in minutes from `created_at`
    pub ttl_min: u32,
}

impl UnsignedSessionKey {
    /// The exact text the wallet must sign to approve this session.
    ///
    /// Rendered from the session fields alone, with the creation time as unix
    /// seconds, so signer and verifier always reproduce identical bytes.
    pub fn consent_message(&self) -> String {
        consent_message(
            &self.program_id,
            &self.address,
            self.created_at,
            self.ttl_min,
        )
    }
}

/// A wallet-approved decryption grant.
///
/// Carries the consent signature over its own parameters. Deliberately not
/// serializable: a session key is an in-memory credential, not data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    /// Principal the session acts for
    pub address: Principal,
    /// Access-control program the session is scoped to
    pub program_id: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Lifetime in minutes from `created_at`
    pub ttl_min: u32,
    /// 65-byte wallet signature over the consent message
    pub signature: Vec<u8>,
}

impl SessionKey {
    /// When this session stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::minutes(i64::from(self.ttl_min))
    }

    /// Whether the session has outlived its ttl.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }

    /// The consent text this session's signature must cover.
    pub fn consent_message(&self) -> String {
        consent_message(&self.program_id, &self.address, self.created_at, self.ttl_min)
    }
}

/// Render the canonical consent message for a set of session parameters.
fn consent_message(
    program_id: &str,
    address: &Principal,
    created_at: DateTime<Utc>,
    ttl_min: u32,
) -> String {
    format!(
        "Requesting access to keys of program {} for {} mins from {}, address {}",
        program_id,
        ttl_min,
        created_at.timestamp(),
        address
    )
}

/// Creates session keys through the two-phase consent exchange.
///
/// Holds no mutable state; each call produces a fresh, self-contained
/// session. One manager per access-control program.
#[derive(Debug, Clone)]
pub struct SessionManager {
    program_id: String,
}

impl SessionManager {
    pub fn new(program_id: impl Into<String>) -> Self {
        Self {
            program_id: program_id.into(),
        }
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    /// Start a session for `owner`, fixing its parameters.
    ///
    /// # Arguments
    ///
    /// * `owner` - Principal the session will act for
    /// * `ttl_min` - Lifetime in minutes, or `None` for the 60-minute default
    pub fn begin_session(&self, owner: &Principal, ttl_min: Option<u32>) -> UnsignedSessionKey {
        UnsignedSessionKey {
            address: owner.clone(),
            program_id: self.program_id.clone(),
            created_at: Utc::now(),
            ttl_min: ttl_min.unwrap_or(DEFAULT_TTL_MIN),
        }
    }

    /// Attach a wallet signature, producing a usable session key.
    ///
    /// # Errors
    ///
    /// Returns [`ConsentDenied`] if:
    /// - The signature is not exactly 65 bytes
    /// - The signature does not recover to the session's address
    pub fn complete_session(
        &self,
        unsigned: UnsignedSessionKey,
        signature: Vec<u8>,
    ) -> Result<SessionKey, ConsentDenied> {
        if signature.len() != 65 {
            return Err(ConsentDenied::new(format!(
                "signature must be 65 bytes, got {}",
                signature.len()
            )));
        }

        let message = unsigned.consent_message();
        let signer = recover_signer(&signature, message.as_bytes())
            .map_err(|e| ConsentDenied::new(format!("signature recovery failed: {}", e)))?;

        if signer != unsigned.address {
            return Err(ConsentDenied::new(format!(
                "signature from {} does not match session address {}",
                signer, unsigned.address
            )));
        }

        debug!(
            "Session approved for {} ({} min, program {})",
            unsigned.address, unsigned.ttl_min, unsigned.program_id
        );

        Ok(SessionKey {
            address: unsigned.address,
            program_id: unsigned.program_id,
            created_at: unsigned.created_at,
            ttl_min: unsigned.ttl_min,
            signature,
        })
    }

    /// Run the full consent exchange against a wallet signer.
    ///
    /// Convenience over [`begin_session`](Self::begin_session) followed by
    /// [`complete_session`](Self::complete_session).
    ///
    /// # Errors
    ///
    /// Returns [`ConsentDenied`] if the wallet declines to sign or the
    /// returned signature fails validation.
    pub async fn create_session(
        &self,
        signer: &dyn WalletSigner,
        ttl_min: Option<u32>,
    ) -> Result<SessionKey, ConsentDenied> {
        let unsigned = self.begin_session(&signer.address(), ttl_min);
        let message = unsigned.consent_message();
        let signature = signer.sign_personal_message(message.as_bytes()).await?;
        self.complete_session(unsigned, signature)
    }
}
