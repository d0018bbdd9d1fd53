//! Sealed Payload Envelope
//!
//! The `EncryptedObject` is the self-describing envelope produced by the
//! encryption gateway. It carries everything needed for a later decryption
//! attempt (policy id, program id, threshold, nonce, ciphertext) and nothing
//! secret. Serialization is canonical JSON with camelCase keys and hex-encoded
//! byte fields, so the same object always produces the same bytes.

use serde::{Deserialize, Serialize};

use crate::crypto::policy::PolicyId;

/// Envelope format version. Bumped on any wire-incompatible change.
pub const ENVELOPE_VERSION: u8 = 1;

/// Self-describing encrypted payload.
///
/// Safe to persist in a public blob store: an attacker holding the object
/// learns the policy id and program id, never the plaintext or key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedObject {
    /// Envelope format version
    pub version: u8,
    /// Deployed access-control program the policy lives under
    pub program_id: String,
    /// Policy gating decryption of this object
    pub policy_id: PolicyId,
    /// Key-server shares required to decrypt
    pub threshold: u8,
    /// AEAD nonce, hex-encoded on the wire
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext with authentication tag, hex-encoded on the wire
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedObject {
    /// Serialize to canonical JSON bytes for storage or transport.
    ///
    /// Field order is fixed by the struct definition, so equal objects
    /// always serialize to equal bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from canonical JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying JSON error if the bytes are not a well-formed
    /// envelope. Callers in the decryption path collapse this into the
    /// uniform decryption failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Hex encoding for byte fields on the JSON wire.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
