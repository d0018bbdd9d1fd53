// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Principal Addresses and Access Policies
//!
//! A `Principal` is the chain address permitted to unlock a sealed context.
//! The access policy id handed to the key servers is derived 1:1 from the
//! principal's address (identity mapping). Richer policy logic such as role
//! grants or allowlists plugs in at `PolicyId::for_principal` without
//! touching the gateways.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of hex digits after the `0x` prefix.
///
/// Covers both 20-byte (40 digit) and 32-byte (64 digit) address widths.
const MAX_ADDRESS_DIGITS: usize = 64;

/// Error returned when an address string is not a well-formed principal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid principal address: {reason}")]
pub struct InvalidPrincipal {
    /// Why the address was rejected
    pub reason: String,
}

impl InvalidPrincipal {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A validated, normalized chain address.
///
/// The only way to obtain a `Principal` is through [`Principal::parse`], so a
/// value of this type is always well-formed: `0x`-prefixed, 1-64 hex digits,
/// lowercased. Normalization keeps the policy derivation case-stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Parse and normalize an address string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPrincipal`] if the input is empty, lacks the `0x`
    /// prefix, contains non-hex digits, or exceeds 64 hex digits.
    pub fn parse(address: &str) -> Result<Self, InvalidPrincipal> {
        let trimmed = address.trim();

        if trimmed.is_empty() {
            return Err(InvalidPrincipal::new("address is empty"));
        }

        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| InvalidPrincipal::new("address must start with '0x'"))?;

        if digits.is_empty() {
            return Err(InvalidPrincipal::new("address has no hex digits"));
        }

        if digits.len() > MAX_ADDRESS_DIGITS {
            return Err(InvalidPrincipal::new(format!(
                "address too long: expected at most {} hex digits, got {}",
                MAX_ADDRESS_DIGITS,
                digits.len()
            )));
        }

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidPrincipal::new("address contains non-hex characters"));
        }

        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// The normalized address string (`0x` + lowercase hex).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Principal {
    type Err = InvalidPrincipal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The access-policy identifier the key servers gate decryption on.
///
/// Derived 1:1 from a principal address: same address always yields the same
/// id, distinct addresses yield distinct ids. An [`crate::crypto::EncryptedObject`]
/// references exactly one `PolicyId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(String);

impl PolicyId {
    /// Derive the policy id for a principal (identity mapping).
    pub fn for_principal(principal: &Principal) -> Self {
        Self(principal.as_str().to_string())
    }

    /// Whether the given principal satisfies this policy.
    pub fn is_satisfied_by(&self, principal: &Principal) -> bool {
        self.0 == principal.as_str()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
