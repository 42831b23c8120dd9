//! Token identifier parsing.
//!
//! Identifiers have the form `asset:<chainId>/0x<contractAddress>/<tokenId>`:
//!
//! - `chainId`: decimal, fits in a `u64`
//! - `contractAddress`: 1-40 hex digits after a literal `0x`, case-insensitive
//! - `tokenId`: decimal digits, leading zeros preserved
//!
//! Parsing is pure and total: every input either yields a
//! [`TokenIdentifier`] or [`ProofError::MalformedIdentifier`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{IdentifierSegment, ProofError};

const SCHEME: &str = "asset:";
const HEX_PREFIX: &str = "0x";
const MAX_ADDRESS_DIGITS: usize = 40;

/// Canonical address of one on-chain asset token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenIdentifier {
    chain_id: u64,
    /// Lowercase hex digits, no `0x` prefix.
    contract_address: String,
    local_token_id: String,
}

impl TokenIdentifier {
    /// Parse a raw identifier string.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::MalformedIdentifier`] naming the first segment
    /// that does not match the grammar.
    pub fn parse(raw: &str) -> Result<Self, ProofError> {
        let rest = raw
            .strip_prefix(SCHEME)
            .ok_or_else(|| ProofError::malformed(raw, Some(IdentifierSegment::Scheme)))?;

        let mut parts = rest.split('/');
        let (Some(chain), Some(address), Some(local), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ProofError::malformed(raw, None));
        };

        if !is_decimal(chain) {
            return Err(ProofError::malformed(raw, Some(IdentifierSegment::ChainId)));
        }
        let chain_id = chain
            .parse::<u64>()
            .map_err(|_| ProofError::malformed(raw, Some(IdentifierSegment::ChainId)))?;

        let digits = address
            .strip_prefix(HEX_PREFIX)
            .filter(|d| {
                !d.is_empty()
                    && d.len() <= MAX_ADDRESS_DIGITS
                    && d.bytes().all(|b| b.is_ascii_hexdigit())
            })
            .ok_or_else(|| ProofError::malformed(raw, Some(IdentifierSegment::ContractAddress)))?;

        if !is_decimal(local) {
            return Err(ProofError::malformed(
                raw,
                Some(IdentifierSegment::LocalTokenId),
            ));
        }

        Ok(Self {
            chain_id,
            contract_address: digits.to_ascii_lowercase(),
            local_token_id: local.to_string(),
        })
    }

    /// Chain the token lives on.
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Contract address as `0x`-prefixed lowercase hex.
    #[must_use]
    pub fn contract_address(&self) -> String {
        format!("{HEX_PREFIX}{}", self.contract_address)
    }

    /// Token id within the contract, exactly as written.
    #[must_use]
    pub fn local_token_id(&self) -> &str {
        &self.local_token_id
    }

    /// Canonical string form.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for TokenIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SCHEME}{}/{HEX_PREFIX}{}/{}",
            self.chain_id, self.contract_address, self.local_token_id
        )
    }
}

impl FromStr for TokenIdentifier {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TokenIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
