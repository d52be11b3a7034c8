use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
    de::Error as _,
};
use starknet_core::types::Felt;
use starknet_crypto::poseidon_hash_many;
use std::{
    fmt,
    str::FromStr,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field element `{input}`: {reason}")]
pub struct ParseFeltError {
    pub input: String,
    pub reason: &'static str,
}

impl ParseFeltError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// Parse a `0x`-prefixed hex string (padded or not, any case) into a field
/// element. Values at or above the field prime are rejected, never reduced.
pub fn parse_felt(raw: &str) -> Result<Felt, ParseFeltError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| ParseFeltError::new(raw, "missing 0x prefix"))?;
    if digits.is_empty() {
        return Err(ParseFeltError::new(raw, "no hex digits"));
    }
    if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return Err(ParseFeltError::new(raw, "not a hex string"));
    }

    let digits = digits.to_ascii_lowercase();
    let felt = Felt::from_hex(&format!("0x{digits}"))
        .map_err(|_| ParseFeltError::new(raw, "out of field range"))?;

    // from_hex lets the prime itself through as zero
    let significant = digits.trim_start_matches('0');
    let expected = if significant.is_empty() { "0" } else { significant };
    if felt_to_hex(&felt)[2..] != *expected {
        return Err(ParseFeltError::new(raw, "out of field range"));
    }
    Ok(felt)
}

/// Shortest `0x` hex rendering; zero renders as `0x0`.
pub fn felt_to_hex(felt: &Felt) -> String {
    let encoded = hex::encode(felt.to_bytes_be());
    let trimmed = encoded.trim_start_matches('0');
    if trimmed.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{trimmed}")
    }
}

/// Address rendered with all 64 hex digits, the form the indexer stores keys in.
pub fn pad_address(felt: &Felt) -> String {
    format!("0x{}", hex::encode(felt.to_bytes_be()))
}

/// Identifier of an entity in the world, the Poseidon hash of its model keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Felt);

impl EntityId {
    /// Id the indexer reports when no record matched.
    pub const ZERO: EntityId = EntityId(Felt::ZERO);

    pub fn new(felt: Felt) -> Self {
        Self(felt)
    }

    pub fn from_keys(keys: &[Felt]) -> Self {
        Self(poseidon_hash_many(keys))
    }

    pub fn felt(&self) -> Felt {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Felt::ZERO
    }
}

impl From<Felt> for EntityId {
    fn from(value: Felt) -> Self {
        Self(value)
    }
}

impl FromStr for EntityId {
    type Err = ParseFeltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_felt(s).map(Self)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&felt_to_hex(&self.0))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", felt_to_hex(&self.0))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&felt_to_hex(&self.0))
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
