//! # Value Objects
//!
//! Immutable values the coordinator captures, compares and passes to its
//! collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::CoordinatorError;
use super::invariants::invariant_glucose_range;

/// Network (chain) identifier reported by the wallet provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub u64);

impl NetworkId {
    /// Local development chain (hardhat).
    pub const LOCAL_DEV: NetworkId = NetworkId(31337);
    /// Sepolia testnet.
    pub const SEPOLIA: NetworkId = NetworkId(11_155_111);

    /// Raw chain id.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the active signer.
///
/// Stored lower-cased; comparison is case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerId(String);

impl SignerId {
    /// Normalize a raw address or identity token.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// Normalized identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a raw identity.
    pub fn matches(&self, raw: &str) -> bool {
        self.0.eq_ignore_ascii_case(raw.trim())
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network and signer observed at one instant.
///
/// Created when an operation starts and compared against live state when it
/// completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    network_id: Option<NetworkId>,
    signer_id: Option<SignerId>,
}

impl EnvironmentSnapshot {
    /// Capture the given values.
    pub fn new(network_id: Option<NetworkId>, signer_id: Option<SignerId>) -> Self {
        Self {
            network_id,
            signer_id,
        }
    }

    /// Snapshot with neither a network nor a signer.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Network at capture time.
    pub fn network_id(&self) -> Option<NetworkId> {
        self.network_id
    }

    /// Signer at capture time.
    pub fn signer_id(&self) -> Option<&SignerId> {
        self.signer_id.as_ref()
    }

    /// Both a network and a signer were present.
    pub fn is_connected(&self) -> bool {
        self.network_id.is_some() && self.signer_id.is_some()
    }
}

impl fmt::Display for EnvironmentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.network_id, &self.signer_id) {
            (Some(n), Some(s)) => write!(f, "network={n} signer={s}"),
            (Some(n), None) => write!(f, "network={n} signer=<none>"),
            (None, Some(s)) => write!(f, "network=<none> signer={s}"),
            (None, None) => f.write_str("<disconnected>"),
        }
    }
}

/// Opaque reference to an encrypted value held by the ledger.
///
/// The all-zero handle is the "no result yet" sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Handle([u8; 32]);

impl Handle {
    /// Sentinel meaning "no result yet".
    pub const EMPTY: Handle = Handle([0u8; 32]);

    /// Wrap raw handle bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw handle bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True for the sentinel.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// 0x-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.to_hex())
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Encrypted input produced by the engine, ready to be sent to the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedInput {
    /// Input handle referenced by the ledger call.
    pub handle: Handle,
    /// Proof binding the ciphertext to the signer and network.
    pub input_proof: Vec<u8>,
}

/// A glucose measurement in mg/dL that passed range validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlucoseReading(u16);

impl GlucoseReading {
    /// Validate a raw integer value.
    pub fn new(raw: i64) -> Result<Self, CoordinatorError> {
        if !invariant_glucose_range(raw) {
            return Err(CoordinatorError::validation(raw.to_string()));
        }
        // Range check above keeps this in u16.
        Ok(Self(raw as u16))
    }

    /// Parse user-entered text.
    pub fn parse(input: &str) -> Result<Self, CoordinatorError> {
        let trimmed = input.trim();
        let raw: i64 = trimmed
            .parse()
            .map_err(|_| CoordinatorError::validation(trimmed))?;
        Self::new(raw)
    }

    /// Value in mg/dL.
    pub fn mg_dl(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for GlucoseReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mg/dL", self.0)
    }
}

/// The two independent workflows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Encrypt and submit a glucose value.
    Submit,
    /// Evaluate the risk predicate over the submitted value.
    Check,
}

impl OperationKind {
    /// Both kinds, in table order.
    pub const ALL: [OperationKind; 2] = [OperationKind::Submit, OperationKind::Check];

    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Submit => "submit",
            OperationKind::Check => "check",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
