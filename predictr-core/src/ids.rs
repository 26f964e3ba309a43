//! # Deterministic identifiers
//!
//! Condition, position and order identifiers are pure SHA256 functions over
//! canonical byte encodings. Any independent implementation that follows the
//! layouts below derives byte-identical ids:
//!
//! ```text
//! condition_id = SHA256(principal(oracle) || question_id[32] || u128_be(outcome_slot_count))
//! position_id  = SHA256(condition_id[32] || u128_be(outcome_index))
//! ```
//!
//! Order hashes live in [`crate::exchange::Order::hash`].

use crate::{
    error::Result,
    principal::Principal,
    utils::{decode_hex_32, sha256_concat, u128_be},
    ProtocolError,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Parse from a raw buffer, rejecting anything but 32 bytes.
            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let array: [u8; 32] = bytes.try_into().map_err(|_| {
                    ProtocolError::InvalidInput(format!(
                        "{} must be 32 bytes, got {}",
                        stringify!($name),
                        bytes.len()
                    ))
                })?;
                Ok(Self(array))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }

        impl FromStr for $name {
            type Err = ProtocolError;

            fn from_str(s: &str) -> Result<Self> {
                decode_hex_32(s).map(Self)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

hash_id!(
    /// Oracle question identifier. Adapter markets reuse their market id here.
    QuestionId
);
hash_id!(
    /// Identifier of a prepared condition in the conditional-token engine
    ConditionId
);
hash_id!(
    /// Identifier of one outcome leg of a condition
    PositionId
);
hash_id!(
    /// Hash of an exchange order; keys fill and cancellation state
    OrderHash
);

/// Adapter markets are keyed by the same 32 bytes as their oracle question.
pub type MarketId = QuestionId;

impl PositionId {
    /// Reserved id for the collateral side of mint and merge orders.
    pub const COLLATERAL: PositionId = PositionId([0u8; 32]);

    pub fn is_collateral(&self) -> bool {
        *self == Self::COLLATERAL
    }
}

/// Binary outcome leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum OutcomeIndex {
    /// Index 0, paid by payout vector `[1, 0]`
    Yes = 0,
    /// Index 1, paid by payout vector `[0, 1]`
    No = 1,
}

impl OutcomeIndex {
    pub const ALL: [OutcomeIndex; 2] = [OutcomeIndex::Yes, OutcomeIndex::No];

    pub fn from_u128(value: u128) -> Result<Self> {
        match value {
            0 => Ok(Self::Yes),
            1 => Ok(Self::No),
            _ => Err(ProtocolError::InvalidInput(format!(
                "outcome index must be 0 or 1, got {value}"
            ))),
        }
    }

    pub const fn as_usize(self) -> usize {
        self as usize
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }
}

/// Oracle answer to a binary question.
///
/// `Yes` pays the outcome-0 leg (`[1, 0]`), `No` pays the outcome-1 leg
/// (`[0, 1]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Answer {
    No = 0,
    Yes = 1,
}

impl Answer {
    pub fn from_u128(value: u128) -> Result<Self> {
        match value {
            0 => Ok(Self::No),
            1 => Ok(Self::Yes),
            _ => Err(ProtocolError::InvalidInput(format!(
                "answer must be 0 or 1, got {value}"
            ))),
        }
    }

    pub const fn as_u128(self) -> u128 {
        self as u128
    }

    /// Payout vector reported to the conditional-token engine.
    pub const fn payout_numerators(self) -> [u128; 2] {
        match self {
            Self::Yes => [1, 0],
            Self::No => [0, 1],
        }
    }
}

/// Derive a condition id.
pub fn condition_id(
    oracle: &Principal,
    question_id: &QuestionId,
    outcome_slot_count: u128,
) -> ConditionId {
    ConditionId(sha256_concat(&[
        &oracle.canonical_bytes(),
        question_id.as_bytes(),
        &u128_be(outcome_slot_count),
    ]))
}

/// Derive the position id of one leg of a condition.
pub fn position_id(condition_id: &ConditionId, outcome: OutcomeIndex) -> PositionId {
    PositionId(sha256_concat(&[
        condition_id.as_bytes(),
        &u128_be(outcome as u128),
    ]))
}

/// Both legs of a condition, indexed by outcome.
pub fn position_ids(condition_id: &ConditionId) -> [PositionId; 2] {
    OutcomeIndex::ALL.map(|outcome| position_id(condition_id, outcome))
}
