//! Error types for predictr-core

use thiserror::Error;

/// Result type alias for predictr operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Error kinds surfaced by every public protocol operation.
///
/// A failed call never leaves partial effects behind: the enclosing
/// transaction is dropped and no events are published.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Caller lacks the authority required by the operation
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Malformed identifier, out-of-range enum value or zero amount
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Duplicate condition, question, proposal or market
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Missing condition, question, market or order record
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already resolved")]
    AlreadyResolved,

    #[error("Already disputed")]
    AlreadyDisputed,

    #[error("Already voted")]
    AlreadyVoted,

    #[error("Order already cancelled")]
    AlreadyCancelled,

    /// Resolution has not happened yet
    #[error("Not resolved: {0}")]
    NotResolved(String),

    /// A challenge or voting window has already closed
    #[error("Window closed: {0}")]
    WindowClosed(String),

    /// A challenge or voting window is still open
    #[error("Window still open: {0}")]
    WindowOpen(String),

    /// Position-token balance too low
    #[error("Insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    /// Collateral (wallet or escrow) too low
    #[error("Insufficient collateral: needed {needed}, available {available}")]
    InsufficientCollateral { needed: u128, available: u128 },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Order expired at block {0}")]
    OrderExpired(u64),

    /// Fill would exceed the order's maker amount
    #[error("Order filled: requested {requested}, remaining {remaining}")]
    OrderFilled { requested: u128, remaining: u128 },

    #[error("Exchange is paused")]
    Paused,

    /// Upstream collateral token rejected a transfer
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Adapter and conditional-token engine disagree on a condition id
    #[error("Condition id mismatch: expected {expected}, got {actual}")]
    ConditionIdMismatch { expected: String, actual: String },

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// Configuration load or validation errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProtocolError {
    /// Short stable tag for logs and off-chain diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAuthorized(_) => "not-authorized",
            Self::InvalidInput(_) => "invalid-input",
            Self::AlreadyExists(_) => "already-exists",
            Self::NotFound(_) => "not-found",
            Self::AlreadyResolved => "already-resolved",
            Self::AlreadyDisputed => "already-disputed",
            Self::AlreadyVoted => "already-voted",
            Self::AlreadyCancelled => "already-cancelled",
            Self::NotResolved(_) => "not-resolved",
            Self::WindowClosed(_) => "window-closed",
            Self::WindowOpen(_) => "window-open",
            Self::InsufficientBalance { .. } => "insufficient-balance",
            Self::InsufficientCollateral { .. } => "insufficient-collateral",
            Self::InvalidSignature => "invalid-signature",
            Self::OrderExpired(_) => "order-expired",
            Self::OrderFilled { .. } => "order-filled",
            Self::Paused => "paused",
            Self::TransferFailed(_) => "transfer-failed",
            Self::ConditionIdMismatch { .. } => "condition-id-mismatch",
            Self::Overflow(_) => "overflow",
            Self::Config(_) => "config",
        }
    }
}

impl From<hex::FromHexError> for ProtocolError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidInput(format!("hex decoding: {err}"))
    }
}

impl From<toml::de::Error> for ProtocolError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
