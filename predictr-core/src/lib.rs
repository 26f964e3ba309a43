//! # Predictr Core
//!
//! Core Rust library for a binary-outcome prediction-market protocol.
//!
//! The protocol is made of three cooperating components over one ledger:
//! - **Conditional Tokens**: collateral is split into YES/NO position tokens,
//!   merged back, and redeemed once the condition's payout is reported
//! - **Optimistic Oracle**: bonded answer proposals, disputes and
//!   stake-weighted voting decide each question
//! - **Settlement Exchange**: signed maker orders are filled, or matched in
//!   pairs that mint or merge positions
//!
//! An **Oracle Adapter** ties a market to its condition and question and
//! reports the oracle's answer as the condition's payout.
//!
//! ## Features
//!
//! - **Deterministic ids**: condition, position and order ids are SHA256
//!   over documented canonical encodings
//! - **Atomic transactions**: every call commits whole or not at all
//! - **Pluggable storage**: components consume narrow store traits
//! - **Structured events**: committed events are logged through `tracing`
//!
//! ## Examples
//!
//! ```rust
//! use predictr_core::{
//!     Answer, MemoryCollateral, MemoryStore, OutcomeIndex, Principal, Protocol, ProtocolConfig,
//!     QuestionId,
//! };
//!
//! let deployer = Principal::standard(26, [0xde; 20]);
//! let alice = Principal::standard(26, [0x01; 20]);
//! let bob = Principal::standard(26, [0x02; 20]);
//!
//! let mut protocol = Protocol::new(
//!     ProtocolConfig::default(),
//!     deployer,
//!     MemoryStore::new(),
//!     MemoryCollateral::new(),
//! )?;
//! protocol.collateral_mut().mint(&alice, 1_000_000)?;
//! protocol.collateral_mut().mint(&bob, 10_000_000)?;
//!
//! // Open a market and buy both sides of it
//! let market_id = QuestionId::new([0x01; 32]);
//! let condition_id = protocol.initialize_market(&alice, &market_id, "Will it rain tomorrow?", 0)?;
//! protocol.split_position(&alice, &condition_id, 500_000)?;
//!
//! // Undisputed proposal settles after the challenge window
//! protocol.propose_answer(&bob, &market_id, Answer::Yes)?;
//! protocol.advance_blocks(144);
//! protocol.resolve(&bob, &market_id)?;
//! protocol.resolve_market(&bob, &market_id)?;
//!
//! let payout = protocol.redeem_positions(&alice, &condition_id, OutcomeIndex::Yes)?;
//! assert_eq!(payout, 500_000);
//! Ok::<(), predictr_core::ProtocolError>(())
//! ```

pub mod adapter;
pub mod collateral;
pub mod config;
pub mod ctf;
pub mod error;
pub mod event;
pub mod exchange;
pub mod ids;
pub mod ledger;
pub mod oracle;
pub mod principal;
pub mod protocol;
pub mod signature;
pub mod store;
pub mod telemetry;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

pub use adapter::OracleAdapter;
pub use collateral::{CollateralToken, MemoryCollateral};
pub use config::ProtocolConfig;
pub use ctf::ConditionalTokens;
pub use error::{ProtocolError, Result};
pub use event::ProtocolEvent;
pub use exchange::{Exchange, Fill, Order, SignedOrder};
pub use ids::{Answer, ConditionId, MarketId, OrderHash, OutcomeIndex, PositionId, QuestionId};
pub use ledger::{Env, Tx};
pub use oracle::OptimisticOracle;
pub use principal::{Network, Principal};
pub use protocol::Protocol;
pub use signature::{sign_hash, Secp256k1Verifier, SignatureVerifier};
pub use store::{
    AdapterStore, Condition, CtfStore, Dispute, ExchangeStore, Market, MemoryStore, OracleStore,
    Proposal, Question, QuestionState, Resolution, Store, Vote, VoteTally,
};
pub use telemetry::LoggingConfig;
pub use utils::*;

/// Default challenge window (144 blocks, about 24h at 10 minutes per block)
pub const DEFAULT_CHALLENGE_WINDOW: u64 = 144;

/// Default voting period (288 blocks, about 48h)
pub const DEFAULT_VOTING_PERIOD: u64 = 288;

/// Default bond locked by proposers and disputers
pub const DEFAULT_PROPOSAL_BOND: u128 = 1_000_000;

/// Default exchange fee (50 bps = 0.5%)
pub const DEFAULT_FEE_BPS: u32 = 50;
