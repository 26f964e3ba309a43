//! Structured events for off-chain indexers.
//!
//! Events are observational only. They are buffered per transaction and
//! published when the transaction commits.

use crate::{
    ids::{Answer, ConditionId, MarketId, OrderHash, OutcomeIndex, PositionId, QuestionId},
    principal::Principal,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ProtocolEvent {
    ConditionPrepared {
        condition_id: ConditionId,
        oracle: Principal,
        question_id: QuestionId,
        outcome_slot_count: u128,
    },
    PositionSplit {
        stakeholder: Principal,
        condition_id: ConditionId,
        amount: u128,
    },
    PositionsMerged {
        stakeholder: Principal,
        condition_id: ConditionId,
        amount: u128,
        recipient: Principal,
    },
    TransferSingle {
        operator: Principal,
        from: Principal,
        to: Principal,
        position_id: PositionId,
        amount: u128,
    },
    ApprovalForAll {
        owner: Principal,
        operator: Principal,
        approved: bool,
    },
    TrustedCallerSet {
        caller: Principal,
        trusted: bool,
    },
    PayoutReported {
        condition_id: ConditionId,
        oracle: Principal,
        payout_numerators: [u128; 2],
    },
    PositionRedeemed {
        redeemer: Principal,
        condition_id: ConditionId,
        outcome_index: OutcomeIndex,
        burned: u128,
        payout: u128,
    },
    QuestionInitialized {
        question_id: QuestionId,
        requester: Principal,
        reward: u128,
    },
    AnswerProposed {
        question_id: QuestionId,
        proposer: Principal,
        answer: Answer,
        bond: u128,
    },
    ProposalDisputed {
        question_id: QuestionId,
        disputer: Principal,
        bond: u128,
        voting_ends: u64,
    },
    VoteCast {
        question_id: QuestionId,
        voter: Principal,
        value: Answer,
        stake: u128,
    },
    QuestionResolved {
        question_id: QuestionId,
        final_answer: Answer,
        disputed: bool,
    },
    StakeWithdrawn {
        question_id: QuestionId,
        voter: Principal,
        stake: u128,
    },
    MarketInitialized {
        market_id: MarketId,
        condition_id: ConditionId,
        creator: Principal,
        reward: u128,
    },
    MarketResolved {
        market_id: MarketId,
        condition_id: ConditionId,
        payout_numerators: [u128; 2],
    },
    OrderFilled {
        order_hash: OrderHash,
        maker: Principal,
        taker: Principal,
        fill_amount: u128,
        taker_paid: u128,
        fee: u128,
    },
    OrdersMatchedMint {
        condition_id: ConditionId,
        buyer_yes: Principal,
        buyer_no: Principal,
        fill_amount: u128,
        fee: u128,
        refund: u128,
    },
    OrdersMatchedMerge {
        condition_id: ConditionId,
        seller_yes: Principal,
        seller_no: Principal,
        fill_amount: u128,
        fee: u128,
    },
    OrderCancelled {
        order_hash: OrderHash,
        maker: Principal,
    },
    CollateralDeposited {
        owner: Principal,
        amount: u128,
    },
    CollateralWithdrawn {
        owner: Principal,
        amount: u128,
    },
    PausedSet {
        paused: bool,
    },
    FeeReceiverSet {
        receiver: Principal,
    },
}

impl ProtocolEvent {
    /// Type tag matching the serialized `event` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConditionPrepared { .. } => "condition-prepared",
            Self::PositionSplit { .. } => "position-split",
            Self::PositionsMerged { .. } => "positions-merged",
            Self::TransferSingle { .. } => "transfer-single",
            Self::ApprovalForAll { .. } => "approval-for-all",
            Self::TrustedCallerSet { .. } => "trusted-caller-set",
            Self::PayoutReported { .. } => "payout-reported",
            Self::PositionRedeemed { .. } => "position-redeemed",
            Self::QuestionInitialized { .. } => "question-initialized",
            Self::AnswerProposed { .. } => "answer-proposed",
            Self::ProposalDisputed { .. } => "proposal-disputed",
            Self::VoteCast { .. } => "vote-cast",
            Self::QuestionResolved { .. } => "question-resolved",
            Self::StakeWithdrawn { .. } => "stake-withdrawn",
            Self::MarketInitialized { .. } => "market-initialized",
            Self::MarketResolved { .. } => "market-resolved",
            Self::OrderFilled { .. } => "order-filled",
            Self::OrdersMatchedMint { .. } => "orders-matched-mint",
            Self::OrdersMatchedMerge { .. } => "orders-matched-merge",
            Self::OrderCancelled { .. } => "order-cancelled",
            Self::CollateralDeposited { .. } => "collateral-deposited",
            Self::CollateralWithdrawn { .. } => "collateral-withdrawn",
            Self::PausedSet { .. } => "paused-set",
            Self::FeeReceiverSet { .. } => "fee-receiver-set",
        }
    }

    /// JSON rendering for log sinks.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"event\":\"{}\"}}", self.kind()))
    }
}
