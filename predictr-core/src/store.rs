//! # Ledger storage
//!
//! Each component reads and writes its entities through a narrow store
//! trait, so components can be exercised in isolation and the backing can be
//! swapped. [`MemoryStore`] implements all of them with ordered maps.
//!
//! Stores must be `Clone`: the protocol stages each transaction on a copy and
//! swaps it in only when every step succeeded.

use crate::{
    ids::{Answer, ConditionId, MarketId, OrderHash, PositionId, QuestionId},
    principal::Principal,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A prepared condition in the conditional-token engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub condition_id: ConditionId,
    /// The only principal allowed to report the payout
    pub oracle: Principal,
    pub question_id: QuestionId,
    pub outcome_slot_count: u128,
    pub resolved: bool,
    /// `[0, 0]` until resolution
    pub payout_numerators: [u128; 2],
    /// `0` until resolution, then the sum of the numerators
    pub payout_denominator: u128,
}

/// Lifecycle of an oracle question. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionState {
    /// Question opened; a proposal may or may not have been made yet
    Proposed,
    Disputed,
    Voting,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: QuestionId,
    pub requester: Principal,
    pub question_text: String,
    pub reward: u128,
    pub created_at: u64,
    pub state: QuestionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub question_id: QuestionId,
    pub proposer: Principal,
    pub proposed_answer: Answer,
    pub bond: u128,
    pub proposal_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub question_id: QuestionId,
    pub disputer: Principal,
    pub bond: u128,
    pub dispute_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub question_id: QuestionId,
    pub voter: Principal,
    pub value: Answer,
    pub stake: u128,
    pub cast_at: u64,
}

/// Stake-weighted vote totals. Only ever grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub yes_votes: u128,
    pub no_votes: u128,
    pub voting_ends: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub question_id: QuestionId,
    pub final_answer: Answer,
    pub resolved_at: u64,
    pub disputed: bool,
}

/// Adapter market metadata, 1:1 with a condition/question pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub market_id: MarketId,
    pub condition_id: ConditionId,
    pub question_id: QuestionId,
    pub question_text: String,
    pub creator: Principal,
    pub reward: u128,
    pub created_at: u64,
    pub resolved: bool,
}

/// Storage consumed by the conditional-token engine.
pub trait CtfStore {
    fn condition(&self, condition_id: &ConditionId) -> Option<Condition>;
    fn put_condition(&mut self, condition: Condition);

    fn balance(&self, owner: &Principal, position_id: &PositionId) -> u128;
    fn set_balance(&mut self, owner: &Principal, position_id: &PositionId, amount: u128);

    fn total_supply(&self, position_id: &PositionId) -> u128;
    fn set_total_supply(&mut self, position_id: &PositionId, amount: u128);

    fn collateral_locked(&self, condition_id: &ConditionId) -> u128;
    fn set_collateral_locked(&mut self, condition_id: &ConditionId, amount: u128);

    fn is_approved(&self, owner: &Principal, operator: &Principal) -> bool;
    fn set_approved(&mut self, owner: &Principal, operator: &Principal, approved: bool);

    fn is_trusted(&self, caller: &Principal) -> bool;
    fn set_trusted(&mut self, caller: &Principal, trusted: bool);
}

/// Storage consumed by the optimistic oracle.
pub trait OracleStore {
    fn question(&self, question_id: &QuestionId) -> Option<Question>;
    fn put_question(&mut self, question: Question);

    fn proposal(&self, question_id: &QuestionId) -> Option<Proposal>;
    fn put_proposal(&mut self, proposal: Proposal);

    fn dispute(&self, question_id: &QuestionId) -> Option<Dispute>;
    fn put_dispute(&mut self, dispute: Dispute);

    fn tally(&self, question_id: &QuestionId) -> Option<VoteTally>;
    fn put_tally(&mut self, question_id: &QuestionId, tally: VoteTally);

    fn vote(&self, question_id: &QuestionId, voter: &Principal) -> Option<Vote>;
    fn put_vote(&mut self, vote: Vote);

    fn resolution(&self, question_id: &QuestionId) -> Option<Resolution>;
    fn put_resolution(&mut self, resolution: Resolution);

    fn stake_withdrawn(&self, question_id: &QuestionId, voter: &Principal) -> bool;
    fn mark_stake_withdrawn(&mut self, question_id: &QuestionId, voter: &Principal);
}

/// Storage consumed by the oracle adapter.
pub trait AdapterStore {
    fn market(&self, market_id: &MarketId) -> Option<Market>;
    fn put_market(&mut self, market: Market);
    fn market_count(&self) -> u64;
}

/// Storage consumed by the settlement exchange.
pub trait ExchangeStore {
    fn filled(&self, order_hash: &OrderHash) -> u128;
    fn set_filled(&mut self, order_hash: &OrderHash, amount: u128);

    fn is_cancelled(&self, order_hash: &OrderHash) -> bool;
    fn set_cancelled(&mut self, order_hash: &OrderHash);

    fn escrow(&self, owner: &Principal) -> u128;
    fn set_escrow(&mut self, owner: &Principal, amount: u128);

    fn is_paused(&self) -> bool;
    fn set_paused(&mut self, paused: bool);

    fn fee_receiver(&self) -> Option<Principal>;
    fn set_fee_receiver(&mut self, receiver: Principal);
}

/// Full ledger storage.
pub trait Store: CtfStore + OracleStore + AdapterStore + ExchangeStore + Clone {}

impl<T> Store for T where T: CtfStore + OracleStore + AdapterStore + ExchangeStore + Clone {}

/// In-memory ledger storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    conditions: BTreeMap<ConditionId, Condition>,
    balances: BTreeMap<(Principal, PositionId), u128>,
    supplies: BTreeMap<PositionId, u128>,
    locked: BTreeMap<ConditionId, u128>,
    approvals: BTreeSet<(Principal, Principal)>,
    trusted: BTreeSet<Principal>,

    questions: BTreeMap<QuestionId, Question>,
    proposals: BTreeMap<QuestionId, Proposal>,
    disputes: BTreeMap<QuestionId, Dispute>,
    tallies: BTreeMap<QuestionId, VoteTally>,
    votes: BTreeMap<(QuestionId, Principal), Vote>,
    resolutions: BTreeMap<QuestionId, Resolution>,
    withdrawn_stakes: BTreeSet<(QuestionId, Principal)>,

    markets: BTreeMap<MarketId, Market>,

    filled: BTreeMap<OrderHash, u128>,
    cancelled: BTreeSet<OrderHash>,
    escrow: BTreeMap<Principal, u128>,
    paused: bool,
    fee_receiver: Option<Principal>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CtfStore for MemoryStore {
    fn condition(&self, condition_id: &ConditionId) -> Option<Condition> {
        self.conditions.get(condition_id).cloned()
    }

    fn put_condition(&mut self, condition: Condition) {
        self.conditions.insert(condition.condition_id, condition);
    }

    fn balance(&self, owner: &Principal, position_id: &PositionId) -> u128 {
        self.balances
            .get(&(owner.clone(), *position_id))
            .copied()
            .unwrap_or_default()
    }

    fn set_balance(&mut self, owner: &Principal, position_id: &PositionId, amount: u128) {
        let key = (owner.clone(), *position_id);
        if amount == 0 {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, amount);
        }
    }

    fn total_supply(&self, position_id: &PositionId) -> u128 {
        self.supplies.get(position_id).copied().unwrap_or_default()
    }

    fn set_total_supply(&mut self, position_id: &PositionId, amount: u128) {
        self.supplies.insert(*position_id, amount);
    }

    fn collateral_locked(&self, condition_id: &ConditionId) -> u128 {
        self.locked.get(condition_id).copied().unwrap_or_default()
    }

    fn set_collateral_locked(&mut self, condition_id: &ConditionId, amount: u128) {
        self.locked.insert(*condition_id, amount);
    }

    fn is_approved(&self, owner: &Principal, operator: &Principal) -> bool {
        self.approvals.contains(&(owner.clone(), operator.clone()))
    }

    fn set_approved(&mut self, owner: &Principal, operator: &Principal, approved: bool) {
        let key = (owner.clone(), operator.clone());
        if approved {
            self.approvals.insert(key);
        } else {
            self.approvals.remove(&key);
        }
    }

    fn is_trusted(&self, caller: &Principal) -> bool {
        self.trusted.contains(caller)
    }

    fn set_trusted(&mut self, caller: &Principal, trusted: bool) {
        if trusted {
            self.trusted.insert(caller.clone());
        } else {
            self.trusted.remove(caller);
        }
    }
}

impl OracleStore for MemoryStore {
    fn question(&self, question_id: &QuestionId) -> Option<Question> {
        self.questions.get(question_id).cloned()
    }

    fn put_question(&mut self, question: Question) {
        self.questions.insert(question.question_id, question);
    }

    fn proposal(&self, question_id: &QuestionId) -> Option<Proposal> {
        self.proposals.get(question_id).cloned()
    }

    fn put_proposal(&mut self, proposal: Proposal) {
        self.proposals.insert(proposal.question_id, proposal);
    }

    fn dispute(&self, question_id: &QuestionId) -> Option<Dispute> {
        self.disputes.get(question_id).cloned()
    }

    fn put_dispute(&mut self, dispute: Dispute) {
        self.disputes.insert(dispute.question_id, dispute);
    }

    fn tally(&self, question_id: &QuestionId) -> Option<VoteTally> {
        self.tallies.get(question_id).cloned()
    }

    fn put_tally(&mut self, question_id: &QuestionId, tally: VoteTally) {
        self.tallies.insert(*question_id, tally);
    }

    fn vote(&self, question_id: &QuestionId, voter: &Principal) -> Option<Vote> {
        self.votes.get(&(*question_id, voter.clone())).cloned()
    }

    fn put_vote(&mut self, vote: Vote) {
        self.votes.insert((vote.question_id, vote.voter.clone()), vote);
    }

    fn resolution(&self, question_id: &QuestionId) -> Option<Resolution> {
        self.resolutions.get(question_id).cloned()
    }

    fn put_resolution(&mut self, resolution: Resolution) {
        self.resolutions.insert(resolution.question_id, resolution);
    }

    fn stake_withdrawn(&self, question_id: &QuestionId, voter: &Principal) -> bool {
        self.withdrawn_stakes.contains(&(*question_id, voter.clone()))
    }

    fn mark_stake_withdrawn(&mut self, question_id: &QuestionId, voter: &Principal) {
        self.withdrawn_stakes.insert((*question_id, voter.clone()));
    }
}

impl AdapterStore for MemoryStore {
    fn market(&self, market_id: &MarketId) -> Option<Market> {
        self.markets.get(market_id).cloned()
    }

    fn put_market(&mut self, market: Market) {
        self.markets.insert(market.market_id, market);
    }

    fn market_count(&self) -> u64 {
        self.markets.len() as u64
    }
}

impl ExchangeStore for MemoryStore {
    fn filled(&self, order_hash: &OrderHash) -> u128 {
        self.filled.get(order_hash).copied().unwrap_or_default()
    }

    fn set_filled(&mut self, order_hash: &OrderHash, amount: u128) {
        self.filled.insert(*order_hash, amount);
    }

    fn is_cancelled(&self, order_hash: &OrderHash) -> bool {
        self.cancelled.contains(order_hash)
    }

    fn set_cancelled(&mut self, order_hash: &OrderHash) {
        self.cancelled.insert(*order_hash);
    }

    fn escrow(&self, owner: &Principal) -> u128 {
        self.escrow.get(owner).copied().unwrap_or_default()
    }

    fn set_escrow(&mut self, owner: &Principal, amount: u128) {
        if amount == 0 {
            self.escrow.remove(owner);
        } else {
            self.escrow.insert(owner.clone(), amount);
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn fee_receiver(&self) -> Option<Principal> {
        self.fee_receiver.clone()
    }

    fn set_fee_receiver(&mut self, receiver: Principal) {
        self.fee_receiver = Some(receiver);
    }
}
