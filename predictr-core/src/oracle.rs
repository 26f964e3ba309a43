//! # Optimistic Oracle
//!
//! Question lifecycle with bonded proposals:
//!
//! ```text
//! Proposed --(challenge window elapses)--------------------------> Resolved
//! Proposed --dispute--> Disputed --> Voting --(voting ends)--> Resolved
//! ```
//!
//! A proposer locks a bond behind an answer. Anyone may lock a matching
//! bond to dispute it while the challenge window is open, which opens a
//! stake-weighted vote. The winning party of a disputed question takes both
//! bonds; the reward escrowed by the requester goes to the winner as well.
//! Voter stakes are returned through [`OptimisticOracle::withdraw_stake`]
//! once the question resolves.

use crate::{
    collateral::{move_collateral, CollateralToken},
    config::ProtocolConfig,
    error::Result,
    event::ProtocolEvent,
    ids::{Answer, QuestionId},
    ledger::{Env, Tx},
    principal::Principal,
    store::{Dispute, OracleStore, Proposal, Question, QuestionState, Resolution, Vote, VoteTally},
    utils::checked_add,
    ProtocolError,
};
use tracing::debug;

/// Contract name of the oracle under its deployer
pub const ORACLE_CONTRACT_NAME: &str = "optimistic-oracle";

/// Maximum question text length in characters
pub const MAX_QUESTION_LEN: usize = 256;

#[derive(Debug, Clone)]
pub struct OptimisticOracle {
    principal: Principal,
    challenge_window: u64,
    voting_period: u64,
    proposal_bond: u128,
}

impl OptimisticOracle {
    /// Deploy the oracle under `deployer` with the windows and bond from `config`.
    pub fn new(deployer: &Principal, config: &ProtocolConfig) -> Result<Self> {
        Ok(Self {
            principal: Principal::contract(deployer, ORACLE_CONTRACT_NAME)?,
            challenge_window: config.challenge_window,
            voting_period: config.voting_period,
            proposal_bond: config.proposal_bond,
        })
    }

    /// Contract principal escrowing rewards, bonds and stakes
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn challenge_window(&self) -> u64 {
        self.challenge_window
    }

    pub fn voting_period(&self) -> u64 {
        self.voting_period
    }

    pub fn proposal_bond(&self) -> u128 {
        self.proposal_bond
    }

    /// Open a question. The reward is escrowed from the transaction origin.
    pub fn initialize_question<S: OracleStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        question_id: &QuestionId,
        question_text: &str,
        reward: u128,
    ) -> Result<()> {
        let length = question_text.chars().count();
        if length == 0 || length > MAX_QUESTION_LEN {
            return Err(ProtocolError::InvalidInput(format!(
                "question text must be 1 to {MAX_QUESTION_LEN} characters, got {length}"
            )));
        }
        if tx.store.question(question_id).is_some() {
            return Err(ProtocolError::AlreadyExists(format!(
                "question {question_id}"
            )));
        }

        move_collateral(
            tx.collateral,
            reward,
            &env.sender,
            &self.principal,
            b"oracle-reward",
        )?;

        tx.store.put_question(Question {
            question_id: *question_id,
            requester: env.caller.clone(),
            question_text: question_text.to_string(),
            reward,
            created_at: env.block_height,
            state: QuestionState::Proposed,
        });
        tx.emit(ProtocolEvent::QuestionInitialized {
            question_id: *question_id,
            requester: env.caller.clone(),
            reward,
        });
        Ok(())
    }

    /// Propose an answer, locking the proposal bond from the caller.
    pub fn propose_answer<S: OracleStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        question_id: &QuestionId,
        answer: Answer,
    ) -> Result<()> {
        let question = require_question(&*tx.store, question_id)?;
        if question.state == QuestionState::Resolved {
            return Err(ProtocolError::AlreadyResolved);
        }
        if tx.store.proposal(question_id).is_some() {
            return Err(ProtocolError::AlreadyExists(format!(
                "proposal for question {question_id}"
            )));
        }

        move_collateral(
            tx.collateral,
            self.proposal_bond,
            &env.caller,
            &self.principal,
            b"oracle-proposal-bond",
        )?;

        tx.store.put_proposal(Proposal {
            question_id: *question_id,
            proposer: env.caller.clone(),
            proposed_answer: answer,
            bond: self.proposal_bond,
            proposal_time: env.block_height,
        });
        tx.emit(ProtocolEvent::AnswerProposed {
            question_id: *question_id,
            proposer: env.caller.clone(),
            answer,
            bond: self.proposal_bond,
        });
        Ok(())
    }

    /// Dispute the standing proposal and open the vote.
    pub fn dispute_proposal<S: OracleStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        question_id: &QuestionId,
    ) -> Result<()> {
        let mut question = require_question(&*tx.store, question_id)?;
        let proposal = require_proposal(&*tx.store, question_id)?;
        if question.state == QuestionState::Resolved {
            return Err(ProtocolError::AlreadyResolved);
        }
        if tx.store.dispute(question_id).is_some() {
            return Err(ProtocolError::AlreadyDisputed);
        }
        let window_end = proposal.proposal_time.saturating_add(self.challenge_window);
        if env.block_height >= window_end {
            return Err(ProtocolError::WindowClosed(format!(
                "challenge window closed at block {window_end}"
            )));
        }
        if env.caller == proposal.proposer {
            return Err(ProtocolError::InvalidInput(
                "proposer cannot dispute their own proposal".to_string(),
            ));
        }

        move_collateral(
            tx.collateral,
            proposal.bond,
            &env.caller,
            &self.principal,
            b"oracle-dispute-bond",
        )?;

        tx.store.put_dispute(Dispute {
            question_id: *question_id,
            disputer: env.caller.clone(),
            bond: proposal.bond,
            dispute_time: env.block_height,
        });
        question.state = QuestionState::Disputed;
        tx.store.put_question(question.clone());

        let voting_ends = env.block_height.saturating_add(self.voting_period);
        tx.store.put_tally(
            question_id,
            VoteTally {
                yes_votes: 0,
                no_votes: 0,
                voting_ends,
            },
        );
        question.state = QuestionState::Voting;
        tx.store.put_question(question);

        tx.emit(ProtocolEvent::ProposalDisputed {
            question_id: *question_id,
            disputer: env.caller.clone(),
            bond: proposal.bond,
            voting_ends,
        });
        Ok(())
    }

    /// Cast a stake-weighted vote. One vote per principal, never revocable.
    pub fn vote<S: OracleStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        question_id: &QuestionId,
        value: Answer,
        stake: u128,
    ) -> Result<()> {
        if stake == 0 {
            return Err(ProtocolError::InvalidInput(
                "vote stake must be positive".to_string(),
            ));
        }
        let question = require_question(&*tx.store, question_id)?;
        match question.state {
            QuestionState::Voting => {}
            QuestionState::Resolved => return Err(ProtocolError::AlreadyResolved),
            _ => {
                return Err(ProtocolError::WindowClosed(format!(
                    "question {question_id} is not open for voting"
                )))
            }
        }
        let mut tally = tx
            .store
            .tally(question_id)
            .ok_or_else(|| ProtocolError::NotFound(format!("vote tally {question_id}")))?;
        if env.block_height >= tally.voting_ends {
            return Err(ProtocolError::WindowClosed(format!(
                "voting closed at block {}",
                tally.voting_ends
            )));
        }
        if tx.store.vote(question_id, &env.caller).is_some() {
            return Err(ProtocolError::AlreadyVoted);
        }

        move_collateral(
            tx.collateral,
            stake,
            &env.caller,
            &self.principal,
            b"oracle-vote-stake",
        )?;

        match value {
            Answer::Yes => tally.yes_votes = checked_add(tally.yes_votes, stake, "yes votes")?,
            Answer::No => tally.no_votes = checked_add(tally.no_votes, stake, "no votes")?,
        }
        tx.store.put_tally(question_id, tally);
        tx.store.put_vote(Vote {
            question_id: *question_id,
            voter: env.caller.clone(),
            value,
            stake,
            cast_at: env.block_height,
        });
        tx.emit(ProtocolEvent::VoteCast {
            question_id: *question_id,
            voter: env.caller.clone(),
            value,
            stake,
        });
        Ok(())
    }

    /// Settle the question once its window has elapsed and pay the winning party.
    ///
    /// Disputed questions resolve to the larger stake bucket; ties resolve to
    /// [`Answer::No`].
    pub fn resolve<S: OracleStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        question_id: &QuestionId,
    ) -> Result<Answer> {
        let mut question = require_question(&*tx.store, question_id)?;
        if question.state == QuestionState::Resolved {
            return Err(ProtocolError::AlreadyResolved);
        }
        let proposal = require_proposal(&*tx.store, question_id)?;

        let (final_answer, winner, payout, disputed) = match tx.store.dispute(question_id) {
            Some(dispute) => {
                let tally = tx.store.tally(question_id).ok_or_else(|| {
                    ProtocolError::NotFound(format!("vote tally {question_id}"))
                })?;
                if env.block_height < tally.voting_ends {
                    return Err(ProtocolError::WindowOpen(format!(
                        "voting ends at block {}",
                        tally.voting_ends
                    )));
                }
                let final_answer = if tally.yes_votes > tally.no_votes {
                    Answer::Yes
                } else {
                    Answer::No
                };
                let winner = if final_answer == proposal.proposed_answer {
                    proposal.proposer.clone()
                } else {
                    dispute.disputer.clone()
                };
                let bonds = checked_add(proposal.bond, dispute.bond, "bonds")?;
                debug!(
                    %question_id,
                    yes = tally.yes_votes,
                    no = tally.no_votes,
                    "disputed question settled by vote"
                );
                (final_answer, winner, bonds, true)
            }
            None => {
                let window_end = proposal.proposal_time.saturating_add(self.challenge_window);
                if env.block_height < window_end {
                    return Err(ProtocolError::WindowOpen(format!(
                        "challenge window open until block {window_end}"
                    )));
                }
                (
                    proposal.proposed_answer,
                    proposal.proposer.clone(),
                    proposal.bond,
                    false,
                )
            }
        };

        let payout = checked_add(payout, question.reward, "resolution payout")?;
        move_collateral(
            tx.collateral,
            payout,
            &self.principal,
            &winner,
            b"oracle-settlement",
        )?;

        tx.store.put_resolution(Resolution {
            question_id: *question_id,
            final_answer,
            resolved_at: env.block_height,
            disputed,
        });
        question.state = QuestionState::Resolved;
        tx.store.put_question(question);

        tx.emit(ProtocolEvent::QuestionResolved {
            question_id: *question_id,
            final_answer,
            disputed,
        });
        Ok(final_answer)
    }

    /// Return the caller's vote stake after resolution. Returns the amount.
    pub fn withdraw_stake<S: OracleStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        question_id: &QuestionId,
    ) -> Result<u128> {
        if tx.store.resolution(question_id).is_none() {
            return Err(ProtocolError::NotResolved(format!(
                "question {question_id}"
            )));
        }
        let vote = tx.store.vote(question_id, &env.caller).ok_or_else(|| {
            ProtocolError::NotFound(format!("vote by {} on {question_id}", env.caller))
        })?;
        if tx.store.stake_withdrawn(question_id, &env.caller) {
            return Err(ProtocolError::AlreadyExists(format!(
                "stake withdrawal by {} on {question_id}",
                env.caller
            )));
        }

        move_collateral(
            tx.collateral,
            vote.stake,
            &self.principal,
            &env.caller,
            b"oracle-stake-return",
        )?;
        tx.store.mark_stake_withdrawn(question_id, &env.caller);

        tx.emit(ProtocolEvent::StakeWithdrawn {
            question_id: *question_id,
            voter: env.caller.clone(),
            stake: vote.stake,
        });
        Ok(vote.stake)
    }

    pub fn get_question<S: OracleStore>(
        &self,
        store: &S,
        question_id: &QuestionId,
    ) -> Option<Question> {
        store.question(question_id)
    }

    pub fn get_proposal<S: OracleStore>(
        &self,
        store: &S,
        question_id: &QuestionId,
    ) -> Option<Proposal> {
        store.proposal(question_id)
    }

    pub fn get_dispute<S: OracleStore>(
        &self,
        store: &S,
        question_id: &QuestionId,
    ) -> Option<Dispute> {
        store.dispute(question_id)
    }

    pub fn get_resolution<S: OracleStore>(
        &self,
        store: &S,
        question_id: &QuestionId,
    ) -> Option<Resolution> {
        store.resolution(question_id)
    }

    pub fn get_vote_tally<S: OracleStore>(
        &self,
        store: &S,
        question_id: &QuestionId,
    ) -> Option<VoteTally> {
        store.tally(question_id)
    }

    pub fn get_vote<S: OracleStore>(
        &self,
        store: &S,
        question_id: &QuestionId,
        voter: &Principal,
    ) -> Option<Vote> {
        store.vote(question_id, voter)
    }

    /// Final answer, once resolved.
    pub fn get_final_answer<S: OracleStore>(
        &self,
        store: &S,
        question_id: &QuestionId,
    ) -> Option<Answer> {
        store
            .resolution(question_id)
            .map(|resolution| resolution.final_answer)
    }

    pub fn get_question_state<S: OracleStore>(
        &self,
        store: &S,
        question_id: &QuestionId,
    ) -> Option<QuestionState> {
        store.question(question_id).map(|question| question.state)
    }
}

fn require_question<S: OracleStore>(store: &S, question_id: &QuestionId) -> Result<Question> {
    store
        .question(question_id)
        .ok_or_else(|| ProtocolError::NotFound(format!("question {question_id}")))
}

fn require_proposal<S: OracleStore>(store: &S, question_id: &QuestionId) -> Result<Proposal> {
    store
        .proposal(question_id)
        .ok_or_else(|| ProtocolError::NotFound(format!("proposal for question {question_id}")))
}
