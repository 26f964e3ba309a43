//! # Oracle Adapter
//!
//! Binds a market to a condition and an oracle question. The adapter is the
//! registered oracle of every condition it prepares, so it is the only
//! principal that can report payouts for its markets. A market id doubles
//! as the oracle question id.

use crate::{
    collateral::CollateralToken,
    ctf::ConditionalTokens,
    error::Result,
    event::ProtocolEvent,
    ids::{self, ConditionId, MarketId, QuestionId},
    ledger::{Env, Tx},
    oracle::OptimisticOracle,
    principal::Principal,
    store::{AdapterStore, CtfStore, Market, OracleStore},
    ProtocolError,
};
use tracing::debug;

/// Contract name of the adapter under its deployer
pub const ADAPTER_CONTRACT_NAME: &str = "oracle-adapter";

/// Binary markets only
pub const MARKET_OUTCOME_SLOTS: u128 = 2;

#[derive(Debug, Clone)]
pub struct OracleAdapter {
    principal: Principal,
}

impl OracleAdapter {
    pub fn new(deployer: &Principal) -> Result<Self> {
        Ok(Self {
            principal: Principal::contract(deployer, ADAPTER_CONTRACT_NAME)?,
        })
    }

    /// Contract principal registered as oracle of every market condition
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Prepare the market's condition, open its oracle question and record the market.
    ///
    /// The condition id is recomputed locally and must match the one the
    /// conditional-token engine returned.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize_market<S, C>(
        &self,
        ctf: &ConditionalTokens,
        oracle: &OptimisticOracle,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        market_id: &MarketId,
        question_text: &str,
        reward: u128,
    ) -> Result<ConditionId>
    where
        S: AdapterStore + CtfStore + OracleStore,
        C: CollateralToken,
    {
        if tx.store.market(market_id).is_some() {
            return Err(ProtocolError::AlreadyExists(format!("market {market_id}")));
        }

        let nested = env.call_from(&self.principal);
        let question_id: QuestionId = *market_id;
        let returned =
            ctf.prepare_condition(tx, &self.principal, &question_id, MARKET_OUTCOME_SLOTS)?;
        let expected = ids::condition_id(&self.principal, &question_id, MARKET_OUTCOME_SLOTS);
        if returned != expected {
            return Err(ProtocolError::ConditionIdMismatch {
                expected: expected.to_string(),
                actual: returned.to_string(),
            });
        }

        oracle.initialize_question(tx, &nested, &question_id, question_text, reward)?;

        tx.store.put_market(Market {
            market_id: *market_id,
            condition_id: expected,
            question_id,
            question_text: question_text.to_string(),
            creator: env.caller.clone(),
            reward,
            created_at: env.block_height,
            resolved: false,
        });
        tx.emit(ProtocolEvent::MarketInitialized {
            market_id: *market_id,
            condition_id: expected,
            creator: env.caller.clone(),
            reward,
        });
        debug!(%market_id, condition_id = %expected, "market initialized");
        Ok(expected)
    }

    /// Report the oracle's final answer to the conditional-token engine.
    ///
    /// Returns the payout vector reported for the market's condition.
    pub fn resolve_market<S, C>(
        &self,
        ctf: &ConditionalTokens,
        oracle: &OptimisticOracle,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        market_id: &MarketId,
    ) -> Result<[u128; 2]>
    where
        S: AdapterStore + CtfStore + OracleStore,
    {
        let mut market = tx
            .store
            .market(market_id)
            .ok_or_else(|| ProtocolError::NotFound(format!("market {market_id}")))?;
        if market.resolved {
            return Err(ProtocolError::AlreadyResolved);
        }
        let answer = oracle
            .get_final_answer(&*tx.store, &market.question_id)
            .ok_or_else(|| ProtocolError::NotResolved(format!("question {}", market.question_id)))?;

        let payout_numerators = answer.payout_numerators();
        ctf.report_payout(
            tx,
            &env.call_from(&self.principal),
            &market.condition_id,
            payout_numerators,
        )?;

        market.resolved = true;
        let condition_id = market.condition_id;
        tx.store.put_market(market);
        tx.emit(ProtocolEvent::MarketResolved {
            market_id: *market_id,
            condition_id,
            payout_numerators,
        });
        Ok(payout_numerators)
    }

    pub fn get_market<S: AdapterStore>(&self, store: &S, market_id: &MarketId) -> Option<Market> {
        store.market(market_id)
    }

    pub fn is_market_resolved<S: AdapterStore>(&self, store: &S, market_id: &MarketId) -> bool {
        store
            .market(market_id)
            .map(|market| market.resolved)
            .unwrap_or(false)
    }

    pub fn get_condition_id<S: AdapterStore>(
        &self,
        store: &S,
        market_id: &MarketId,
    ) -> Option<ConditionId> {
        store.market(market_id).map(|market| market.condition_id)
    }

    pub fn get_question_id<S: AdapterStore>(
        &self,
        store: &S,
        market_id: &MarketId,
    ) -> Option<QuestionId> {
        store.market(market_id).map(|market| market.question_id)
    }

    pub fn get_market_count<S: AdapterStore>(&self, store: &S) -> u64 {
        store.market_count()
    }
}
