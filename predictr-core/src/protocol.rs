//! # Protocol
//!
//! Wires the conditional-token engine, the optimistic oracle, the adapter
//! and the exchange over one ledger and runs every state-mutating call as a
//! whole-or-nothing transaction.
//!
//! [`Protocol::execute`] stages a call on copies of the store and the
//! collateral ledger. On success the copies replace the live state and the
//! buffered events are published; on failure both are dropped, so a failed
//! call leaves no state change and no events.

use crate::{
    adapter::OracleAdapter,
    collateral::{CollateralToken, MemoryCollateral},
    config::ProtocolConfig,
    ctf::ConditionalTokens,
    error::Result,
    event::ProtocolEvent,
    exchange::{Exchange, Fill, Order, SignedOrder},
    ids::{Answer, ConditionId, MarketId, OrderHash, OutcomeIndex, PositionId, QuestionId},
    ledger::{Env, Tx},
    oracle::OptimisticOracle,
    principal::Principal,
    signature::{Secp256k1Verifier, SignatureVerifier},
    store::{Condition, Market, MemoryStore, Question, Store},
    ProtocolError,
};
use std::sync::Arc;
use tracing::{debug, info};

/// The deployed protocol over store `S` and collateral token `C`.
#[derive(Debug)]
pub struct Protocol<S = MemoryStore, C = MemoryCollateral> {
    config: ProtocolConfig,
    deployer: Principal,
    store: S,
    collateral: C,
    block_height: u64,
    ctf: ConditionalTokens,
    oracle: OptimisticOracle,
    adapter: OracleAdapter,
    exchange: Exchange,
    events: Vec<ProtocolEvent>,
}

impl<S: Store, C: CollateralToken> Protocol<S, C> {
    /// Deploy every component under `deployer`, verifying order signatures
    /// with recoverable secp256k1 ECDSA.
    pub fn new(
        config: ProtocolConfig,
        deployer: Principal,
        store: S,
        collateral: C,
    ) -> Result<Self> {
        let verifier = Arc::new(Secp256k1Verifier::new(config.network));
        Self::with_verifier(config, deployer, store, collateral, verifier)
    }

    /// Deploy with a custom signature verifier.
    pub fn with_verifier(
        config: ProtocolConfig,
        deployer: Principal,
        store: S,
        collateral: C,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self> {
        config.validate()?;
        if !deployer.is_well_formed(config.network) || deployer.is_contract() {
            return Err(ProtocolError::InvalidInput(format!(
                "deployer {deployer} is not a standard principal on {:?}",
                config.network
            )));
        }

        let ctf = ConditionalTokens::new(deployer.clone())?;
        let oracle = OptimisticOracle::new(&deployer, &config)?;
        let adapter = OracleAdapter::new(&deployer)?;
        let exchange = Exchange::new(deployer.clone(), &config, verifier)?;

        let mut protocol = Self {
            config,
            deployer: deployer.clone(),
            store,
            collateral,
            block_height: 0,
            ctf,
            oracle,
            adapter,
            exchange,
            events: Vec::new(),
        };
        let exchange_principal = protocol.exchange.principal().clone();
        protocol.set_trusted_caller(&deployer, &exchange_principal, true)?;
        info!(
            deployer = %deployer,
            ctf = %protocol.ctf.principal(),
            oracle = %protocol.oracle.principal(),
            adapter = %protocol.adapter.principal(),
            exchange = %exchange_principal,
            "protocol deployed"
        );
        Ok(protocol)
    }

    /// Run `op` as one transaction sent by `sender` at the current height.
    ///
    /// Effects and events are committed only if `op` returns `Ok`.
    pub fn execute<T, F>(&mut self, operation: &'static str, sender: &Principal, op: F) -> Result<T>
    where
        F: FnOnce(&Self, &mut Tx<'_, S, C>, &Env) -> Result<T>,
    {
        if !sender.is_well_formed(self.config.network) {
            return Err(ProtocolError::InvalidInput(format!(
                "malformed sender {sender}"
            )));
        }

        let env = Env::new(sender.clone(), self.block_height);
        let mut store = self.store.clone();
        let mut collateral = self.collateral.clone();
        let (result, events) = {
            let mut tx = Tx::new(&mut store, &mut collateral);
            let result = op(self, &mut tx, &env);
            (result, tx.into_events())
        };

        match result {
            Ok(value) => {
                self.store = store;
                self.collateral = collateral;
                for event in &events {
                    info!(
                        operation,
                        block_height = self.block_height,
                        event = event.kind(),
                        payload = %event.to_json(),
                        "event committed"
                    );
                }
                self.events.extend(events);
                Ok(value)
            }
            Err(err) => {
                debug!(
                    operation,
                    sender = %sender,
                    kind = err.kind(),
                    error = %err,
                    "transaction aborted"
                );
                Err(err)
            }
        }
    }

    /// Move the chain forward by `blocks`. Returns the new height.
    pub fn advance_blocks(&mut self, blocks: u64) -> u64 {
        self.block_height = self.block_height.saturating_add(blocks);
        debug!(block_height = self.block_height, "advanced blocks");
        self.block_height
    }

    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn deployer(&self) -> &Principal {
        &self.deployer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn collateral(&self) -> &C {
        &self.collateral
    }

    /// Direct access to the collateral ledger, for funding accounts.
    pub fn collateral_mut(&mut self) -> &mut C {
        &mut self.collateral
    }

    pub fn ctf(&self) -> &ConditionalTokens {
        &self.ctf
    }

    pub fn oracle(&self) -> &OptimisticOracle {
        &self.oracle
    }

    pub fn adapter(&self) -> &OracleAdapter {
        &self.adapter
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// Every event committed so far, in order.
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    // Conditional tokens

    pub fn prepare_condition(
        &mut self,
        sender: &Principal,
        oracle: &Principal,
        question_id: &QuestionId,
        outcome_slot_count: u128,
    ) -> Result<ConditionId> {
        self.execute("prepare_condition", sender, |p, tx, _| {
            p.ctf
                .prepare_condition(tx, oracle, question_id, outcome_slot_count)
        })
    }

    pub fn split_position(
        &mut self,
        sender: &Principal,
        condition_id: &ConditionId,
        amount: u128,
    ) -> Result<()> {
        self.execute("split_position", sender, |p, tx, env| {
            p.ctf.split_position(tx, env, condition_id, amount)
        })
    }

    pub fn merge_positions(
        &mut self,
        sender: &Principal,
        condition_id: &ConditionId,
        amount: u128,
        recipient: &Principal,
    ) -> Result<()> {
        self.execute("merge_positions", sender, |p, tx, env| {
            p.ctf
                .merge_positions(tx, env, condition_id, amount, recipient)
        })
    }

    pub fn safe_transfer_from(
        &mut self,
        sender: &Principal,
        from: &Principal,
        to: &Principal,
        position_id: &PositionId,
        amount: u128,
    ) -> Result<()> {
        self.execute("safe_transfer_from", sender, |p, tx, env| {
            p.ctf
                .safe_transfer_from(tx, env, from, to, position_id, amount)
        })
    }

    pub fn set_approval_for_all(
        &mut self,
        sender: &Principal,
        operator: &Principal,
        approved: bool,
    ) -> Result<()> {
        self.execute("set_approval_for_all", sender, |p, tx, env| {
            p.ctf.set_approval_for_all(tx, env, operator, approved)
        })
    }

    pub fn set_trusted_caller(
        &mut self,
        sender: &Principal,
        caller: &Principal,
        trusted: bool,
    ) -> Result<()> {
        self.execute("set_trusted_caller", sender, |p, tx, env| {
            p.ctf.set_trusted_caller(tx, env, caller, trusted)
        })
    }

    pub fn report_payout(
        &mut self,
        sender: &Principal,
        condition_id: &ConditionId,
        payout_numerators: [u128; 2],
    ) -> Result<()> {
        self.execute("report_payout", sender, |p, tx, env| {
            p.ctf
                .report_payout(tx, env, condition_id, payout_numerators)
        })
    }

    pub fn redeem_positions(
        &mut self,
        sender: &Principal,
        condition_id: &ConditionId,
        outcome: OutcomeIndex,
    ) -> Result<u128> {
        self.execute("redeem_positions", sender, |p, tx, env| {
            p.ctf.redeem_positions(tx, env, condition_id, outcome)
        })
    }

    // Optimistic oracle

    pub fn initialize_question(
        &mut self,
        sender: &Principal,
        question_id: &QuestionId,
        question_text: &str,
        reward: u128,
    ) -> Result<()> {
        self.execute("initialize_question", sender, |p, tx, env| {
            p.oracle
                .initialize_question(tx, env, question_id, question_text, reward)
        })
    }

    pub fn propose_answer(
        &mut self,
        sender: &Principal,
        question_id: &QuestionId,
        answer: Answer,
    ) -> Result<()> {
        self.execute("propose_answer", sender, |p, tx, env| {
            p.oracle.propose_answer(tx, env, question_id, answer)
        })
    }

    pub fn dispute_proposal(&mut self, sender: &Principal, question_id: &QuestionId) -> Result<()> {
        self.execute("dispute_proposal", sender, |p, tx, env| {
            p.oracle.dispute_proposal(tx, env, question_id)
        })
    }

    pub fn vote(
        &mut self,
        sender: &Principal,
        question_id: &QuestionId,
        value: Answer,
        stake: u128,
    ) -> Result<()> {
        self.execute("vote", sender, |p, tx, env| {
            p.oracle.vote(tx, env, question_id, value, stake)
        })
    }

    pub fn resolve(&mut self, sender: &Principal, question_id: &QuestionId) -> Result<Answer> {
        self.execute("resolve", sender, |p, tx, env| {
            p.oracle.resolve(tx, env, question_id)
        })
    }

    pub fn withdraw_stake(&mut self, sender: &Principal, question_id: &QuestionId) -> Result<u128> {
        self.execute("withdraw_stake", sender, |p, tx, env| {
            p.oracle.withdraw_stake(tx, env, question_id)
        })
    }

    // Oracle adapter

    pub fn initialize_market(
        &mut self,
        sender: &Principal,
        market_id: &MarketId,
        question_text: &str,
        reward: u128,
    ) -> Result<ConditionId> {
        self.execute("initialize_market", sender, |p, tx, env| {
            p.adapter.initialize_market(
                &p.ctf,
                &p.oracle,
                tx,
                env,
                market_id,
                question_text,
                reward,
            )
        })
    }

    pub fn resolve_market(
        &mut self,
        sender: &Principal,
        market_id: &MarketId,
    ) -> Result<[u128; 2]> {
        self.execute("resolve_market", sender, |p, tx, env| {
            p.adapter
                .resolve_market(&p.ctf, &p.oracle, tx, env, market_id)
        })
    }

    // Exchange

    /// Fill a maker order with `sender` as the taker.
    pub fn fill_order(
        &mut self,
        sender: &Principal,
        signed: &SignedOrder,
        fill_amount: u128,
    ) -> Result<Fill> {
        self.execute("fill_order", sender, |p, tx, env| {
            p.exchange
                .fill_order(&p.ctf, tx, env, signed, sender, fill_amount)
        })
    }

    pub fn fill_order_mint(
        &mut self,
        sender: &Principal,
        first: &SignedOrder,
        second: &SignedOrder,
        condition_id: &ConditionId,
        fill_amount: u128,
    ) -> Result<u128> {
        self.execute("fill_order_mint", sender, |p, tx, env| {
            p.exchange
                .fill_order_mint(&p.ctf, tx, env, first, second, condition_id, fill_amount)
        })
    }

    pub fn fill_order_merge(
        &mut self,
        sender: &Principal,
        first: &SignedOrder,
        second: &SignedOrder,
        condition_id: &ConditionId,
        fill_amount: u128,
    ) -> Result<[u128; 2]> {
        self.execute("fill_order_merge", sender, |p, tx, env| {
            p.exchange
                .fill_order_merge(&p.ctf, tx, env, first, second, condition_id, fill_amount)
        })
    }

    pub fn cancel_order(&mut self, sender: &Principal, order: &Order) -> Result<OrderHash> {
        self.execute("cancel_order", sender, |p, tx, env| {
            p.exchange.cancel_order(tx, env, order)
        })
    }

    pub fn deposit_collateral(&mut self, sender: &Principal, amount: u128) -> Result<()> {
        self.execute("deposit_collateral", sender, |p, tx, env| {
            p.exchange.deposit_collateral(tx, env, amount)
        })
    }

    pub fn withdraw_collateral(&mut self, sender: &Principal, amount: u128) -> Result<()> {
        self.execute("withdraw_collateral", sender, |p, tx, env| {
            p.exchange.withdraw_collateral(tx, env, amount)
        })
    }

    pub fn set_paused(&mut self, sender: &Principal, paused: bool) -> Result<()> {
        self.execute("set_paused", sender, |p, tx, env| {
            p.exchange.set_paused(tx, env, paused)
        })
    }

    pub fn set_fee_receiver(&mut self, sender: &Principal, receiver: &Principal) -> Result<()> {
        self.execute("set_fee_receiver", sender, |p, tx, env| {
            p.exchange.set_fee_receiver(tx, env, receiver)
        })
    }

    // Reads

    pub fn balance_of(&self, owner: &Principal, position_id: &PositionId) -> u128 {
        self.ctf.balance_of(&self.store, owner, position_id)
    }

    pub fn collateral_balance_of(&self, owner: &Principal) -> u128 {
        self.collateral.balance_of(owner)
    }

    pub fn get_condition(&self, condition_id: &ConditionId) -> Option<Condition> {
        self.ctf.get_condition(&self.store, condition_id)
    }

    pub fn get_question(&self, question_id: &QuestionId) -> Option<Question> {
        self.oracle.get_question(&self.store, question_id)
    }

    pub fn get_final_answer(&self, question_id: &QuestionId) -> Option<Answer> {
        self.oracle.get_final_answer(&self.store, question_id)
    }

    pub fn get_market(&self, market_id: &MarketId) -> Option<Market> {
        self.adapter.get_market(&self.store, market_id)
    }

    pub fn get_filled_amount(&self, order_hash: &OrderHash) -> u128 {
        self.exchange.get_filled_amount(&self.store, order_hash)
    }

    pub fn get_escrow_balance(&self, owner: &Principal) -> u128 {
        self.exchange.get_escrow_balance(&self.store, owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ids,
        principal::Network,
        store::QuestionState,
        test_utils::{funded_protocol, sign_order, user, ALICE, BOB, CAROL, DAVE, DEPLOYER, FUNDING},
    };

    const MARKET_ID: MarketId = QuestionId::new([0x01; 32]);
    const QUESTION: &str = "Will BTC hit $100k by Dec 31, 2025?";
    const REWARD: u128 = 100_000_000;
    const SPLIT: u128 = 10_000_000;

    fn protocol_with_market() -> (Protocol, ConditionId) {
        let mut protocol = funded_protocol();
        let condition_id = protocol
            .initialize_market(&user(ALICE), &MARKET_ID, QUESTION, REWARD)
            .unwrap();
        (protocol, condition_id)
    }

    /// Propose YES, dispute, vote YES, let voting end and resolve the oracle question.
    fn resolve_yes_through_dispute(protocol: &mut Protocol) {
        protocol.advance_blocks(10);
        protocol
            .propose_answer(&user(BOB), &MARKET_ID, Answer::Yes)
            .unwrap();
        protocol.advance_blocks(1);
        protocol.dispute_proposal(&user(CAROL), &MARKET_ID).unwrap();
        protocol.advance_blocks(1);
        protocol
            .vote(&user(DAVE), &MARKET_ID, Answer::Yes, 1_000)
            .unwrap();
        protocol.advance_blocks(300);
        assert_eq!(
            protocol.resolve(&user(DAVE), &MARKET_ID).unwrap(),
            Answer::Yes
        );
    }

    #[test]
    fn test_deploy_registers_exchange_as_trusted() {
        let protocol = funded_protocol();
        assert!(protocol
            .ctf()
            .is_trusted_caller(protocol.store(), protocol.exchange().principal()));
        assert!(!protocol
            .ctf()
            .is_trusted_caller(protocol.store(), protocol.adapter().principal()));
        assert_eq!(protocol.events()[0].kind(), "trusted-caller-set");
    }

    #[test]
    fn test_deploy_rejects_bad_config_and_deployer() {
        let config = ProtocolConfig {
            fee_bps: 10_001,
            ..ProtocolConfig::default()
        };
        let result = Protocol::new(
            config,
            user(DEPLOYER),
            MemoryStore::new(),
            MemoryCollateral::new(),
        );
        assert!(matches!(result, Err(ProtocolError::Config(_))));

        let mainnet_deployer = Principal::standard(Network::Mainnet.single_sig_version(), [9; 20]);
        let result = Protocol::new(
            ProtocolConfig::default(),
            mainnet_deployer,
            MemoryStore::new(),
            MemoryCollateral::new(),
        );
        assert!(matches!(result, Err(ProtocolError::InvalidInput(_))));
    }

    #[test]
    fn test_initialize_market_scenario() {
        let (protocol, condition_id) = protocol_with_market();

        let market = protocol.get_market(&MARKET_ID).unwrap();
        assert_eq!(market.market_id, MARKET_ID);
        assert_eq!(market.condition_id, condition_id);
        assert_eq!(market.question_id, MARKET_ID);
        assert_eq!(market.question_text, QUESTION);
        assert_eq!(market.reward, REWARD);
        assert_eq!(market.creator, user(ALICE));
        assert!(!market.resolved);

        assert_eq!(
            condition_id,
            ids::condition_id(protocol.adapter().principal(), &MARKET_ID, 2)
        );
        assert_eq!(
            protocol.collateral_balance_of(&user(ALICE)),
            FUNDING - REWARD
        );
        let kinds: Vec<_> = protocol.events().iter().map(ProtocolEvent::kind).collect();
        assert_eq!(
            kinds[1..],
            ["condition-prepared", "question-initialized", "market-initialized"]
        );
    }

    #[test]
    fn test_split_scenario() {
        let (mut protocol, condition_id) = protocol_with_market();
        let before = protocol.collateral_balance_of(&user(ALICE));
        protocol
            .split_position(&user(ALICE), &condition_id, SPLIT)
            .unwrap();

        let [yes, no] = ids::position_ids(&condition_id);
        assert_eq!(protocol.balance_of(&user(ALICE), &yes), SPLIT);
        assert_eq!(protocol.balance_of(&user(ALICE), &no), SPLIT);
        assert_eq!(protocol.collateral_balance_of(&user(ALICE)), before - SPLIT);
    }

    #[test]
    fn test_full_lifecycle_with_dispute() {
        let (mut protocol, condition_id) = protocol_with_market();
        protocol
            .split_position(&user(ALICE), &condition_id, SPLIT)
            .unwrap();
        let bond = protocol.config().proposal_bond;

        resolve_yes_through_dispute(&mut protocol);
        assert_eq!(
            protocol.oracle().get_question_state(protocol.store(), &MARKET_ID),
            Some(QuestionState::Resolved)
        );
        // proposer was right: both bonds plus the reward
        assert_eq!(
            protocol.collateral_balance_of(&user(BOB)),
            FUNDING + bond + REWARD
        );
        assert_eq!(protocol.collateral_balance_of(&user(CAROL)), FUNDING - bond);

        assert_eq!(
            protocol.resolve_market(&user(CAROL), &MARKET_ID).unwrap(),
            [1, 0]
        );
        assert_eq!(
            protocol.get_condition(&condition_id).unwrap().payout_numerators,
            [1, 0]
        );

        let alice = user(ALICE);
        let before = protocol.collateral_balance_of(&alice);
        assert_eq!(
            protocol
                .redeem_positions(&alice, &condition_id, OutcomeIndex::Yes)
                .unwrap(),
            SPLIT
        );
        assert_eq!(
            protocol
                .redeem_positions(&alice, &condition_id, OutcomeIndex::No)
                .unwrap(),
            0
        );
        let [yes, no] = ids::position_ids(&condition_id);
        assert_eq!(protocol.balance_of(&alice, &yes), 0);
        assert_eq!(protocol.balance_of(&alice, &no), 0);
        assert_eq!(protocol.collateral_balance_of(&alice), before + SPLIT);

        assert_eq!(
            protocol.redeem_positions(&alice, &condition_id, OutcomeIndex::Yes),
            Err(ProtocolError::InsufficientBalance {
                needed: 1,
                available: 0
            })
        );
        assert_eq!(
            protocol.split_position(&alice, &condition_id, 1),
            Err(ProtocolError::AlreadyResolved)
        );
        assert_eq!(protocol.withdraw_stake(&user(DAVE), &MARKET_ID), Ok(1_000));
        assert_eq!(protocol.collateral_balance_of(&user(DAVE)), FUNDING);
    }

    #[test]
    fn test_market_resolution_waits_for_oracle() {
        let (mut protocol, _) = protocol_with_market();
        assert!(matches!(
            protocol.resolve_market(&user(CAROL), &MARKET_ID),
            Err(ProtocolError::NotResolved(_))
        ));

        protocol
            .propose_answer(&user(BOB), &MARKET_ID, Answer::No)
            .unwrap();
        protocol.advance_blocks(143);
        assert!(matches!(
            protocol.resolve(&user(BOB), &MARKET_ID),
            Err(ProtocolError::WindowOpen(_))
        ));
        protocol.advance_blocks(1);
        assert_eq!(protocol.resolve(&user(BOB), &MARKET_ID), Ok(Answer::No));
        assert_eq!(protocol.resolve_market(&user(BOB), &MARKET_ID), Ok([0, 1]));
        assert_eq!(
            protocol.resolve_market(&user(BOB), &MARKET_ID),
            Err(ProtocolError::AlreadyResolved)
        );
    }

    #[test]
    fn test_zero_signature_fill_fails() {
        let (mut protocol, condition_id) = protocol_with_market();
        protocol
            .split_position(&user(ALICE), &condition_id, SPLIT)
            .unwrap();
        protocol
            .split_position(&user(BOB), &condition_id, SPLIT)
            .unwrap();
        let [yes, no] = ids::position_ids(&condition_id);

        let mut signed = sign_order(
            ALICE,
            Order {
                maker: user(ALICE),
                maker_position_id: yes,
                taker_position_id: no,
                maker_amount: 1_000,
                taker_amount: 1_000,
                salt: 1,
                expiration: 1_000,
            },
        );
        signed.signature = vec![0; 65];
        let events_before = protocol.events().len();

        assert_eq!(
            protocol.fill_order(&user(BOB), &signed, 500),
            Err(ProtocolError::InvalidSignature)
        );
        assert_eq!(protocol.events().len(), events_before);
        assert_eq!(protocol.get_filled_amount(&signed.order.hash()), 0);
    }

    #[test]
    fn test_signed_fill_settles_positions() {
        let (mut protocol, condition_id) = protocol_with_market();
        protocol
            .split_position(&user(ALICE), &condition_id, SPLIT)
            .unwrap();
        protocol
            .split_position(&user(BOB), &condition_id, SPLIT)
            .unwrap();
        let [yes, no] = ids::position_ids(&condition_id);

        let signed = sign_order(
            ALICE,
            Order {
                maker: user(ALICE),
                maker_position_id: yes,
                taker_position_id: no,
                maker_amount: 1_000_000,
                taker_amount: 1_000_000,
                salt: 42,
                expiration: 100,
            },
        );
        let fill = protocol.fill_order(&user(BOB), &signed, 1_000_000).unwrap();
        assert_eq!(fill.fee, 5_000);
        assert_eq!(protocol.balance_of(&user(BOB), &yes), SPLIT + 1_000_000);
        assert_eq!(
            protocol.balance_of(&user(ALICE), &no),
            SPLIT + 1_000_000 - 5_000
        );
        assert_eq!(protocol.balance_of(&user(DEPLOYER), &no), 5_000);
        assert_eq!(protocol.get_filled_amount(&fill.order_hash), 1_000_000);
        assert_eq!(protocol.events().last().map(ProtocolEvent::kind), Some("order-filled"));

        assert!(matches!(
            protocol.fill_order(&user(BOB), &signed, 1),
            Err(ProtocolError::OrderFilled { .. })
        ));
    }

    #[test]
    fn test_failed_transaction_rolls_back_every_leg() {
        let (mut protocol, condition_id) = protocol_with_market();
        let [yes, no] = ids::position_ids(&condition_id);
        protocol.deposit_collateral(&user(ALICE), 10_000).unwrap();
        protocol.deposit_collateral(&user(BOB), 10_000).unwrap();

        protocol
            .propose_answer(&user(CAROL), &MARKET_ID, Answer::Yes)
            .unwrap();
        protocol.advance_blocks(144);
        protocol.resolve(&user(CAROL), &MARKET_ID).unwrap();
        protocol.resolve_market(&user(CAROL), &MARKET_ID).unwrap();

        let order = |seed: u8, leg: PositionId| {
            sign_order(
                seed,
                Order {
                    maker: user(seed),
                    maker_position_id: PositionId::COLLATERAL,
                    taker_position_id: leg,
                    maker_amount: 6_000,
                    taker_amount: 10_000,
                    salt: 3,
                    expiration: 1_000,
                },
            )
        };
        let (buy_yes, buy_no) = (order(ALICE, yes), order(BOB, no));
        let store_before = protocol.store().clone();
        let events_before = protocol.events().len();

        // escrow is debited before the split fails on the resolved condition
        assert_eq!(
            protocol.fill_order_mint(&user(DAVE), &buy_yes, &buy_no, &condition_id, 1_000),
            Err(ProtocolError::AlreadyResolved)
        );
        assert_eq!(protocol.get_escrow_balance(&user(ALICE)), 10_000);
        assert_eq!(protocol.get_escrow_balance(&user(BOB)), 10_000);
        assert_eq!(protocol.get_filled_amount(&buy_yes.order.hash()), 0);
        assert_eq!(protocol.events().len(), events_before);
        assert_eq!(
            format!("{:?}", protocol.store()),
            format!("{store_before:?}")
        );
    }

    #[test]
    fn test_mint_then_merge_round_trip_through_exchange() {
        let (mut protocol, condition_id) = protocol_with_market();
        let [yes, no] = ids::position_ids(&condition_id);
        protocol.deposit_collateral(&user(ALICE), 1_000_000).unwrap();
        protocol.deposit_collateral(&user(BOB), 1_000_000).unwrap();

        let buy = |seed: u8, leg: PositionId, price: u128| {
            sign_order(
                seed,
                Order {
                    maker: user(seed),
                    maker_position_id: PositionId::COLLATERAL,
                    taker_position_id: leg,
                    maker_amount: price * 1_000,
                    taker_amount: 100_000,
                    salt: 1,
                    expiration: 1_000,
                },
            )
        };
        protocol
            .fill_order_mint(
                &user(DAVE),
                &buy(ALICE, yes, 55),
                &buy(BOB, no, 50),
                &condition_id,
                10_000,
            )
            .unwrap();
        assert_eq!(protocol.balance_of(&user(ALICE), &yes), 10_000);
        assert_eq!(protocol.balance_of(&user(BOB), &no), 10_000);

        let sell = |seed: u8, leg: PositionId| {
            sign_order(
                seed,
                Order {
                    maker: user(seed),
                    maker_position_id: leg,
                    taker_position_id: PositionId::COLLATERAL,
                    maker_amount: 10_000,
                    taker_amount: 4_900,
                    salt: 2,
                    expiration: 1_000,
                },
            )
        };
        let payouts = protocol
            .fill_order_merge(
                &user(DAVE),
                &sell(BOB, no),
                &sell(ALICE, yes),
                &condition_id,
                10_000,
            )
            .unwrap();
        // 10_000 merged, 50 fee, 9_950 shared evenly over equal asks
        assert_eq!(payouts, [4_975, 4_975]);
        assert_eq!(protocol.ctf().collateral_locked(protocol.store(), &condition_id), 0);
        assert_eq!(protocol.ctf().total_supply(protocol.store(), &yes), 0);
        assert_eq!(
            protocol.collateral_balance_of(protocol.exchange().principal()),
            protocol.get_escrow_balance(&user(ALICE)) + protocol.get_escrow_balance(&user(BOB))
        );
    }

    #[test]
    fn test_conservation_across_participants() {
        let (mut protocol, condition_id) = protocol_with_market();
        let [yes, no] = ids::position_ids(&condition_id);
        protocol.split_position(&user(ALICE), &condition_id, 700).unwrap();
        protocol.split_position(&user(BOB), &condition_id, 300).unwrap();
        protocol
            .merge_positions(&user(BOB), &condition_id, 100, &user(BOB))
            .unwrap();
        protocol
            .safe_transfer_from(&user(ALICE), &user(ALICE), &user(CAROL), &yes, 250)
            .unwrap();

        let supply = |p: &Protocol, leg: &PositionId| p.ctf().total_supply(p.store(), leg);
        let locked = protocol.ctf().collateral_locked(protocol.store(), &condition_id);
        assert_eq!(locked, 900);
        assert_eq!(supply(&protocol, &yes), locked);
        assert_eq!(supply(&protocol, &no), locked);
        assert_eq!(
            protocol.collateral_balance_of(protocol.ctf().principal()),
            locked
        );

        protocol
            .propose_answer(&user(DAVE), &MARKET_ID, Answer::Yes)
            .unwrap();
        protocol.advance_blocks(144);
        protocol.resolve(&user(DAVE), &MARKET_ID).unwrap();
        protocol.resolve_market(&user(DAVE), &MARKET_ID).unwrap();

        let mut paid = 0;
        for seed in [ALICE, BOB, CAROL] {
            paid += protocol
                .redeem_positions(&user(seed), &condition_id, OutcomeIndex::Yes)
                .unwrap();
        }
        assert_eq!(paid, 900);
        assert_eq!(supply(&protocol, &yes), 0);
        assert_eq!(
            protocol.ctf().collateral_locked(protocol.store(), &condition_id),
            0
        );
    }

    #[test]
    fn test_malformed_sender_rejected() {
        let mut protocol = funded_protocol();
        let mainnet = Principal::standard(Network::Mainnet.single_sig_version(), [1; 20]);
        assert!(matches!(
            protocol.deposit_collateral(&mainnet, 1),
            Err(ProtocolError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_advance_blocks() {
        let mut protocol = funded_protocol();
        assert_eq!(protocol.block_height(), 0);
        assert_eq!(protocol.advance_blocks(300), 300);
        assert_eq!(protocol.advance_blocks(u64::MAX), u64::MAX);
    }
}
