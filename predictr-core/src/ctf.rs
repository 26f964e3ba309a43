//! # Conditional Tokens Engine
//!
//! Owns the position-token ledger. Collateral split into a condition mints
//! both outcome legs in equal amounts; merging burns both legs and releases
//! the collateral; once the condition's oracle reports a payout vector,
//! holders redeem their legs for their share of the locked collateral.
//!
//! For every condition the engine maintains
//! `total_supply(leg) == collateral_locked` for both legs until resolution,
//! and for the winning leg afterwards.

use crate::{
    collateral::{move_collateral, CollateralToken},
    error::Result,
    event::ProtocolEvent,
    ids::{self, ConditionId, OutcomeIndex, PositionId, QuestionId},
    ledger::{Env, Tx},
    principal::Principal,
    store::{Condition, CtfStore},
    utils::{checked_add, checked_sub, mul_div},
    ProtocolError,
};
use tracing::debug;

/// Contract name of the engine under its deployer
pub const CTF_CONTRACT_NAME: &str = "conditional-tokens";

/// Payout vectors must sum to this denominator: exactly one leg pays.
pub const PAYOUT_DENOMINATOR: u128 = 1;

/// Accepted outcome slot counts
pub const MIN_OUTCOME_SLOTS: u128 = 1;
pub const MAX_OUTCOME_SLOTS: u128 = 2;

#[derive(Debug, Clone)]
pub struct ConditionalTokens {
    principal: Principal,
    owner: Principal,
}

impl ConditionalTokens {
    /// Deploy the engine under `owner`.
    pub fn new(owner: Principal) -> Result<Self> {
        Ok(Self {
            principal: Principal::contract(&owner, CTF_CONTRACT_NAME)?,
            owner,
        })
    }

    /// Contract principal holding the locked collateral
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    /// Register a condition reported by `oracle` and return its id.
    pub fn prepare_condition<S: CtfStore, C>(
        &self,
        tx: &mut Tx<'_, S, C>,
        oracle: &Principal,
        question_id: &QuestionId,
        outcome_slot_count: u128,
    ) -> Result<ConditionId> {
        if !(MIN_OUTCOME_SLOTS..=MAX_OUTCOME_SLOTS).contains(&outcome_slot_count) {
            return Err(ProtocolError::InvalidInput(format!(
                "outcome slot count must be 1 or 2, got {outcome_slot_count}"
            )));
        }

        let condition_id = ids::condition_id(oracle, question_id, outcome_slot_count);
        if tx.store.condition(&condition_id).is_some() {
            return Err(ProtocolError::AlreadyExists(format!(
                "condition {condition_id}"
            )));
        }

        tx.store.put_condition(Condition {
            condition_id,
            oracle: oracle.clone(),
            question_id: *question_id,
            outcome_slot_count,
            resolved: false,
            payout_numerators: [0, 0],
            payout_denominator: 0,
        });
        tx.emit(ProtocolEvent::ConditionPrepared {
            condition_id,
            oracle: oracle.clone(),
            question_id: *question_id,
            outcome_slot_count,
        });
        Ok(condition_id)
    }

    /// Lock `amount` of the caller's collateral and mint `amount` of both legs to the caller.
    pub fn split_position<S: CtfStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        condition_id: &ConditionId,
        amount: u128,
    ) -> Result<()> {
        require_positive(amount)?;
        let condition = self.require_condition(&*tx.store, condition_id)?;
        if condition.resolved {
            return Err(ProtocolError::AlreadyResolved);
        }

        move_collateral(
            tx.collateral,
            amount,
            &env.caller,
            &self.principal,
            b"ctf-split",
        )?;

        for position_id in ids::position_ids(condition_id) {
            mint(tx.store, &env.caller, &position_id, amount)?;
        }
        let locked = checked_add(
            tx.store.collateral_locked(condition_id),
            amount,
            "collateral locked",
        )?;
        tx.store.set_collateral_locked(condition_id, locked);

        tx.emit(ProtocolEvent::PositionSplit {
            stakeholder: env.caller.clone(),
            condition_id: *condition_id,
            amount,
        });
        Ok(())
    }

    /// Burn `amount` of both of the caller's legs and release `amount` collateral to `recipient`.
    pub fn merge_positions<S: CtfStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        condition_id: &ConditionId,
        amount: u128,
        recipient: &Principal,
    ) -> Result<()> {
        require_positive(amount)?;
        self.require_condition(&*tx.store, condition_id)?;

        let legs = ids::position_ids(condition_id);
        for position_id in &legs {
            require_balance(&*tx.store, &env.caller, position_id, amount)?;
        }
        for position_id in &legs {
            burn(tx.store, &env.caller, position_id, amount)?;
        }
        let locked = checked_sub(
            tx.store.collateral_locked(condition_id),
            amount,
            "collateral locked",
        )?;
        tx.store.set_collateral_locked(condition_id, locked);

        move_collateral(
            tx.collateral,
            amount,
            &self.principal,
            recipient,
            b"ctf-merge",
        )?;

        tx.emit(ProtocolEvent::PositionsMerged {
            stakeholder: env.caller.clone(),
            condition_id: *condition_id,
            amount,
            recipient: recipient.clone(),
        });
        Ok(())
    }

    /// Move position tokens from `from` to `to`.
    ///
    /// The caller must be `from`, an operator approved by `from`, or a
    /// trusted caller. Contract recipients are refused unless trusted.
    pub fn safe_transfer_from<S: CtfStore, C>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        from: &Principal,
        to: &Principal,
        position_id: &PositionId,
        amount: u128,
    ) -> Result<()> {
        require_positive(amount)?;
        let caller = &env.caller;
        let authorized = caller == from
            || tx.store.is_approved(from, caller)
            || tx.store.is_trusted(caller);
        if !authorized {
            return Err(ProtocolError::NotAuthorized(format!(
                "{caller} may not transfer positions of {from}"
            )));
        }
        if from == to {
            return Err(ProtocolError::InvalidInput(
                "sender and recipient are the same".to_string(),
            ));
        }
        if to.is_contract() && !tx.store.is_trusted(to) {
            return Err(ProtocolError::InvalidInput(format!(
                "contract {to} cannot receive position tokens"
            )));
        }

        require_balance(&*tx.store, from, position_id, amount)?;
        let from_balance = tx.store.balance(from, position_id);
        tx.store.set_balance(from, position_id, from_balance - amount);
        let to_balance = checked_add(tx.store.balance(to, position_id), amount, "balance")?;
        tx.store.set_balance(to, position_id, to_balance);

        tx.emit(ProtocolEvent::TransferSingle {
            operator: caller.clone(),
            from: from.clone(),
            to: to.clone(),
            position_id: *position_id,
            amount,
        });
        Ok(())
    }

    pub fn set_approval_for_all<S: CtfStore, C>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        operator: &Principal,
        approved: bool,
    ) -> Result<()> {
        if operator == &env.caller {
            return Err(ProtocolError::InvalidInput(
                "cannot approve self as operator".to_string(),
            ));
        }
        tx.store.set_approved(&env.caller, operator, approved);
        tx.emit(ProtocolEvent::ApprovalForAll {
            owner: env.caller.clone(),
            operator: operator.clone(),
            approved,
        });
        Ok(())
    }

    /// Add or remove a caller from the transfer allow-list. Owner only.
    pub fn set_trusted_caller<S: CtfStore, C>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        caller: &Principal,
        trusted: bool,
    ) -> Result<()> {
        if env.caller != self.owner {
            return Err(ProtocolError::NotAuthorized(
                "only the owner manages trusted callers".to_string(),
            ));
        }
        tx.store.set_trusted(caller, trusted);
        tx.emit(ProtocolEvent::TrustedCallerSet {
            caller: caller.clone(),
            trusted,
        });
        Ok(())
    }

    /// Record the payout vector. Callable once, by the condition's oracle.
    pub fn report_payout<S: CtfStore, C>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        condition_id: &ConditionId,
        payout_numerators: [u128; 2],
    ) -> Result<()> {
        let mut condition = self.require_condition(&*tx.store, condition_id)?;
        if env.caller != condition.oracle {
            return Err(ProtocolError::NotAuthorized(format!(
                "{} is not the oracle of condition {condition_id}",
                env.caller
            )));
        }
        if condition.resolved {
            return Err(ProtocolError::AlreadyResolved);
        }
        let sum = checked_add(payout_numerators[0], payout_numerators[1], "payout sum")?;
        if sum != PAYOUT_DENOMINATOR {
            return Err(ProtocolError::InvalidInput(format!(
                "payout numerators {payout_numerators:?} must sum to {PAYOUT_DENOMINATOR}"
            )));
        }

        condition.resolved = true;
        condition.payout_numerators = payout_numerators;
        condition.payout_denominator = PAYOUT_DENOMINATOR;
        tx.store.put_condition(condition);

        tx.emit(ProtocolEvent::PayoutReported {
            condition_id: *condition_id,
            oracle: env.caller.clone(),
            payout_numerators,
        });
        Ok(())
    }

    /// Burn the caller's whole balance of one leg and pay its share of the collateral.
    ///
    /// Losing legs burn for a payout of zero. A zero balance is rejected, so a
    /// second redemption of the same leg fails instead of paying twice.
    pub fn redeem_positions<S: CtfStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        condition_id: &ConditionId,
        outcome: OutcomeIndex,
    ) -> Result<u128> {
        let condition = self.require_condition(&*tx.store, condition_id)?;
        if !condition.resolved {
            return Err(ProtocolError::NotResolved(format!(
                "condition {condition_id}"
            )));
        }

        let position_id = ids::position_id(condition_id, outcome);
        let balance = tx.store.balance(&env.caller, &position_id);
        if balance == 0 {
            return Err(ProtocolError::InsufficientBalance {
                needed: 1,
                available: 0,
            });
        }

        let payout = mul_div(
            balance,
            condition.payout_numerators[outcome.as_usize()],
            condition.payout_denominator,
        )?;
        burn(tx.store, &env.caller, &position_id, balance)?;
        let locked = checked_sub(
            tx.store.collateral_locked(condition_id),
            payout,
            "collateral locked",
        )?;
        tx.store.set_collateral_locked(condition_id, locked);

        move_collateral(
            tx.collateral,
            payout,
            &self.principal,
            &env.caller,
            b"ctf-redeem",
        )?;
        debug!(%condition_id, ?outcome, balance, payout, "positions redeemed");

        tx.emit(ProtocolEvent::PositionRedeemed {
            redeemer: env.caller.clone(),
            condition_id: *condition_id,
            outcome_index: outcome,
            burned: balance,
            payout,
        });
        Ok(payout)
    }

    pub fn get_condition<S: CtfStore>(
        &self,
        store: &S,
        condition_id: &ConditionId,
    ) -> Option<Condition> {
        store.condition(condition_id)
    }

    pub fn is_resolved<S: CtfStore>(&self, store: &S, condition_id: &ConditionId) -> bool {
        store
            .condition(condition_id)
            .map(|condition| condition.resolved)
            .unwrap_or(false)
    }

    /// Payout vector, once reported.
    pub fn get_payout_numerators<S: CtfStore>(
        &self,
        store: &S,
        condition_id: &ConditionId,
    ) -> Option<[u128; 2]> {
        store
            .condition(condition_id)
            .filter(|condition| condition.resolved)
            .map(|condition| condition.payout_numerators)
    }

    pub fn balance_of<S: CtfStore>(
        &self,
        store: &S,
        owner: &Principal,
        position_id: &PositionId,
    ) -> u128 {
        store.balance(owner, position_id)
    }

    pub fn total_supply<S: CtfStore>(&self, store: &S, position_id: &PositionId) -> u128 {
        store.total_supply(position_id)
    }

    pub fn collateral_locked<S: CtfStore>(&self, store: &S, condition_id: &ConditionId) -> u128 {
        store.collateral_locked(condition_id)
    }

    pub fn is_approved_for_all<S: CtfStore>(
        &self,
        store: &S,
        owner: &Principal,
        operator: &Principal,
    ) -> bool {
        store.is_approved(owner, operator)
    }

    pub fn is_trusted_caller<S: CtfStore>(&self, store: &S, caller: &Principal) -> bool {
        store.is_trusted(caller)
    }

    pub fn get_condition_id(
        oracle: &Principal,
        question_id: &QuestionId,
        outcome_slot_count: u128,
    ) -> ConditionId {
        ids::condition_id(oracle, question_id, outcome_slot_count)
    }

    pub fn get_position_id(condition_id: &ConditionId, outcome: OutcomeIndex) -> PositionId {
        ids::position_id(condition_id, outcome)
    }

    fn require_condition<S: CtfStore>(
        &self,
        store: &S,
        condition_id: &ConditionId,
    ) -> Result<Condition> {
        store
            .condition(condition_id)
            .ok_or_else(|| ProtocolError::NotFound(format!("condition {condition_id}")))
    }
}

fn require_positive(amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(ProtocolError::InvalidInput(
            "amount must be positive".to_string(),
        ));
    }
    Ok(())
}

fn require_balance<S: CtfStore>(
    store: &S,
    owner: &Principal,
    position_id: &PositionId,
    needed: u128,
) -> Result<()> {
    let available = store.balance(owner, position_id);
    if available < needed {
        return Err(ProtocolError::InsufficientBalance { needed, available });
    }
    Ok(())
}

fn mint<S: CtfStore>(
    store: &mut S,
    owner: &Principal,
    position_id: &PositionId,
    amount: u128,
) -> Result<()> {
    let balance = checked_add(store.balance(owner, position_id), amount, "balance")?;
    let supply = checked_add(store.total_supply(position_id), amount, "total supply")?;
    store.set_balance(owner, position_id, balance);
    store.set_total_supply(position_id, supply);
    Ok(())
}

fn burn<S: CtfStore>(
    store: &mut S,
    owner: &Principal,
    position_id: &PositionId,
    amount: u128,
) -> Result<()> {
    let balance = checked_sub(store.balance(owner, position_id), amount, "balance")?;
    let supply = checked_sub(store.total_supply(position_id), amount, "total supply")?;
    store.set_balance(owner, position_id, balance);
    store.set_total_supply(position_id, supply);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collateral::MemoryCollateral,
        store::MemoryStore,
        test_utils::{user, ALICE, BOB, CAROL},
    };

    struct Fixture {
        ctf: ConditionalTokens,
        store: MemoryStore,
        collateral: MemoryCollateral,
        oracle: Principal,
        condition_id: ConditionId,
    }

    impl Fixture {
        fn new() -> Self {
            let ctf = ConditionalTokens::new(user(0xde)).unwrap();
            let mut store = MemoryStore::new();
            let mut collateral = MemoryCollateral::new();
            for seed in [ALICE, BOB, CAROL] {
                collateral.mint(&user(seed), 1_000).unwrap();
            }
            let oracle = user(0x0a);
            let condition_id = {
                let mut tx = Tx::new(&mut store, &mut collateral);
                ctf.prepare_condition(&mut tx, &oracle, &QuestionId([1; 32]), 2)
                    .unwrap()
            };
            Self {
                ctf,
                store,
                collateral,
                oracle,
                condition_id,
            }
        }

        fn tx(&mut self) -> Tx<'_, MemoryStore, MemoryCollateral> {
            Tx::new(&mut self.store, &mut self.collateral)
        }

        fn env(seed: u8) -> Env {
            Env::new(user(seed), 1)
        }

        fn split(&mut self, seed: u8, amount: u128) -> Result<()> {
            let (ctf, id) = (self.ctf.clone(), self.condition_id);
            ctf.split_position(&mut self.tx(), &Self::env(seed), &id, amount)
        }

        fn report(&mut self, payout: [u128; 2]) -> Result<()> {
            let (ctf, id) = (self.ctf.clone(), self.condition_id);
            let env = Env::new(self.oracle.clone(), 1);
            ctf.report_payout(&mut self.tx(), &env, &id, payout)
        }

        fn redeem(&mut self, seed: u8, outcome: OutcomeIndex) -> Result<u128> {
            let (ctf, id) = (self.ctf.clone(), self.condition_id);
            ctf.redeem_positions(&mut self.tx(), &Self::env(seed), &id, outcome)
        }

        fn leg(&self, outcome: OutcomeIndex) -> PositionId {
            ids::position_id(&self.condition_id, outcome)
        }

        fn balance(&self, seed: u8, outcome: OutcomeIndex) -> u128 {
            self.store.balance(&user(seed), &self.leg(outcome))
        }
    }

    #[test]
    fn test_prepare_condition_rules() {
        let mut f = Fixture::new();
        let oracle = f.oracle.clone();
        let ctf = f.ctf.clone();
        let mut tx = f.tx();

        let duplicate = ctf.prepare_condition(&mut tx, &oracle, &QuestionId([1; 32]), 2);
        assert!(matches!(duplicate, Err(ProtocolError::AlreadyExists(_))));

        for bad in [0, 3] {
            let result = ctf.prepare_condition(&mut tx, &oracle, &QuestionId([2; 32]), bad);
            assert!(matches!(result, Err(ProtocolError::InvalidInput(_))));
        }

        let single = ctf
            .prepare_condition(&mut tx, &oracle, &QuestionId([2; 32]), 1)
            .unwrap();
        assert_eq!(
            single,
            ConditionalTokens::get_condition_id(&oracle, &QuestionId([2; 32]), 1)
        );
    }

    #[test]
    fn test_split_mints_both_legs_and_locks_collateral() {
        let mut f = Fixture::new();
        f.split(ALICE, 400).unwrap();

        assert_eq!(f.balance(ALICE, OutcomeIndex::Yes), 400);
        assert_eq!(f.balance(ALICE, OutcomeIndex::No), 400);
        assert_eq!(f.collateral.balance_of(&user(ALICE)), 600);
        assert_eq!(f.collateral.balance_of(f.ctf.principal()), 400);
        assert_eq!(f.store.collateral_locked(&f.condition_id), 400);
        assert_eq!(f.store.total_supply(&f.leg(OutcomeIndex::Yes)), 400);
    }

    #[test]
    fn test_split_failures() {
        let mut f = Fixture::new();
        assert!(matches!(
            f.split(ALICE, 0),
            Err(ProtocolError::InvalidInput(_))
        ));
        assert!(matches!(
            f.split(ALICE, 1_001),
            Err(ProtocolError::InsufficientCollateral { .. })
        ));

        let ctf = f.ctf.clone();
        let unknown = ConditionId([9; 32]);
        let result = ctf.split_position(&mut f.tx(), &Fixture::env(ALICE), &unknown, 1);
        assert!(matches!(result, Err(ProtocolError::NotFound(_))));

        f.report([1, 0]).unwrap();
        assert_eq!(f.split(ALICE, 1), Err(ProtocolError::AlreadyResolved));
    }

    #[test]
    fn test_merge_is_inverse_of_split() {
        let mut f = Fixture::new();
        f.split(ALICE, 500).unwrap();

        let (ctf, id) = (f.ctf.clone(), f.condition_id);
        ctf.merge_positions(&mut f.tx(), &Fixture::env(ALICE), &id, 200, &user(BOB))
            .unwrap();

        assert_eq!(f.balance(ALICE, OutcomeIndex::Yes), 300);
        assert_eq!(f.balance(ALICE, OutcomeIndex::No), 300);
        assert_eq!(f.collateral.balance_of(&user(BOB)), 1_200);
        assert_eq!(f.store.collateral_locked(&id), 300);
        assert_eq!(f.store.total_supply(&f.leg(OutcomeIndex::No)), 300);
    }

    #[test]
    fn test_merge_requires_both_legs() {
        let mut f = Fixture::new();
        f.split(ALICE, 100).unwrap();
        let (ctf, id) = (f.ctf.clone(), f.condition_id);
        let yes = f.leg(OutcomeIndex::Yes);
        ctf.safe_transfer_from(
            &mut f.tx(),
            &Fixture::env(ALICE),
            &user(ALICE),
            &user(BOB),
            &yes,
            1,
        )
        .unwrap();

        let result =
            ctf.merge_positions(&mut f.tx(), &Fixture::env(ALICE), &id, 100, &user(ALICE));
        assert_eq!(
            result,
            Err(ProtocolError::InsufficientBalance {
                needed: 100,
                available: 99
            })
        );
        assert_eq!(f.balance(ALICE, OutcomeIndex::No), 100);
    }

    #[test]
    fn test_transfer_authorization() {
        let mut f = Fixture::new();
        f.split(ALICE, 100).unwrap();
        let ctf = f.ctf.clone();
        let yes = f.leg(OutcomeIndex::Yes);

        let stranger = ctf.safe_transfer_from(
            &mut f.tx(),
            &Fixture::env(BOB),
            &user(ALICE),
            &user(BOB),
            &yes,
            10,
        );
        assert!(matches!(stranger, Err(ProtocolError::NotAuthorized(_))));

        ctf.set_approval_for_all(&mut f.tx(), &Fixture::env(ALICE), &user(BOB), true)
            .unwrap();
        ctf.safe_transfer_from(
            &mut f.tx(),
            &Fixture::env(BOB),
            &user(ALICE),
            &user(CAROL),
            &yes,
            10,
        )
        .unwrap();
        assert_eq!(f.balance(CAROL, OutcomeIndex::Yes), 10);

        let self_approval =
            ctf.set_approval_for_all(&mut f.tx(), &Fixture::env(ALICE), &user(ALICE), true);
        assert!(matches!(self_approval, Err(ProtocolError::InvalidInput(_))));
    }

    #[test]
    fn test_trusted_callers_and_contract_recipients() {
        let mut f = Fixture::new();
        f.split(ALICE, 100).unwrap();
        let ctf = f.ctf.clone();
        let yes = f.leg(OutcomeIndex::Yes);
        let vault = Principal::contract(&user(0xde), "vault").unwrap();

        let to_contract = ctf.safe_transfer_from(
            &mut f.tx(),
            &Fixture::env(ALICE),
            &user(ALICE),
            &vault,
            &yes,
            5,
        );
        assert!(matches!(to_contract, Err(ProtocolError::InvalidInput(_))));

        let not_owner = ctf.set_trusted_caller(&mut f.tx(), &Fixture::env(ALICE), &vault, true);
        assert!(matches!(not_owner, Err(ProtocolError::NotAuthorized(_))));

        ctf.set_trusted_caller(&mut f.tx(), &Env::new(user(0xde), 1), &vault, true)
            .unwrap();
        // a trusted contract may both receive and move anyone's positions
        ctf.safe_transfer_from(
            &mut f.tx(),
            &Fixture::env(ALICE),
            &user(ALICE),
            &vault,
            &yes,
            5,
        )
        .unwrap();
        ctf.safe_transfer_from(
            &mut f.tx(),
            &Env::new(vault.clone(), 1),
            &user(ALICE),
            &user(BOB),
            &yes,
            5,
        )
        .unwrap();
        assert_eq!(f.store.balance(&vault, &yes), 5);
        assert_eq!(f.balance(BOB, OutcomeIndex::Yes), 5);
        assert_eq!(f.balance(ALICE, OutcomeIndex::Yes), 90);
    }

    #[test]
    fn test_report_payout_rules() {
        let mut f = Fixture::new();
        let (ctf, id) = (f.ctf.clone(), f.condition_id);

        let stranger = ctf.report_payout(&mut f.tx(), &Fixture::env(ALICE), &id, [1, 0]);
        assert!(matches!(stranger, Err(ProtocolError::NotAuthorized(_))));

        for bad in [[1, 1], [0, 0], [2, 0]] {
            assert!(matches!(f.report(bad), Err(ProtocolError::InvalidInput(_))));
        }

        f.report([0, 1]).unwrap();
        assert_eq!(f.report([1, 0]), Err(ProtocolError::AlreadyResolved));
        assert_eq!(f.ctf.get_payout_numerators(&f.store, &id), Some([0, 1]));
        assert!(f.ctf.is_resolved(&f.store, &id));
    }

    #[test]
    fn test_redeem_pays_winners_and_burns_losers() {
        let mut f = Fixture::new();
        f.split(ALICE, 300).unwrap();
        f.split(BOB, 200).unwrap();

        assert!(matches!(
            f.redeem(ALICE, OutcomeIndex::Yes),
            Err(ProtocolError::NotResolved(_))
        ));

        f.report([1, 0]).unwrap();
        assert_eq!(f.redeem(ALICE, OutcomeIndex::Yes).unwrap(), 300);
        assert_eq!(f.redeem(ALICE, OutcomeIndex::No).unwrap(), 0);
        assert_eq!(f.balance(ALICE, OutcomeIndex::Yes), 0);
        assert_eq!(f.balance(ALICE, OutcomeIndex::No), 0);
        assert_eq!(f.collateral.balance_of(&user(ALICE)), 1_000);

        // a spent balance cannot be redeemed again
        assert_eq!(
            f.redeem(ALICE, OutcomeIndex::Yes),
            Err(ProtocolError::InsufficientBalance {
                needed: 1,
                available: 0
            })
        );

        assert_eq!(f.redeem(BOB, OutcomeIndex::Yes).unwrap(), 200);
        assert_eq!(f.store.collateral_locked(&f.condition_id), 0);
        assert_eq!(f.collateral.balance_of(f.ctf.principal()), 0);
    }

    #[test]
    fn test_conservation_across_split_merge_redeem() {
        let mut f = Fixture::new();
        f.split(ALICE, 700).unwrap();
        f.split(BOB, 300).unwrap();
        let (ctf, id) = (f.ctf.clone(), f.condition_id);
        ctf.merge_positions(&mut f.tx(), &Fixture::env(BOB), &id, 100, &user(BOB))
            .unwrap();

        let [yes, no] = ids::position_ids(&id);
        let locked = f.store.collateral_locked(&id);
        assert_eq!(locked, 900);
        assert_eq!(f.store.total_supply(&yes), locked);
        assert_eq!(f.store.total_supply(&no), locked);
        assert_eq!(f.collateral.balance_of(f.ctf.principal()), locked);

        f.report([0, 1]).unwrap();
        let paid =
            f.redeem(ALICE, OutcomeIndex::No).unwrap() + f.redeem(BOB, OutcomeIndex::No).unwrap();
        assert_eq!(paid, 900);
        assert_eq!(f.store.total_supply(&no), 0);
        assert_eq!(f.store.collateral_locked(&id), 0);
    }
}
