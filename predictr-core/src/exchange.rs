//! # Settlement Exchange
//!
//! Settles orders matched off-chain. Makers sign the hash of an [`Order`];
//! the exchange checks the signature, the fill cap and the expiry, then moves
//! position tokens through the conditional-token engine as a trusted caller.
//!
//! Three settlement modes:
//!
//! - [`Exchange::fill_order`]: a taker swaps one position leg for another
//!   against a resting maker order.
//! - [`Exchange::fill_order_mint`]: two buyers of opposite legs fund a fresh
//!   split out of their escrowed collateral.
//! - [`Exchange::fill_order_merge`]: two sellers of opposite legs merge them
//!   back into collateral and share the proceeds.
//!
//! The order hash does not bind the taker, so any taker may fill a resting
//! order:
//!
//! ```text
//! order_hash = SHA256(principal(maker) || maker_position_id[32] || taker_position_id[32]
//!                     || u128_be(maker_amount) || u128_be(taker_amount)
//!                     || u128_be(salt) || u64_be(expiration))
//! ```

use crate::{
    collateral::{move_collateral, CollateralToken},
    config::ProtocolConfig,
    ctf::ConditionalTokens,
    error::Result,
    event::ProtocolEvent,
    ids::{self, ConditionId, OrderHash, OutcomeIndex, PositionId},
    ledger::{Env, Tx},
    principal::{Network, Principal},
    signature::{SignatureVerifier, SIGNATURE_LEN},
    store::{CtfStore, ExchangeStore},
    utils::{checked_add, checked_sub, fee_for, mul_div, sha256_concat, u128_be, u64_be},
    ProtocolError,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::debug;

/// Contract name of the exchange under its deployer
pub const EXCHANGE_CONTRACT_NAME: &str = "ctf-exchange";

/// A maker's offer: `maker_amount` of `maker_position_id` for `taker_amount`
/// of `taker_position_id`. [`PositionId::COLLATERAL`] stands for collateral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub maker: Principal,
    pub maker_position_id: PositionId,
    pub taker_position_id: PositionId,
    pub maker_amount: u128,
    pub taker_amount: u128,
    pub salt: u128,
    /// Last block height at which the order can be filled
    pub expiration: u64,
}

impl Order {
    pub fn hash(&self) -> OrderHash {
        OrderHash(sha256_concat(&[
            &self.maker.canonical_bytes(),
            self.maker_position_id.as_bytes(),
            self.taker_position_id.as_bytes(),
            &u128_be(self.maker_amount),
            &u128_be(self.taker_amount),
            &u128_be(self.salt),
            &u64_be(self.expiration),
        ]))
    }
}

/// An order with the maker's 65-byte recoverable signature over [`Order::hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
    pub order: Order,
    pub signature: Vec<u8>,
}

/// Outcome of a single-order fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub order_hash: OrderHash,
    pub fill_amount: u128,
    /// Taker leg paid in total, fee included
    pub taker_paid: u128,
    pub fee: u128,
}

#[derive(Clone)]
pub struct Exchange {
    principal: Principal,
    owner: Principal,
    fee_bps: u32,
    network: Network,
    verifier: Arc<dyn SignatureVerifier>,
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("principal", &self.principal)
            .field("owner", &self.owner)
            .field("fee_bps", &self.fee_bps)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl Exchange {
    /// Deploy the exchange under `owner`.
    pub fn new(
        owner: Principal,
        config: &ProtocolConfig,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            principal: Principal::contract(&owner, EXCHANGE_CONTRACT_NAME)?,
            owner,
            fee_bps: config.fee_bps,
            network: config.network,
            verifier,
        })
    }

    /// Contract principal custodying escrow and in-flight legs
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// Fill `fill_amount` of a maker order. The caller must be `taker`.
    ///
    /// The maker delivers `fill_amount` of their leg; the taker pays the
    /// proportional amount of theirs, of which the fee goes to the fee
    /// receiver.
    pub fn fill_order<S, C>(
        &self,
        ctf: &ConditionalTokens,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        signed: &SignedOrder,
        taker: &Principal,
        fill_amount: u128,
    ) -> Result<Fill>
    where
        S: CtfStore + ExchangeStore,
    {
        self.require_not_paused(&*tx.store)?;
        let order = &signed.order;
        if !taker.is_well_formed(self.network) {
            return Err(ProtocolError::InvalidInput(format!(
                "malformed taker {taker}"
            )));
        }
        if order.maker_position_id.is_collateral() || order.taker_position_id.is_collateral() {
            return Err(ProtocolError::InvalidInput(
                "collateral orders settle through mint or merge".to_string(),
            ));
        }
        if order.maker_position_id == order.taker_position_id {
            return Err(ProtocolError::InvalidInput(
                "maker and taker positions are the same".to_string(),
            ));
        }
        if &order.maker == taker {
            return Err(ProtocolError::InvalidInput(
                "maker cannot fill their own order".to_string(),
            ));
        }
        let order_hash = self.check_order(&*tx.store, env, signed, fill_amount)?;
        if &env.caller != taker {
            return Err(ProtocolError::NotAuthorized(format!(
                "{} cannot fill on behalf of {taker}",
                env.caller
            )));
        }

        let taker_paid = mul_div(order.taker_amount, fill_amount, order.maker_amount)?;
        if taker_paid == 0 {
            return Err(ProtocolError::InvalidInput(
                "fill amount too small for the order price".to_string(),
            ));
        }
        let fee = fee_for(taker_paid, self.fee_bps)?;

        require_position(&*tx.store, &order.maker, &order.maker_position_id, fill_amount)?;
        require_position(&*tx.store, taker, &order.taker_position_id, taker_paid)?;

        let nested = env.call_from(&self.principal);
        ctf.safe_transfer_from(
            tx,
            &nested,
            &order.maker,
            taker,
            &order.maker_position_id,
            fill_amount,
        )?;
        let to_maker = checked_sub(taker_paid, fee, "taker payment")?;
        if to_maker > 0 {
            ctf.safe_transfer_from(
                tx,
                &nested,
                taker,
                &order.maker,
                &order.taker_position_id,
                to_maker,
            )?;
        }
        let fee_receiver = self.get_fee_receiver(&*tx.store);
        if fee > 0 && &fee_receiver != taker {
            ctf.safe_transfer_from(
                tx,
                &nested,
                taker,
                &fee_receiver,
                &order.taker_position_id,
                fee,
            )?;
        }

        self.record_fill(tx.store, &order_hash, fill_amount)?;
        tx.emit(ProtocolEvent::OrderFilled {
            order_hash,
            maker: order.maker.clone(),
            taker: taker.clone(),
            fill_amount,
            taker_paid,
            fee,
        });
        Ok(Fill {
            order_hash,
            fill_amount,
            taker_paid,
            fee,
        })
    }

    /// Match two buy orders for opposite legs of `condition_id` by minting.
    ///
    /// Both orders offer collateral for a leg. Each buyer pays
    /// `maker_amount * fill_amount / taker_amount` out of escrow; together
    /// they must cover the split plus the fee. The overage is credited back
    /// to the first buyer's escrow. Returns the refund.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_order_mint<S, C>(
        &self,
        ctf: &ConditionalTokens,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        first: &SignedOrder,
        second: &SignedOrder,
        condition_id: &ConditionId,
        fill_amount: u128,
    ) -> Result<u128>
    where
        S: CtfStore + ExchangeStore,
        C: CollateralToken,
    {
        self.require_not_paused(&*tx.store)?;
        require_positive(fill_amount)?;
        let (buyer_1, buyer_2) = (&first.order.maker, &second.order.maker);
        if buyer_1 == buyer_2 {
            return Err(ProtocolError::InvalidInput(
                "mint requires two distinct buyers".to_string(),
            ));
        }
        for signed in [first, second] {
            if !signed.order.maker_position_id.is_collateral() {
                return Err(ProtocolError::InvalidInput(
                    "mint orders must offer collateral".to_string(),
                ));
            }
        }
        let yes_first = match_legs(
            condition_id,
            &first.order.taker_position_id,
            &second.order.taker_position_id,
        )?;

        let payment_1 = mul_div(first.order.maker_amount, fill_amount, first.order.taker_amount)?;
        let payment_2 = mul_div(second.order.maker_amount, fill_amount, second.order.taker_amount)?;
        let hash_1 = self.check_order(&*tx.store, env, first, payment_1)?;
        let hash_2 = self.check_order(&*tx.store, env, second, payment_2)?;

        let fee = fee_for(fill_amount, self.fee_bps)?;
        let collected = checked_add(payment_1, payment_2, "mint payments")?;
        let required = checked_add(fill_amount, fee, "mint cost")?;
        if collected < required {
            return Err(ProtocolError::InsufficientCollateral {
                needed: required,
                available: collected,
            });
        }
        let refund = collected - required;

        self.debit_escrow(tx.store, buyer_1, payment_1)?;
        self.debit_escrow(tx.store, buyer_2, payment_2)?;

        let nested = env.call_from(&self.principal);
        ctf.split_position(tx, &nested, condition_id, fill_amount)?;
        let [yes, no] = ids::position_ids(condition_id);
        let (buyer_yes, buyer_no) = if yes_first {
            (buyer_1, buyer_2)
        } else {
            (buyer_2, buyer_1)
        };
        ctf.safe_transfer_from(tx, &nested, &self.principal, buyer_yes, &yes, fill_amount)?;
        ctf.safe_transfer_from(tx, &nested, &self.principal, buyer_no, &no, fill_amount)?;

        let fee_receiver = self.get_fee_receiver(&*tx.store);
        move_collateral(
            tx.collateral,
            fee,
            &self.principal,
            &fee_receiver,
            b"exchange-fee",
        )?;
        if refund > 0 {
            let balance = checked_add(tx.store.escrow(buyer_1), refund, "escrow")?;
            tx.store.set_escrow(buyer_1, balance);
        }

        self.record_fill(tx.store, &hash_1, payment_1)?;
        self.record_fill(tx.store, &hash_2, payment_2)?;
        debug!(%condition_id, payment_1, payment_2, fee, refund, "mint match settled");
        tx.emit(ProtocolEvent::OrdersMatchedMint {
            condition_id: *condition_id,
            buyer_yes: buyer_yes.clone(),
            buyer_no: buyer_no.clone(),
            fill_amount,
            fee,
            refund,
        });
        Ok(refund)
    }

    /// Match two sell orders for opposite legs of `condition_id` by merging.
    ///
    /// Both orders offer a leg for collateral. `fill_amount` of each leg is
    /// pulled into the exchange and merged; the recovered collateral minus
    /// the fee is shared in proportion to each order's quoted price. The
    /// quotes together must fit in that amount, so no seller is paid below
    /// their ask. Returns the two sellers' payouts in order.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_order_merge<S, C>(
        &self,
        ctf: &ConditionalTokens,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        first: &SignedOrder,
        second: &SignedOrder,
        condition_id: &ConditionId,
        fill_amount: u128,
    ) -> Result<[u128; 2]>
    where
        S: CtfStore + ExchangeStore,
        C: CollateralToken,
    {
        self.require_not_paused(&*tx.store)?;
        require_positive(fill_amount)?;
        let (seller_1, seller_2) = (&first.order.maker, &second.order.maker);
        if seller_1 == seller_2 {
            return Err(ProtocolError::InvalidInput(
                "merge requires two distinct sellers".to_string(),
            ));
        }
        for signed in [first, second] {
            if !signed.order.taker_position_id.is_collateral() {
                return Err(ProtocolError::InvalidInput(
                    "merge orders must ask for collateral".to_string(),
                ));
            }
        }
        let yes_first = match_legs(
            condition_id,
            &first.order.maker_position_id,
            &second.order.maker_position_id,
        )?;

        let hash_1 = self.check_order(&*tx.store, env, first, fill_amount)?;
        let hash_2 = self.check_order(&*tx.store, env, second, fill_amount)?;
        require_position(&*tx.store, seller_1, &first.order.maker_position_id, fill_amount)?;
        require_position(&*tx.store, seller_2, &second.order.maker_position_id, fill_amount)?;

        let quote_1 = mul_div(first.order.taker_amount, fill_amount, first.order.maker_amount)?;
        let quote_2 = mul_div(second.order.taker_amount, fill_amount, second.order.maker_amount)?;
        let quoted = checked_add(quote_1, quote_2, "merge quotes")?;
        if quoted == 0 {
            return Err(ProtocolError::InvalidInput(
                "fill amount too small for the order prices".to_string(),
            ));
        }
        // every seller must receive at least their signed ask
        let fee = fee_for(fill_amount, self.fee_bps)?;
        let distributable = checked_sub(fill_amount, fee, "merge proceeds")?;
        if quoted > distributable {
            return Err(ProtocolError::InsufficientCollateral {
                needed: quoted,
                available: distributable,
            });
        }

        let nested = env.call_from(&self.principal);
        for signed in [first, second] {
            ctf.safe_transfer_from(
                tx,
                &nested,
                &signed.order.maker,
                &self.principal,
                &signed.order.maker_position_id,
                fill_amount,
            )?;
        }
        ctf.merge_positions(tx, &nested, condition_id, fill_amount, &self.principal)?;

        let payout_1 = mul_div(distributable, quote_1, quoted)?;
        let payout_2 = distributable - payout_1;

        let fee_receiver = self.get_fee_receiver(&*tx.store);
        move_collateral(
            tx.collateral,
            fee,
            &self.principal,
            &fee_receiver,
            b"exchange-fee",
        )?;
        move_collateral(
            tx.collateral,
            payout_1,
            &self.principal,
            seller_1,
            b"exchange-merge-payout",
        )?;
        move_collateral(
            tx.collateral,
            payout_2,
            &self.principal,
            seller_2,
            b"exchange-merge-payout",
        )?;

        self.record_fill(tx.store, &hash_1, fill_amount)?;
        self.record_fill(tx.store, &hash_2, fill_amount)?;
        let (seller_yes, seller_no) = if yes_first {
            (seller_1, seller_2)
        } else {
            (seller_2, seller_1)
        };
        tx.emit(ProtocolEvent::OrdersMatchedMerge {
            condition_id: *condition_id,
            seller_yes: seller_yes.clone(),
            seller_no: seller_no.clone(),
            fill_amount,
            fee,
        });
        Ok([payout_1, payout_2])
    }

    /// Block future fills of `order`. Only the maker may cancel.
    pub fn cancel_order<S: ExchangeStore, C>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        order: &Order,
    ) -> Result<OrderHash> {
        if env.caller != order.maker {
            return Err(ProtocolError::NotAuthorized(
                "only the maker can cancel an order".to_string(),
            ));
        }
        let order_hash = order.hash();
        if tx.store.is_cancelled(&order_hash) {
            return Err(ProtocolError::AlreadyCancelled);
        }
        tx.store.set_cancelled(&order_hash);
        tx.emit(ProtocolEvent::OrderCancelled {
            order_hash,
            maker: order.maker.clone(),
        });
        Ok(order_hash)
    }

    /// Move collateral from the caller into their exchange escrow.
    pub fn deposit_collateral<S: ExchangeStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        amount: u128,
    ) -> Result<()> {
        require_positive(amount)?;
        move_collateral(
            tx.collateral,
            amount,
            &env.caller,
            &self.principal,
            b"exchange-deposit",
        )?;
        let balance = checked_add(tx.store.escrow(&env.caller), amount, "escrow")?;
        tx.store.set_escrow(&env.caller, balance);
        tx.emit(ProtocolEvent::CollateralDeposited {
            owner: env.caller.clone(),
            amount,
        });
        Ok(())
    }

    pub fn withdraw_collateral<S: ExchangeStore, C: CollateralToken>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        amount: u128,
    ) -> Result<()> {
        require_positive(amount)?;
        self.debit_escrow(tx.store, &env.caller, amount)?;
        move_collateral(
            tx.collateral,
            amount,
            &self.principal,
            &env.caller,
            b"exchange-withdraw",
        )?;
        tx.emit(ProtocolEvent::CollateralWithdrawn {
            owner: env.caller.clone(),
            amount,
        });
        Ok(())
    }

    pub fn set_paused<S: ExchangeStore, C>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        paused: bool,
    ) -> Result<()> {
        self.require_owner(env)?;
        tx.store.set_paused(paused);
        tx.emit(ProtocolEvent::PausedSet { paused });
        Ok(())
    }

    pub fn set_fee_receiver<S: ExchangeStore, C>(
        &self,
        tx: &mut Tx<'_, S, C>,
        env: &Env,
        receiver: &Principal,
    ) -> Result<()> {
        self.require_owner(env)?;
        if !receiver.is_well_formed(self.network) {
            return Err(ProtocolError::InvalidInput(format!(
                "malformed fee receiver {receiver}"
            )));
        }
        tx.store.set_fee_receiver(receiver.clone());
        tx.emit(ProtocolEvent::FeeReceiverSet {
            receiver: receiver.clone(),
        });
        Ok(())
    }

    pub fn get_filled_amount<S: ExchangeStore>(&self, store: &S, order_hash: &OrderHash) -> u128 {
        store.filled(order_hash)
    }

    pub fn is_cancelled<S: ExchangeStore>(&self, store: &S, order_hash: &OrderHash) -> bool {
        store.is_cancelled(order_hash)
    }

    /// Maker amount still fillable; zero once cancelled.
    pub fn get_remaining_amount<S: ExchangeStore>(&self, store: &S, order: &Order) -> u128 {
        let order_hash = order.hash();
        if store.is_cancelled(&order_hash) {
            return 0;
        }
        order.maker_amount.saturating_sub(store.filled(&order_hash))
    }

    pub fn get_escrow_balance<S: ExchangeStore>(&self, store: &S, owner: &Principal) -> u128 {
        store.escrow(owner)
    }

    pub fn is_paused<S: ExchangeStore>(&self, store: &S) -> bool {
        store.is_paused()
    }

    /// Current fee receiver; the owner until one is set.
    pub fn get_fee_receiver<S: ExchangeStore>(&self, store: &S) -> Principal {
        store.fee_receiver().unwrap_or_else(|| self.owner.clone())
    }

    pub fn hash_order(order: &Order) -> OrderHash {
        order.hash()
    }

    /// Validate a signed order for a fill of `amount` maker units.
    fn check_order<S: ExchangeStore>(
        &self,
        store: &S,
        env: &Env,
        signed: &SignedOrder,
        amount: u128,
    ) -> Result<OrderHash> {
        let order = &signed.order;
        if !order.maker.is_well_formed(self.network) || order.maker.is_contract() {
            return Err(ProtocolError::InvalidInput(format!(
                "malformed maker {}",
                order.maker
            )));
        }
        if signed.signature.len() != SIGNATURE_LEN {
            return Err(ProtocolError::InvalidInput(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                signed.signature.len()
            )));
        }
        if order.maker_amount == 0 || order.taker_amount == 0 || amount == 0 {
            return Err(ProtocolError::InvalidInput(
                "order amounts must be positive".to_string(),
            ));
        }
        if amount > order.maker_amount {
            return Err(ProtocolError::InvalidInput(format!(
                "fill of {amount} exceeds maker amount {}",
                order.maker_amount
            )));
        }
        if env.block_height > order.expiration {
            return Err(ProtocolError::OrderExpired(order.expiration));
        }

        let order_hash = order.hash();
        if store.is_cancelled(&order_hash) {
            return Err(ProtocolError::AlreadyCancelled);
        }
        let remaining = order.maker_amount.saturating_sub(store.filled(&order_hash));
        if amount > remaining {
            return Err(ProtocolError::OrderFilled {
                requested: amount,
                remaining,
            });
        }
        if !self
            .verifier
            .verify(order_hash.as_bytes(), &signed.signature, &order.maker)
        {
            debug!(%order_hash, maker = %order.maker, "order signature rejected");
            return Err(ProtocolError::InvalidSignature);
        }
        Ok(order_hash)
    }

    fn record_fill<S: ExchangeStore>(
        &self,
        store: &mut S,
        order_hash: &OrderHash,
        amount: u128,
    ) -> Result<()> {
        let filled = checked_add(store.filled(order_hash), amount, "filled amount")?;
        store.set_filled(order_hash, filled);
        Ok(())
    }

    fn debit_escrow<S: ExchangeStore>(
        &self,
        store: &mut S,
        owner: &Principal,
        amount: u128,
    ) -> Result<()> {
        let available = store.escrow(owner);
        if available < amount {
            return Err(ProtocolError::InsufficientCollateral {
                needed: amount,
                available,
            });
        }
        store.set_escrow(owner, checked_sub(available, amount, "escrow")?);
        Ok(())
    }

    fn require_not_paused<S: ExchangeStore>(&self, store: &S) -> Result<()> {
        if store.is_paused() {
            return Err(ProtocolError::Paused);
        }
        Ok(())
    }

    fn require_owner(&self, env: &Env) -> Result<()> {
        if env.caller != self.owner {
            return Err(ProtocolError::NotAuthorized(
                "only the exchange owner".to_string(),
            ));
        }
        Ok(())
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

fn require_position<S: CtfStore>(
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

/// Check that `first` and `second` are the two legs of `condition_id`.
/// Returns true when `first` is the Yes leg.
fn match_legs(condition_id: &ConditionId, first: &PositionId, second: &PositionId) -> Result<bool> {
    let yes = ids::position_id(condition_id, OutcomeIndex::Yes);
    let no = ids::position_id(condition_id, OutcomeIndex::No);
    match (first, second) {
        (a, b) if *a == yes && *b == no => Ok(true),
        (a, b) if *a == no && *b == yes => Ok(false),
        _ => Err(ProtocolError::InvalidInput(format!(
            "orders must cover opposite legs of condition {condition_id}"
        ))),
    }
}
