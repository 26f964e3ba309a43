//! # Collateral token
//!
//! The fungible token that backs every position. The protocol only consumes
//! the interface below; [`MemoryCollateral`] is an in-memory ledger used as
//! the default backing and in tests.

use crate::{error::Result, principal::Principal, ProtocolError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fungible-token transfer interface consumed by the CTF and the exchange.
///
/// Implementations must accept contract principals as both sender and
/// recipient so components can hold escrow. `Clone` lets the protocol stage
/// a transaction on a copy and commit it whole.
pub trait CollateralToken: Clone {
    /// Move `amount` from `from` to `to`. `Ok(false)` is a rejection.
    fn transfer(
        &mut self,
        amount: u128,
        from: &Principal,
        to: &Principal,
        memo: Option<&[u8]>,
    ) -> Result<bool>;

    fn balance_of(&self, who: &Principal) -> u128;
}

/// Move collateral, mapping a rejection to [`ProtocolError::TransferFailed`].
/// Zero amounts are a no-op.
pub(crate) fn move_collateral<C: CollateralToken>(
    token: &mut C,
    amount: u128,
    from: &Principal,
    to: &Principal,
    memo: &[u8],
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }
    let available = token.balance_of(from);
    if available < amount {
        return Err(ProtocolError::InsufficientCollateral {
            needed: amount,
            available,
        });
    }
    match token.transfer(amount, from, to, Some(memo))? {
        true => Ok(()),
        false => Err(ProtocolError::TransferFailed(format!(
            "collateral transfer of {amount} from {from} to {to} rejected"
        ))),
    }
}

/// In-memory fungible token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCollateral {
    balances: BTreeMap<Principal, u128>,
    total_supply: u128,
}

impl MemoryCollateral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit freshly issued units to `to`.
    pub fn mint(&mut self, to: &Principal, amount: u128) -> Result<()> {
        let balance = self.balances.entry(to.clone()).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(ProtocolError::Overflow("collateral mint"))?;
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(ProtocolError::Overflow("collateral supply"))?;
        Ok(())
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }
}

impl CollateralToken for MemoryCollateral {
    fn transfer(
        &mut self,
        amount: u128,
        from: &Principal,
        to: &Principal,
        _memo: Option<&[u8]>,
    ) -> Result<bool> {
        if amount == 0 {
            return Err(ProtocolError::InvalidInput(
                "transfer amount must be positive".to_string(),
            ));
        }
        if from == to {
            return Err(ProtocolError::InvalidInput(
                "sender and recipient are the same".to_string(),
            ));
        }
        let available = self.balance_of(from);
        if available < amount {
            return Ok(false);
        }
        self.balances.insert(from.clone(), available - amount);
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(ProtocolError::Overflow("collateral transfer"))?;
        self.balances.insert(to.clone(), credited);
        Ok(true)
    }

    fn balance_of(&self, who: &Principal) -> u128 {
        self.balances.get(who).copied().unwrap_or_default()
    }
}
