//! Call environment and transaction context shared by every component.

use crate::{event::ProtocolEvent, principal::Principal};

/// Who is calling, and at which block.
///
/// `sender` is the transaction origin and survives contract-to-contract
/// calls. `caller` is the immediate caller: a user for direct calls, a
/// component's contract principal when one component calls another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Env {
    pub sender: Principal,
    pub caller: Principal,
    pub block_height: u64,
}

impl Env {
    /// Direct call from `sender`.
    pub fn new(sender: Principal, block_height: u64) -> Self {
        Self {
            caller: sender.clone(),
            sender,
            block_height,
        }
    }

    /// Nested call made by `contract` on behalf of the current origin.
    pub fn call_from(&self, contract: &Principal) -> Self {
        Self {
            sender: self.sender.clone(),
            caller: contract.clone(),
            block_height: self.block_height,
        }
    }

    /// Nested call where `contract` acts with its own authority.
    pub fn as_contract(&self, contract: &Principal) -> Self {
        Self {
            sender: contract.clone(),
            caller: contract.clone(),
            block_height: self.block_height,
        }
    }
}

/// Mutable view of the ledger for one transaction.
///
/// Components mutate `store` and `collateral` through it and record events
/// with [`Tx::emit`]. The owner of the transaction decides whether the
/// staged state and events are committed.
pub struct Tx<'a, S, C> {
    pub store: &'a mut S,
    pub collateral: &'a mut C,
    events: Vec<ProtocolEvent>,
}

impl<'a, S, C> Tx<'a, S, C> {
    pub fn new(store: &'a mut S, collateral: &'a mut C) -> Self {
        Self {
            store,
            collateral,
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ProtocolEvent> {
        self.events
    }
}
