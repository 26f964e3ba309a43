//! Common test utilities for predictr-core tests.
//!
//! Deterministic key pairs and principals, a funded in-memory protocol and
//! order-signing helpers shared across module tests.

use crate::{
    collateral::MemoryCollateral,
    config::ProtocolConfig,
    exchange::{Order, SignedOrder},
    principal::{Network, Principal},
    protocol::Protocol,
    signature::sign_hash,
    store::MemoryStore,
};
use secp256k1::{PublicKey, Secp256k1, SecretKey};

/// Key seeds of the usual test participants
pub const ALICE: u8 = 0x01;
pub const BOB: u8 = 0x02;
pub const CAROL: u8 = 0x03;
pub const DAVE: u8 = 0x04;
/// Key seed of the principal deploying every component
pub const DEPLOYER: u8 = 0xde;

/// Collateral minted to each participant by [`funded_protocol`]
pub const FUNDING: u128 = 1_000_000_000;

/// Deterministic secp256k1 key pair for `seed` (must be non-zero).
pub fn keypair(seed: u8) -> (SecretKey, PublicKey) {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(&[seed; 32]).unwrap();
    let public_key = PublicKey::from_secret_key(&secp, &secret_key);
    (secret_key, public_key)
}

/// Testnet principal controlled by the key for `seed`.
pub fn user(seed: u8) -> Principal {
    Principal::from_public_key(Network::Testnet, &keypair(seed).1)
}

/// Sign `order` with the key for `seed`.
pub fn sign_order(seed: u8, order: Order) -> SignedOrder {
    let signature = sign_hash(&keypair(seed).0, order.hash().as_bytes());
    SignedOrder {
        order,
        signature: signature.to_vec(),
    }
}

/// Protocol deployed by [`DEPLOYER`] with default configuration.
pub fn test_protocol() -> Protocol {
    Protocol::new(
        ProtocolConfig::default(),
        user(DEPLOYER),
        MemoryStore::new(),
        MemoryCollateral::new(),
    )
    .unwrap()
}

/// [`test_protocol`] with [`FUNDING`] minted to Alice, Bob, Carol and Dave.
pub fn funded_protocol() -> Protocol {
    let mut protocol = test_protocol();
    for seed in [ALICE, BOB, CAROL, DAVE] {
        protocol.collateral_mut().mint(&user(seed), FUNDING).unwrap();
    }
    protocol
}
