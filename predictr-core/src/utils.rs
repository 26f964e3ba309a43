//! # Utility Functions
//!
//! Hashing primitives, fixed-width encodings and basis-point arithmetic
//! shared by the protocol components.

use crate::{error::Result, ProtocolError};
use bitcoin::hashes::{hash160, Hash};
use sha2::{Digest, Sha256};

/// Basis-point denominator (100% = 10_000 bps)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Hash a sequence of byte slices with SHA256
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// RIPEMD160(SHA256(data)), the identity hash for public keys
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// Encode an unsigned integer as 16 big-endian bytes
pub const fn u128_be(value: u128) -> [u8; 16] {
    value.to_be_bytes()
}

/// Encode a block height as 8 big-endian bytes
pub const fn u64_be(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Decode a 32-byte buffer from hex, rejecting any other length
pub fn decode_hex_32(input: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(input.trim_start_matches("0x"))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        ProtocolError::InvalidInput(format!("expected 32 bytes, got {}", bytes.len()))
    })
}

/// `amount * numerator / denominator` with truncation toward zero
pub fn mul_div(amount: u128, numerator: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(ProtocolError::InvalidInput("zero denominator".to_string()));
    }
    amount
        .checked_mul(numerator)
        .map(|product| product / denominator)
        .ok_or(ProtocolError::Overflow("mul_div"))
}

/// Fee charged on `amount` at `fee_bps`, truncated toward zero
pub fn fee_for(amount: u128, fee_bps: u32) -> Result<u128> {
    mul_div(amount, u128::from(fee_bps), BPS_DENOMINATOR)
}

pub(crate) fn checked_add(a: u128, b: u128, what: &'static str) -> Result<u128> {
    a.checked_add(b).ok_or(ProtocolError::Overflow(what))
}

pub(crate) fn checked_sub(a: u128, b: u128, what: &'static str) -> Result<u128> {
    a.checked_sub(b).ok_or(ProtocolError::Overflow(what))
}
