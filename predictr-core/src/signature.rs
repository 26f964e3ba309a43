//! # Order signatures
//!
//! Makers sign the 32-byte order hash with a recoverable secp256k1 ECDSA
//! signature. Verification recovers the public key, derives the signer's
//! identity and compares it with the claimed maker. Any malformed input
//! fails closed.

use crate::{
    principal::{Network, Principal},
    ProtocolError,
};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, Secp256k1, SecretKey, VerifyOnly,
};

/// Serialized signature length: `r[32] || s[32] || recovery_id[1]`
pub const SIGNATURE_LEN: usize = 65;

/// Pluggable signature check used by the exchange.
pub trait SignatureVerifier: Send + Sync {
    /// Returns true only if `signature` over `message_hash` was produced by `claimed_signer`.
    fn verify(&self, message_hash: &[u8; 32], signature: &[u8], claimed_signer: &Principal)
        -> bool;
}

/// Recoverable-ECDSA verifier over secp256k1.
pub struct Secp256k1Verifier {
    secp: Secp256k1<VerifyOnly>,
    network: Network,
}

impl Secp256k1Verifier {
    pub fn new(network: Network) -> Self {
        Self {
            secp: Secp256k1::verification_only(),
            network,
        }
    }

    /// Recover the identity that produced `signature` over `message_hash`.
    pub fn recover_signer(
        &self,
        message_hash: &[u8; 32],
        signature: &[u8],
    ) -> Result<Principal, ProtocolError> {
        if signature.len() != SIGNATURE_LEN {
            return Err(ProtocolError::InvalidInput(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                signature.len()
            )));
        }
        let recovery_id = RecoveryId::from_i32(i32::from(signature[64]))
            .map_err(|_| ProtocolError::InvalidSignature)?;
        let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
            .map_err(|_| ProtocolError::InvalidSignature)?;
        let message = Message::from_digest(*message_hash);
        let public_key = self
            .secp
            .recover_ecdsa(&message, &recoverable)
            .map_err(|_| ProtocolError::InvalidSignature)?;
        Ok(Principal::from_public_key(self.network, &public_key))
    }
}

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(
        &self,
        message_hash: &[u8; 32],
        signature: &[u8],
        claimed_signer: &Principal,
    ) -> bool {
        match self.recover_signer(message_hash, signature) {
            Ok(signer) => {
                // Recovery yields a single-sig identity; compare the key hash so a
                // claimed multi-sig version byte still fails below.
                signer.version() == claimed_signer.version()
                    && !claimed_signer.is_contract()
                    && signer.hash160() == claimed_signer.hash160()
            }
            Err(_) => false,
        }
    }
}

/// Produce a 65-byte recoverable signature over `message_hash`.
pub fn sign_hash(secret_key: &SecretKey, message_hash: &[u8; 32]) -> [u8; SIGNATURE_LEN] {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(*message_hash);
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();
    let mut out = [0u8; SIGNATURE_LEN];
    out[..64].copy_from_slice(&compact);
    // recovery ids are 0..=3
    out[64] = recovery_id.to_i32() as u8;
    out
}
