//! # Principals
//!
//! Account identities on the ledger. A standard principal is a key-derived
//! identity (`hash160` of a compressed public key); a contract principal is
//! a named contract deployed by a standard principal. Protocol components
//! are themselves contract principals.

use crate::{error::Result, utils::hash160, ProtocolError};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted contract name
pub const MAX_CONTRACT_NAME_LEN: usize = 40;

const STANDARD_TAG: u8 = 0x05;
const CONTRACT_TAG: u8 = 0x06;

/// Network a ledger runs on; selects the accepted principal versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    /// Version byte for single-signature identities
    pub const fn single_sig_version(self) -> u8 {
        match self {
            Network::Mainnet => 22,
            Network::Testnet => 26,
        }
    }

    /// Version byte for multi-signature identities
    pub const fn multi_sig_version(self) -> u8 {
        match self {
            Network::Mainnet => 20,
            Network::Testnet => 21,
        }
    }

    pub const fn accepts_version(self, version: u8) -> bool {
        version == self.single_sig_version() || version == self.multi_sig_version()
    }
}

/// A ledger identity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Principal {
    /// Key-controlled account
    Standard { version: u8, hash160: [u8; 20] },
    /// Contract deployed by the standard principal `(version, hash160)`
    Contract {
        version: u8,
        hash160: [u8; 20],
        name: String,
    },
}

impl Principal {
    pub fn standard(version: u8, hash160: [u8; 20]) -> Self {
        Self::Standard { version, hash160 }
    }

    /// Derive the identity controlled by a secp256k1 public key.
    pub fn from_public_key(network: Network, public_key: &PublicKey) -> Self {
        Self::Standard {
            version: network.single_sig_version(),
            hash160: hash160(&public_key.serialize()),
        }
    }

    /// Contract principal named `name` deployed by `deployer`.
    pub fn contract(deployer: &Principal, name: &str) -> Result<Self> {
        let (version, hash160) = match deployer {
            Principal::Standard { version, hash160 } => (*version, *hash160),
            Principal::Contract { .. } => {
                return Err(ProtocolError::InvalidInput(
                    "contracts are deployed by standard principals".to_string(),
                ))
            }
        };
        validate_contract_name(name)?;
        Ok(Self::Contract {
            version,
            hash160,
            name: name.to_string(),
        })
    }

    pub fn is_contract(&self) -> bool {
        matches!(self, Principal::Contract { .. })
    }

    pub fn version(&self) -> u8 {
        match self {
            Principal::Standard { version, .. } | Principal::Contract { version, .. } => *version,
        }
    }

    pub fn hash160(&self) -> &[u8; 20] {
        match self {
            Principal::Standard { hash160, .. } | Principal::Contract { hash160, .. } => hash160,
        }
    }

    /// Whether this principal is valid on `network`.
    pub fn is_well_formed(&self, network: Network) -> bool {
        if !network.accepts_version(self.version()) {
            return false;
        }
        match self {
            Principal::Standard { .. } => true,
            Principal::Contract { name, .. } => validate_contract_name(name).is_ok(),
        }
    }

    /// Canonical byte encoding used as hash input.
    ///
    /// ```text
    /// standard: 0x05 || version || hash160[20]
    /// contract: 0x06 || version || hash160[20] || len(name) || name
    /// ```
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Principal::Standard { version, hash160 } => {
                let mut out = Vec::with_capacity(22);
                out.push(STANDARD_TAG);
                out.push(*version);
                out.extend_from_slice(hash160);
                out
            }
            Principal::Contract {
                version,
                hash160,
                name,
            } => {
                let mut out = Vec::with_capacity(23 + name.len());
                out.push(CONTRACT_TAG);
                out.push(*version);
                out.extend_from_slice(hash160);
                // names are capped at 40 bytes, so the length fits in one byte
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
                out
            }
        }
    }
}

fn validate_contract_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_CONTRACT_NAME_LEN
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ProtocolError::InvalidInput(format!(
            "invalid contract name: {name:?}"
        )))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Standard { version, hash160 } => {
                write!(f, "{version:02x}{}", hex::encode(hash160))
            }
            Principal::Contract {
                version,
                hash160,
                name,
            } => write!(f, "{version:02x}{}.{name}", hex::encode(hash160)),
        }
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::standard(26, [0xaa; 20])
    }

    #[test]
    fn test_contract_principal_inherits_deployer() {
        let contract = Principal::contract(&alice(), "conditional-tokens").unwrap();
        assert!(contract.is_contract());
        assert_eq!(contract.version(), 26);
        assert_eq!(contract.hash160(), &[0xaa; 20]);
        assert_eq!(
            contract.to_string(),
            format!("1a{}.conditional-tokens", "aa".repeat(20))
        );
    }

    #[test]
    fn test_contract_name_rules() {
        assert!(Principal::contract(&alice(), "").is_err());
        assert!(Principal::contract(&alice(), "9lives").is_err());
        assert!(Principal::contract(&alice(), "has space").is_err());
        assert!(Principal::contract(&alice(), &"a".repeat(41)).is_err());
        assert!(Principal::contract(&alice(), "ok_name-2").is_ok());

        let nested = Principal::contract(&alice(), "exchange").unwrap();
        assert!(Principal::contract(&nested, "child").is_err());
    }

    #[test]
    fn test_well_formed_depends_on_network() {
        let testnet = alice();
        assert!(testnet.is_well_formed(Network::Testnet));
        assert!(!testnet.is_well_formed(Network::Mainnet));

        let multisig = Principal::standard(21, [1; 20]);
        assert!(multisig.is_well_formed(Network::Testnet));

        let bogus = Principal::standard(0, [1; 20]);
        assert!(!bogus.is_well_formed(Network::Testnet));
    }

    #[test]
    fn test_canonical_bytes_are_distinct_per_kind() {
        let standard = alice();
        let contract = Principal::contract(&standard, "a").unwrap();
        let s = standard.canonical_bytes();
        let c = contract.canonical_bytes();
        assert_eq!(s.len(), 22);
        assert_eq!(s[0], 0x05);
        assert_eq!(c[0], 0x06);
        assert_eq!(c[22], 1);
        assert_eq!(&c[23..], b"a");
    }

    #[test]
    fn test_identity_from_public_key_is_deterministic() {
        let secp = secp256k1::Secp256k1::new();
        let sk = secp256k1::SecretKey::from_slice(&[7u8; 32]).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        let one = Principal::from_public_key(Network::Testnet, &pk);
        let two = Principal::from_public_key(Network::Testnet, &pk);
        assert_eq!(one, two);
        assert_eq!(one.version(), 26);
        assert_eq!(one.hash160(), &hash160(&pk.serialize()));
    }
}
