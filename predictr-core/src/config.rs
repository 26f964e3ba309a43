//! Protocol configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! network = "testnet"
//! challenge_window = 144
//! voting_period = 288
//! proposal_bond = 1000000
//! fee_bps = 50
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use crate::{
    error::Result, principal::Network, telemetry::LoggingConfig, ProtocolError,
    DEFAULT_CHALLENGE_WINDOW, DEFAULT_FEE_BPS, DEFAULT_PROPOSAL_BOND, DEFAULT_VOTING_PERIOD,
};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Selects the accepted principal version bytes
    pub network: Network,
    /// Blocks after a proposal during which it can be disputed
    pub challenge_window: u64,
    /// Blocks after a dispute during which stake-weighted votes are accepted
    pub voting_period: u64,
    /// Bond locked by proposers, matched by disputers
    pub proposal_bond: u128,
    /// Exchange fee in basis points
    pub fee_bps: u32,
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::Config(format!("Failed to read config file: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ProtocolConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.challenge_window == 0 {
            return Err(ProtocolError::Config(
                "challenge_window must be positive".into(),
            ));
        }
        if self.voting_period == 0 {
            return Err(ProtocolError::Config("voting_period must be positive".into()));
        }
        if self.proposal_bond == 0 {
            return Err(ProtocolError::Config("proposal_bond must be positive".into()));
        }
        if u128::from(self.fee_bps) > crate::utils::BPS_DENOMINATOR {
            return Err(ProtocolError::Config(format!(
                "fee_bps must be at most 10000, got {}",
                self.fee_bps
            )));
        }
        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            challenge_window: DEFAULT_CHALLENGE_WINDOW,
            voting_period: DEFAULT_VOTING_PERIOD,
            proposal_bond: DEFAULT_PROPOSAL_BOND,
            fee_bps: DEFAULT_FEE_BPS,
            logging: LoggingConfig::default(),
        }
    }
}
