//! Protocol configuration for ForgeChain
//!
//! Consensus-critical constants that changed at hard forks live in small era tables indexed by
//! activation height. Every height-gated decision goes through [`ProtocolParams::forging_era`],
//! [`ProtocolParams::max_base_target`] or [`ProtocolParams::fee_era`].

use crate::crypto::{account_id, AccountId, PublicKeyBytes};
use crate::error::ChainError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Smallest-unit quantity of one coin.
pub const ONE_COIN: i64 = 100_000_000;
pub const MAX_BALANCE_COINS: i64 = 1_000_000_000;
pub const MAX_BALANCE_NQT: i64 = MAX_BALANCE_COINS * ONE_COIN;

pub const INITIAL_BASE_TARGET: i64 = 153_722_867;

/// Seconds between the Unix epoch and the chain's genesis epoch (2018-01-01T00:00:00Z).
pub const GENESIS_EPOCH_UNIX: i64 = 1_514_764_800;

/// Process-wide defaults, matching the reference chain's activation heights.
pub static DEFAULT_PARAMS: Lazy<ProtocolParams> = Lazy::new(ProtocolParams::default);

/// Something that takes effect from a given block height onward.
pub trait Activated {
    fn activation_height(&self) -> u32;
}

/// Forging constants for one difficulty-adjustment generation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForgingEra {
    pub activation_height: u32,
    /// Expected average seconds between blocks.
    pub target_block_time: i32,
    /// Percentage weight of the shortfall term when blocks come too fast.
    pub gamma: i64,
    pub min_blocktime_limit: i32,
    pub max_blocktime_limit: i32,
    /// When set, slow blocks increase the base target by
    /// `round(prev * min(avg, max) / (target * gamma_reduced))` instead of truncating division.
    #[serde(default)]
    pub gamma_reduced: Option<f64>,
}

impl Activated for ForgingEra {
    fn activation_height(&self) -> u32 {
        self.activation_height
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BaseTargetCap {
    pub activation_height: u32,
    pub max_base_target: i64,
}

impl Activated for BaseTargetCap {
    fn activation_height(&self) -> u32 {
        self.activation_height
    }
}

/// First forging era; also answers for a table left empty.
const GENESIS_FORGING_ERA: ForgingEra = ForgingEra {
    activation_height: 0,
    target_block_time: 60,
    gamma: 64,
    min_blocktime_limit: 53,
    max_blocktime_limit: 67,
    gamma_reduced: None,
};

const GENESIS_BASE_TARGET_CAP: BaseTargetCap = BaseTargetCap {
    activation_height: 0,
    max_base_target: INITIAL_BASE_TARGET * 50,
};

/// Which generation of the fee schedule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeEra {
    Baseline,
    Next,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    pub min_base_target: i64,
    pub initial_base_target: i64,
    pub forging_eras: Vec<ForgingEra>,
    pub base_target_caps: Vec<BaseTargetCap>,
    /// Height from which the reduced ("next") fee schedule applies.
    pub next_fee_height: u32,
    /// Extra temporary hold for transactions referencing another transaction.
    pub unconfirmed_pool_deposit_nqt: i64,
    #[serde(deserialize_with = "deserialize_public_key")]
    pub genesis_creator_public_key: PublicKeyBytes,
    pub log_base_target_changes: bool,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_base_target: INITIAL_BASE_TARGET * 9 / 10,
            initial_base_target: INITIAL_BASE_TARGET,
            forging_eras: vec![
                GENESIS_FORGING_ERA,
                ForgingEra {
                    activation_height: 250_000,
                    target_block_time: 60,
                    gamma: 32,
                    min_blocktime_limit: 40,
                    max_blocktime_limit: 120,
                    gamma_reduced: Some(0.95),
                },
            ],
            base_target_caps: vec![
                GENESIS_BASE_TARGET_CAP,
                BaseTargetCap {
                    activation_height: 150_000,
                    max_base_target: INITIAL_BASE_TARGET * MAX_BALANCE_COINS,
                },
                BaseTargetCap {
                    activation_height: 400_001,
                    max_base_target: i64::MAX,
                },
            ],
            next_fee_height: 300_000,
            unconfirmed_pool_deposit_nqt: 100 * ONE_COIN,
            genesis_creator_public_key: [0u8; 32],
            log_base_target_changes: false,
        }
    }
}

/// Latest era active at `height`, or the earliest one if none is yet.
fn era_for<T: Activated>(eras: &[T], height: u32) -> Option<&T> {
    eras.iter()
        .rev()
        .find(|era| era.activation_height() <= height)
        .or_else(|| eras.first())
}

impl ProtocolParams {
    /// Forging constants in force for a block whose predecessor is at `previous_height`.
    pub fn forging_era(&self, previous_height: u32) -> &ForgingEra {
        era_for(&self.forging_eras, previous_height).unwrap_or(&GENESIS_FORGING_ERA)
    }

    pub fn max_base_target(&self, previous_height: u32) -> i64 {
        era_for(&self.base_target_caps, previous_height)
            .unwrap_or(&GENESIS_BASE_TARGET_CAP)
            .max_base_target
    }

    pub fn fee_era(&self, height: u32) -> FeeEra {
        if height >= self.next_fee_height {
            FeeEra::Next
        } else {
            FeeEra::Baseline
        }
    }

    pub fn genesis_creator_id(&self) -> AccountId {
        account_id(&self.genesis_creator_public_key)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        check_eras("forging_eras", &self.forging_eras)?;
        check_eras("base_target_caps", &self.base_target_caps)?;
        if self.min_base_target <= 0 {
            return Err(ChainError::Config("min_base_target must be positive".to_string()));
        }
        if self.initial_base_target < self.min_base_target {
            return Err(ChainError::Config(
                "initial_base_target must not be below min_base_target".to_string(),
            ));
        }
        for era in &self.forging_eras {
            if era.target_block_time <= 0 || era.min_blocktime_limit > era.max_blocktime_limit {
                return Err(ChainError::Config(format!(
                    "Invalid forging era at height {}",
                    era.activation_height
                )));
            }
            if matches!(era.gamma_reduced, Some(g) if g <= 0.0) {
                return Err(ChainError::Config(format!(
                    "gamma_reduced must be positive at height {}",
                    era.activation_height
                )));
            }
        }
        for cap in &self.base_target_caps {
            if cap.max_base_target < self.min_base_target {
                return Err(ChainError::Config(format!(
                    "Base target cap at height {} is below min_base_target",
                    cap.activation_height
                )));
            }
        }
        if self.unconfirmed_pool_deposit_nqt < 0 {
            return Err(ChainError::Config(
                "unconfirmed_pool_deposit_nqt cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_eras<T: Activated>(name: &str, eras: &[T]) -> Result<(), ChainError> {
    match eras.first() {
        None => return Err(ChainError::Config(format!("{} must not be empty", name))),
        Some(first) if first.activation_height() != 0 => {
            return Err(ChainError::Config(format!("{} must start at height 0", name)))
        }
        _ => {}
    }
    if eras
        .windows(2)
        .any(|w| w[0].activation_height() >= w[1].activation_height())
    {
        return Err(ChainError::Config(format!(
            "{} must be sorted by strictly increasing activation height",
            name
        )));
    }
    Ok(())
}

fn deserialize_public_key<'de, D>(deserializer: D) -> Result<PublicKeyBytes, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    crate::crypto::parse_hex_array::<32>("genesis_creator_public_key", &s)
        .map_err(serde::de::Error::custom)
}

/// Load protocol parameters from a TOML file, falling back to defaults when it is absent.
pub fn load_params(path: impl AsRef<Path>) -> Result<ProtocolParams, ChainError> {
    let config_str = match fs::read_to_string(path.as_ref()) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let params: ProtocolParams = if config_str.trim().is_empty() {
        ProtocolParams::default()
    } else {
        toml::from_str(&config_str)?
    };
    params.validate()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ProtocolParams::default().validate().is_ok());
    }

    #[test]
    fn test_forging_era_selection() {
        let params = ProtocolParams::default();
        assert_eq!(params.forging_era(0).gamma, 64);
        assert_eq!(params.forging_era(249_999).gamma, 64);
        assert_eq!(params.forging_era(250_000).gamma, 32);
        assert!(params.forging_era(250_000).gamma_reduced.is_some());
    }

    #[test]
    fn test_base_target_cap_regimes() {
        let params = ProtocolParams::default();
        assert_eq!(params.max_base_target(149_999), INITIAL_BASE_TARGET * 50);
        assert_eq!(
            params.max_base_target(150_000),
            INITIAL_BASE_TARGET * MAX_BALANCE_COINS
        );
        assert_eq!(
            params.max_base_target(400_000),
            INITIAL_BASE_TARGET * MAX_BALANCE_COINS
        );
        assert_eq!(params.max_base_target(400_001), i64::MAX);
    }

    #[test]
    fn test_fee_era() {
        let params = ProtocolParams::default();
        assert_eq!(params.fee_era(1), FeeEra::Baseline);
        assert_eq!(params.fee_era(300_000), FeeEra::Next);
    }

    #[test]
    fn test_empty_era_tables_fall_back_to_genesis_values() {
        let params = ProtocolParams {
            forging_eras: Vec::new(),
            base_target_caps: Vec::new(),
            ..ProtocolParams::default()
        };
        assert!(params.validate().is_err());
        assert_eq!(params.forging_era(500_000).target_block_time, 60);
        assert_eq!(params.forging_era(0).gamma, 64);
        assert_eq!(params.max_base_target(500_000), INITIAL_BASE_TARGET * 50);
    }

    #[test]
    fn test_unsorted_eras_rejected() {
        let mut params = ProtocolParams::default();
        params.forging_eras.swap(0, 1);
        assert!(params.validate().is_err());
    }
}
