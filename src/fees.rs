//! Fee policies.
//!
//! A fee is either a flat amount or grows with the size of some part of the attachment. Each
//! transaction variant exposes a baseline and a "next" schedule through [`FeeSchedule`]; the era
//! in force at a given height decides which one is the minimum.

use crate::config::{FeeEra, ProtocolParams, ONE_COIN};

pub const MIN_FEE: i64 = ONE_COIN;
pub const NEW_MIN_FEE: i64 = ONE_COIN / 20;
pub const NEW_MIN_MESSAGE_FEE: i64 = ONE_COIN / 100;
pub const MIN_PRUNABLE_FEE: i64 = ONE_COIN / 10;
pub const NEW_MIN_PRUNABLE_FEE: i64 = ONE_COIN / 100;

pub const DEFAULT_UNIT_SIZE: i32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fee {
    Constant(i64),
    /// `constant + per_unit * ((size - 1) / unit_size)`; sizes below one byte pay only `constant`.
    SizeBased {
        constant: i64,
        per_unit: i64,
        unit_size: i32,
    },
}

impl Fee {
    pub const NONE: Fee = Fee::Constant(0);
    pub const DEFAULT: Fee = Fee::Constant(MIN_FEE);
    pub const NEW_DEFAULT: Fee = Fee::Constant(NEW_MIN_FEE);

    pub const fn size_based(constant: i64, per_unit: i64, unit_size: i32) -> Self {
        Fee::SizeBased {
            constant,
            per_unit,
            unit_size,
        }
    }

    /// Size-based fee over the default 1 KiB unit.
    pub const fn per_kilobyte(constant: i64, per_unit: i64) -> Self {
        Self::size_based(constant, per_unit, DEFAULT_UNIT_SIZE)
    }

    /// Fee charged for a payload of `size` bytes (ignored for constant fees).
    pub fn charge(&self, size: i32) -> i64 {
        match *self {
            Fee::Constant(fee) => fee,
            Fee::SizeBased {
                constant,
                per_unit,
                unit_size,
            } => {
                let size = size - 1;
                if size < 0 || unit_size <= 0 {
                    return constant;
                }
                let units = i64::from(size / unit_size);
                constant.saturating_add(units.saturating_mul(per_unit))
            }
        }
    }
}

/// Sum of several fee components, each charged on its own size measure.
pub fn composite(parts: &[(Fee, i32)]) -> i64 {
    parts
        .iter()
        .fold(0i64, |acc, (fee, size)| acc.saturating_add(fee.charge(*size)))
}

/// Implemented by anything that carries a two-generation fee policy.
pub trait FeeSchedule {
    fn baseline_fee(&self) -> i64;
    fn next_fee(&self) -> i64;

    /// Minimum fee for inclusion in a block at `height`.
    fn minimum_fee(&self, height: u32, params: &ProtocolParams) -> i64 {
        match params.fee_era(height) {
            FeeEra::Baseline => self.baseline_fee(),
            FeeEra::Next => self.next_fee(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_based_thresholds() {
        let fee = Fee::size_based(2 * MIN_FEE, 2 * MIN_FEE, 32);
        assert_eq!(fee.charge(0), 2 * MIN_FEE);
        assert_eq!(fee.charge(1), 2 * MIN_FEE);
        assert_eq!(fee.charge(32), 2 * MIN_FEE);
        assert_eq!(fee.charge(33), 4 * MIN_FEE);
        assert_eq!(fee.charge(65), 6 * MIN_FEE);
    }

    #[test]
    fn test_kilobyte_unit() {
        let fee = Fee::per_kilobyte(MIN_FEE, MIN_PRUNABLE_FEE);
        assert_eq!(fee.charge(1024), MIN_FEE);
        assert_eq!(fee.charge(1025), MIN_FEE + MIN_PRUNABLE_FEE);
    }

    #[test]
    fn test_composite_sums_components() {
        let total = composite(&[
            (Fee::size_based(10 * MIN_FEE, MIN_FEE, 1), 0),
            (Fee::size_based(0, 2 * MIN_FEE, 32), 33),
        ]);
        assert_eq!(total, 12 * MIN_FEE);
    }

    struct Flat;

    impl FeeSchedule for Flat {
        fn baseline_fee(&self) -> i64 {
            MIN_FEE
        }
        fn next_fee(&self) -> i64 {
            NEW_MIN_FEE
        }
    }

    #[test]
    fn test_era_selection() {
        let params = ProtocolParams::default();
        assert_eq!(Flat.minimum_fee(10, &params), MIN_FEE);
        assert_eq!(Flat.minimum_fee(params.next_fee_height, &params), NEW_MIN_FEE);
    }
}
