//! Base-target retargeting and cumulative difficulty.
//!
//! The base target is re-evaluated on every other block, using the average spacing of the last
//! three blocks. Arithmetic wraps on 64-bit overflow; a wrapped or oversized result is pinned to
//! the cap for the era.

use super::chain::Block;
use super::processor::BlockSource;
use crate::config::ProtocolParams;
use crate::error::ChainError;
use primitive_types::U256;
use tracing::debug;

/// 2^64, the numerator of the per-block difficulty increment.
pub fn two_pow_64() -> U256 {
    U256::one() << 64
}

/// Difficulty contributed by a block with `base_target`.
pub fn difficulty_increment(base_target: i64) -> U256 {
    two_pow_64() / U256::from(base_target.max(1) as u64)
}

/// Whether a block whose predecessor sits at `previous_height` recomputes the base target.
pub fn is_retarget_height(previous_height: u32) -> bool {
    previous_height > 2 && previous_height % 2 == 0
}

/// New base target given the predecessor's value and the average block time over the last
/// three blocks.
pub fn next_base_target(
    previous_base_target: i64,
    previous_height: u32,
    average_block_time: i32,
    params: &ProtocolParams,
) -> i64 {
    let era = params.forging_era(previous_height);
    let max_base_target = params.max_base_target(previous_height);
    let target = era.target_block_time as i64;

    let mut base_target = if average_block_time > era.target_block_time {
        let spacing = average_block_time.min(era.max_blocktime_limit) as i64;
        let scaled = previous_base_target.wrapping_mul(spacing);
        match era.gamma_reduced {
            Some(gamma_reduced) => (scaled as f64 / (target as f64 * gamma_reduced)).round() as i64,
            None => scaled / target,
        }
    } else {
        let shortfall = target - average_block_time.max(era.min_blocktime_limit) as i64;
        previous_base_target.wrapping_sub(
            previous_base_target
                .wrapping_mul(era.gamma)
                .wrapping_mul(shortfall)
                / (100 * target),
        )
    };

    if base_target < 0 || base_target > max_base_target {
        base_target = max_base_target;
    }
    if base_target < params.min_base_target {
        base_target = params.min_base_target;
    }
    base_target
}

/// Base target and cumulative difficulty for a block with `timestamp` on top of `previous`.
pub fn calculate(
    previous: &Block,
    timestamp: i32,
    source: &dyn BlockSource,
    params: &ProtocolParams,
) -> Result<(i64, U256), ChainError> {
    let previous_height = previous.height()?;
    let previous_base_target = previous.base_target()?;

    let base_target = if is_retarget_height(previous_height) {
        let anchor = source.block_at_height(previous_height - 2).ok_or_else(|| {
            ChainError::BlockOutOfOrder(format!(
                "Missing block at height {} for retargeting",
                previous_height - 2
            ))
        })?;
        let average_block_time = timestamp.wrapping_sub(anchor.timestamp()) / 3;
        let base_target =
            next_base_target(previous_base_target, previous_height, average_block_time, params);
        if params.log_base_target_changes && base_target != previous_base_target {
            debug!(
                "Base target {} -> {} at height {} (average block time {}s)",
                previous_base_target,
                base_target,
                previous_height + 1,
                average_block_time
            );
        }
        base_target
    } else {
        previous_base_target
    };

    let cumulative_difficulty = previous
        .cumulative_difficulty()?
        .checked_add(difficulty_increment(base_target))
        .ok_or_else(|| ChainError::IllegalState("Cumulative difficulty overflows".to_string()))?;
    Ok((base_target, cumulative_difficulty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{INITIAL_BASE_TARGET, MAX_BALANCE_COINS};

    #[test]
    fn test_retarget_heights() {
        assert!(!is_retarget_height(0));
        assert!(!is_retarget_height(2));
        assert!(!is_retarget_height(3));
        assert!(is_retarget_height(4));
        assert!(is_retarget_height(100));
    }

    #[test]
    fn test_slow_blocks_raise_base_target() {
        let params = ProtocolParams::default();
        let next = next_base_target(INITIAL_BASE_TARGET, 4, 120, &params);
        assert_eq!(next, INITIAL_BASE_TARGET * 67 / 60);
        assert!(next <= params.max_base_target(4));
    }

    #[test]
    fn test_fast_blocks_lower_base_target() {
        let params = ProtocolParams::default();
        let previous = INITIAL_BASE_TARGET * 2;
        let next = next_base_target(previous, 10, 10, &params);
        // Spacing is clamped to the era minimum of 53 seconds.
        assert_eq!(next, previous - previous * 64 * 7 / 6000);
        assert!(next < previous);
    }

    #[test]
    fn test_on_target_is_stable() {
        let params = ProtocolParams::default();
        assert_eq!(next_base_target(INITIAL_BASE_TARGET, 6, 60, &params), INITIAL_BASE_TARGET);
    }

    #[test]
    fn test_floor_and_cap() {
        let params = ProtocolParams::default();
        assert_eq!(
            next_base_target(params.min_base_target, 4, 1, &params),
            params.min_base_target
        );
        let cap = params.max_base_target(4);
        assert_eq!(next_base_target(cap, 4, 600, &params), cap);
        // Wrapped multiplication lands negative and is pinned to the cap.
        assert_eq!(next_base_target(i64::MAX / 2, 4, 600, &params), cap);
    }

    #[test]
    fn test_reduced_gamma_era_rounds() {
        let params = ProtocolParams::default();
        let height = 250_000;
        let previous = INITIAL_BASE_TARGET * 10;
        let expected = ((previous * 120) as f64 / (60.0 * 0.95)).round() as i64;
        let next = next_base_target(previous, height, 300, &params);
        assert_eq!(next, expected);
        assert!(next <= INITIAL_BASE_TARGET * MAX_BALANCE_COINS);
    }

    #[test]
    fn test_difficulty_increment() {
        assert_eq!(difficulty_increment(1), two_pow_64());
        assert_eq!(difficulty_increment(1 << 32), U256::one() << 32);
    }
}
