//! U256 fixed-point helpers for health and amount calculations.
//!
//! Everything that feeds a decision stays in native U256 arithmetic;
//! conversion to f64 is for display and logging only.

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10000u64, 0, 0, 0]);

/// Apply basis points increase.
/// Returns: value * (10000 + basis_points) / 10000
///
/// Example: apply_basis_points_up(1000, 2000) = 1200 (20% increase)
///
/// Never returns less than `value`; saturates at `U256::MAX`.
#[inline(always)]
pub fn apply_basis_points_up(value: U256, basis_points: u16) -> U256 {
    let factor = U256::from(10000u32 + basis_points as u32);
    match value.checked_mul(factor) {
        Some(scaled) => scaled / BPS_DENOMINATOR,
        None => {
            let increase = (value / BPS_DENOMINATOR).saturating_mul(U256::from(basis_points));
            value.saturating_add(increase)
        }
    }
}

/// Check if health factor indicates liquidatable position (HF < 1.0).
#[inline(always)]
pub fn is_liquidatable_wad(hf_wad: U256) -> bool {
    hf_wad < WAD
}

/// Convert WAD (18 decimals) to f64.
/// Use only for display/logging, not for computation.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        // Saturated health factors (no debt) are reported as U256::MAX
        f64::INFINITY
    }
}

/// Build a WAD value from a ratio `numerator / denominator`.
#[inline(always)]
pub fn wad_ratio(numerator: u64, denominator: u64) -> U256 {
    if denominator == 0 {
        return U256::MAX;
    }
    WAD * U256::from(numerator) / U256::from(denominator)
}
