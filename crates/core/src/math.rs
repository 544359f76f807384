//! Exact fixed-point arithmetic for liquidation sizing.
//!
//! All monetary math stays in U256; floating point appears only for display
//! and for the gas/slippage tier lookups. Oracle prices carry 8 fractional
//! digits, health factors 18 (WAD).

use alloy::primitives::U256;

/// 1e18, the health-factor fixed-point base.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10 000 = 100%).
pub const BPS: U256 = U256::from_limbs([10_000u64, 0, 0, 0]);

/// Oracle price fractional digits.
pub const PRICE_DECIMALS: u8 = 8;

/// Powers of 10 through 10^18, the widest decimal spread ERC-20 reserves
/// carry. Exponents past the table (none in practice) fall back to `pow`.
const POW10: [u64; 19] = {
    let mut table = [1u64; 19];
    let mut i = 1;
    while i < table.len() {
        table[i] = table[i - 1] * 10;
        i += 1;
    }
    table
};

#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    if (exp as usize) < POW10.len() {
        U256::from(POW10[exp as usize])
    } else {
        U256::from(10u64).pow(U256::from(exp))
    }
}

/// `value * (10000 - bps) / 10000`
#[inline(always)]
pub fn apply_bps_down(value: U256, bps: u16) -> U256 {
    value * U256::from(10_000u16.saturating_sub(bps)) / BPS
}

/// `value * (10000 + bps) / 10000`
#[inline(always)]
pub fn apply_bps_up(value: U256, bps: u16) -> U256 {
    value * U256::from(10_000u32 + bps as u32) / BPS
}

/// Debt amount to close: `totalDebt * closeFactor% * (1 + buffer bps)`,
/// capped by the flash source's available reserve of the debt asset.
/// The interest buffer is applied here and nowhere else.
pub fn close_amount(
    total_debt: U256,
    close_factor_pct: u8,
    interest_buffer_bps: u16,
    available_reserve: U256,
) -> U256 {
    let base = total_debt * U256::from(close_factor_pct) / U256::from(100u64);
    let buffered = apply_bps_up(base, interest_buffer_bps);
    buffered.min(available_reserve)
}

/// Ladder rung: `totalDebt * fraction% * (1 + buffer bps)`, reserve-capped.
pub fn ladder_amount(
    total_debt: U256,
    fraction_pct: u8,
    interest_buffer_bps: u16,
    available_reserve: U256,
) -> U256 {
    close_amount(total_debt, fraction_pct, interest_buffer_bps, available_reserve)
}

/// Collateral seized for covering `debt_to_cover`:
/// `floor(debtToCover * debtPrice * bonus / (collateralPrice * 10000))`
/// aligned to collateral decimals, then scaled by the conservative factor.
pub fn expected_collateral(
    debt_to_cover: U256,
    debt_price: U256,
    collateral_price: U256,
    liquidation_bonus: u32,
    debt_decimals: u8,
    collateral_decimals: u8,
    conservative_factor_pct: u8,
) -> U256 {
    if collateral_price.is_zero() || debt_to_cover.is_zero() {
        return U256::ZERO;
    }
    let numerator =
        debt_to_cover * debt_price * U256::from(liquidation_bonus) * pow10(collateral_decimals);
    let denominator = collateral_price * BPS * pow10(debt_decimals);
    let raw = numerator / denominator;
    raw * U256::from(conservative_factor_pct) / U256::from(100u64)
}

/// Collateral price drop (percent) that would pull the position to HF = 1,
/// assuming a single dominant collateral. Prioritization only.
pub fn price_drop_to_liquidate(hf_wad: U256) -> f64 {
    let hf = wad_to_f64(hf_wad);
    if hf <= 1.0 {
        return 0.0;
    }
    (1.0 - 1.0 / hf) * 100.0
}

/// Convert WAD to f64. Display and ranking only.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        wad.to::<u128>() as f64 / 1e18
    } else {
        let limbs = wad.as_limbs();
        let high = limbs[1] as f64 * (u64::MAX as f64 + 1.0);
        (high + limbs[0] as f64) / 1e18
    }
}

/// Oracle-numeraire value (8 fractional digits) to f64 USD. Ranking only.
#[inline(always)]
pub fn base_to_usd(value_base: U256) -> f64 {
    if value_base <= U256::from(u128::MAX) {
        value_base.to::<u128>() as f64 / 1e8
    } else {
        f64::MAX
    }
}

/// Token amount to f64 USD given its oracle price. Ranking only.
pub fn token_value_usd(amount: U256, price: U256, decimals: u8) -> f64 {
    let value_base = amount * price / pow10(decimals);
    base_to_usd(value_base)
}

/// Convert an amount of one token into another through their oracle prices,
/// aligning decimals. Exact integer math.
pub fn convert_amount(
    amount: U256,
    from_price: U256,
    from_decimals: u8,
    to_price: U256,
    to_decimals: u8,
) -> U256 {
    if to_price.is_zero() {
        return U256::ZERO;
    }
    amount * from_price * pow10(to_decimals) / (to_price * pow10(from_decimals))
}
