//! Profit-tiered gas pricing and dynamic slippage tolerance.
//!
//! Bigger opportunities justify paying more to win the race; bigger swap
//! sizes need wider slippage to clear. Both ladders are threshold tables
//! looked up by USD value.

/// `(upper_bound_usd, value)` rows; the last row is the open-ended tier.
#[derive(Debug, Clone)]
pub struct TierTable {
    rows: Vec<(f64, f64)>,
    top: f64,
}

impl TierTable {
    pub fn new(rows: Vec<(f64, f64)>, top: f64) -> Self {
        Self { rows, top }
    }

    pub fn lookup(&self, value_usd: f64) -> f64 {
        for (bound, v) in &self.rows {
            if value_usd < *bound {
                return *v;
            }
        }
        self.top
    }

    /// Gas-price multiplier by expected profit.
    pub fn default_gas() -> Self {
        Self::new(
            vec![
                (5.0, 1.5),
                (50.0, 2.5),
                (200.0, 4.0),
                (1_000.0, 5.0),
                (5_000.0, 6.0),
            ],
            8.0,
        )
    }

    /// Slippage tolerance in basis points by swap size.
    pub fn default_slippage() -> Self {
        Self::new(
            vec![
                (100.0, 200.0),
                (1_000.0, 300.0),
                (10_000.0, 500.0),
                (50_000.0, 700.0),
            ],
            1_000.0,
        )
    }
}

/// Escalation factors applied to the base slippage tolerance when a
/// simulation fails with a swap-related revert.
pub const SLIPPAGE_ESCALATION: [f64; 3] = [1.0, 1.5, 2.5];

/// Slippage in bps for escalation step `step` (clamped to the last factor).
pub fn escalated_slippage_bps(base_bps: u16, step: usize) -> u16 {
    let factor = SLIPPAGE_ESCALATION[step.min(SLIPPAGE_ESCALATION.len() - 1)];
    let bps = (base_bps as f64 * factor).round() as u32;
    bps.min(9_999) as u16
}

/// Scale a base gas price by the profit-tier multiplier.
pub fn apply_gas_multiplier(base_gas_price: u128, multiplier: f64) -> u128 {
    // Multiply in integer space at 1/100 precision to avoid f64 rounding on
    // large wei values.
    let hundredths = (multiplier * 100.0).round() as u128;
    base_gas_price.saturating_mul(hundredths) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_ladder() {
        let gas = TierTable::default_gas();
        assert_eq!(gas.lookup(1.0), 1.5);
        assert_eq!(gas.lookup(4.99), 1.5);
        assert_eq!(gas.lookup(5.0), 2.5);
        assert_eq!(gas.lookup(199.0), 4.0);
        assert_eq!(gas.lookup(999.0), 5.0);
        assert_eq!(gas.lookup(4_999.0), 6.0);
        assert_eq!(gas.lookup(5_000.0), 8.0);
        assert_eq!(gas.lookup(1_000_000.0), 8.0);
    }

    #[test]
    fn test_slippage_ladder() {
        let slip = TierTable::default_slippage();
        assert_eq!(slip.lookup(50.0), 200.0);
        assert_eq!(slip.lookup(500.0), 300.0);
        assert_eq!(slip.lookup(5_000.0), 500.0);
        assert_eq!(slip.lookup(20_000.0), 700.0);
        assert_eq!(slip.lookup(100_000.0), 1_000.0);
    }

    #[test]
    fn test_escalation_steps() {
        assert_eq!(escalated_slippage_bps(200, 0), 200);
        assert_eq!(escalated_slippage_bps(200, 1), 300);
        assert_eq!(escalated_slippage_bps(200, 2), 500);
        // Clamped past the table
        assert_eq!(escalated_slippage_bps(200, 7), 500);
    }

    #[test]
    fn test_gas_multiplier_integer_math() {
        assert_eq!(apply_gas_multiplier(1_000_000_000, 1.5), 1_500_000_000);
        assert_eq!(apply_gas_multiplier(1_000_000_000, 8.0), 8_000_000_000);
        assert_eq!(apply_gas_multiplier(3, 2.5), 7); // floor of 7.5
    }
}
