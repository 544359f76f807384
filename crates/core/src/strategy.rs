//! Liquidation strategy registry.
//!
//! A closed set of strategies, each pairing a flash source with a swap venue
//! for the collateral exit. Strategies are tried in ascending priority; a
//! priority tie is broken by projected output. The registry only decides
//! *how* to route a liquidation of a given size; sizing itself lives in the
//! adaptive sizer.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolValue;

use liquidator_api::AggregatorQuote;
use liquidator_chain::{
    encode_pair_path, encode_v2_path, encode_v3_path, ContractMethod, ExecuteParams, PoolRef,
    Quote, SwapKind, SwapLeg,
};

use crate::math;

/// Money-market flash loan fee.
pub const AAVE_FLASH_FEE_BPS: u32 = 5;
/// Constant-product flash-swap fee.
pub const V2_FLASH_FEE_BPS: u32 = 30;
/// V2 swap fee.
pub const V2_SWAP_FEE_BPS: u32 = 30;

/// Empirical slippage applied when no live quote is available.
pub const V2_FALLBACK_SLIPPAGE_BPS: u16 = 300;
pub const V3_FALLBACK_SLIPPAGE_BPS: u16 = 100;
pub const AGGREGATOR_FALLBACK_SLIPPAGE_BPS: u16 = 500;

/// Flash-source headroom: the pool must carry at least twice what we borrow.
const FLASH_HEADROOM: u64 = 2;

pub use crate::types::StrategyKind;

/// Canonical stable-pool lookup: exact `(a,b)` orientation first, then
/// `(b,a)`; first hit in iteration order wins.
pub fn find_stable_pool(pools: &[PoolRef], a: Address, b: Address) -> Option<PoolRef> {
    pools
        .iter()
        .find(|p| p.token0 == a && p.token1 == b)
        .or_else(|| pools.iter().find(|p| p.token0 == b && p.token1 == a))
        .copied()
}

/// Venue observations for one candidate at one close size, gathered by a
/// single batched probe pass.
#[derive(Debug, Default, Clone)]
pub struct VenueBook {
    pub stable_pool: Option<PoolRef>,
    pub stable_quote: Option<Quote>,
    /// Whitelisted V3 pool carrying the (collateral, debt) pair.
    pub v3_pair_pool: Option<PoolRef>,
    pub v3_quote: Option<Quote>,
    /// V2 route collateral -> debt; empty when no path is whitelisted.
    pub v2_path: Vec<Address>,
    pub v2_quote: Option<Quote>,
    /// Whitelisted V2 pair carrying the debt token, with its debt-side reserve.
    pub v2_flash_pair: Option<(PoolRef, U256)>,
    /// Whitelisted V3 pool carrying the debt token, with in-range liquidity.
    pub v3_flash_pool: Option<(PoolRef, U256)>,
    pub aggregator: Option<AggregatorQuote>,
}

/// Everything a strategy needs to judge and build one candidate.
pub struct StrategyCtx<'a> {
    pub borrower: Address,
    pub collateral: Address,
    pub debt: Address,
    pub collateral_is_stable: bool,
    pub debt_is_stable: bool,
    pub collateral_decimals: u8,
    pub debt_decimals: u8,
    /// Oracle prices, 8 fractional digits.
    pub collateral_price: U256,
    pub debt_price: U256,
    pub debt_to_cover: U256,
    /// Collateral the liquidation is expected to seize (conservative).
    pub expected_collateral: U256,
    pub v2_router: Address,
    pub v3_router: Address,
    pub book: &'a VenueBook,
}

impl StrategyCtx<'_> {
    /// Oracle-implied swap output with an empirical slippage haircut, used
    /// when the probe produced no quote for a whitelisted venue.
    pub fn fallback_out(&self, slippage_bps: u16) -> U256 {
        let par = math::convert_amount(
            self.expected_collateral,
            self.collateral_price,
            self.collateral_decimals,
            self.debt_price,
            self.debt_decimals,
        );
        math::apply_bps_down(par, slippage_bps)
    }
}

/// A routed liquidation at a fixed size.
#[derive(Debug, Clone)]
pub struct StrategyPlan {
    pub kind: StrategyKind,
    pub method: ContractMethod,
    pub primary: SwapLeg,
    pub residual: SwapLeg,
    /// Flash-source share of the fee model.
    pub flash_fee_bps: u32,
    /// Swap-venue share of the fee model.
    pub swap_fee_bps: u32,
    /// Debt units expected back from the primary swap.
    pub expected_out: U256,
}

impl StrategyPlan {
    pub fn fee_bps(&self) -> u32 {
        self.flash_fee_bps + self.swap_fee_bps
    }
}

/// Inner calldata hint for a stable-pool exchange: the coin indices the
/// on-chain contract passes to `exchange(i, j, dx, min_dy)`.
pub fn stable_exchange_hint(i: i128, j: i128) -> Bytes {
    Bytes::from((i, j).abi_encode())
}

fn stable_leg(ctx: &StrategyCtx, pool: &PoolRef, floor: U256) -> SwapLeg {
    let (i, j) = if pool.token0 == ctx.collateral {
        (pool.index0, pool.index1)
    } else {
        (pool.index1, pool.index0)
    };
    SwapLeg {
        kind: SwapKind::NativeAggregator,
        router: pool.address,
        path: encode_pair_path(ctx.collateral, ctx.debt, stable_exchange_hint(i, j)),
        amount_in: ctx.expected_collateral,
        amount_out_min: floor,
    }
}

fn v2_leg(ctx: &StrategyCtx, path: &[Address], floor: U256) -> SwapLeg {
    SwapLeg {
        kind: SwapKind::V2,
        router: ctx.v2_router,
        path: encode_v2_path(path),
        amount_in: ctx.expected_collateral,
        amount_out_min: floor,
    }
}

fn v3_leg(ctx: &StrategyCtx, pool: &PoolRef, floor: U256) -> SwapLeg {
    SwapLeg {
        kind: SwapKind::V3,
        router: ctx.v3_router,
        path: encode_v3_path(ctx.collateral, pool.fee_micro, ctx.debt),
        amount_in: ctx.expected_collateral,
        amount_out_min: floor,
    }
}

fn repayment_floor(debt_to_cover: U256, flash_fee_bps: u32) -> U256 {
    debt_to_cover + debt_to_cover * U256::from(flash_fee_bps) / U256::from(10_000u64)
}

/// One liquidation route: a flash source and a swap venue with a fee model.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn priority(&self) -> u8 {
        self.kind().priority()
    }

    fn can_handle(&self, ctx: &StrategyCtx) -> bool;

    /// Build the swap legs and contract method for this route, or `None`
    /// when a precondition that `can_handle` could not see is missing.
    fn build(&self, ctx: &StrategyCtx) -> Option<StrategyPlan>;
}

// ---- strategies, in priority order ----

/// Stable collateral and debt swapped through a stable pool, flash-borrowed
/// from the money market. [1]
struct StableKittyOverAaveFlash;

impl Strategy for StableKittyOverAaveFlash {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StableKittyOverAaveFlash
    }

    fn can_handle(&self, ctx: &StrategyCtx) -> bool {
        ctx.collateral_is_stable && ctx.debt_is_stable && ctx.book.stable_pool.is_some()
    }

    fn build(&self, ctx: &StrategyCtx) -> Option<StrategyPlan> {
        let pool = ctx.book.stable_pool.as_ref()?;
        let floor = repayment_floor(ctx.debt_to_cover, AAVE_FLASH_FEE_BPS);
        let primary = stable_leg(ctx, pool, floor);
        let expected_out = ctx
            .book
            .stable_quote
            .map(|q| q.amount_out)
            .unwrap_or_else(|| ctx.fallback_out(pool.fee_bps() as u16));
        Some(StrategyPlan {
            kind: self.kind(),
            method: ContractMethod::FlashPool,
            residual: SwapLeg::residual(primary.kind, primary.router, primary.path.clone()),
            primary,
            flash_fee_bps: AAVE_FLASH_FEE_BPS,
            swap_fee_bps: pool.fee_bps(),
            expected_out,
        })
    }
}

/// Stable pair swapped through a stable pool, flash-borrowed from a
/// whitelisted V3 pool carrying the pair. [2]
struct StableKittyOverV3Flash;

impl Strategy for StableKittyOverV3Flash {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StableKittyOverV3Flash
    }

    fn can_handle(&self, ctx: &StrategyCtx) -> bool {
        ctx.collateral_is_stable
            && ctx.debt_is_stable
            && ctx.book.stable_pool.is_some()
            && ctx.book.v3_pair_pool.is_some()
    }

    fn build(&self, ctx: &StrategyCtx) -> Option<StrategyPlan> {
        let stable_pool = ctx.book.stable_pool.as_ref()?;
        let flash_pool = ctx.book.v3_pair_pool.as_ref()?;
        let flash_fee = flash_pool.fee_bps();
        let floor = repayment_floor(ctx.debt_to_cover, flash_fee);
        let primary = stable_leg(ctx, stable_pool, floor);
        let expected_out = ctx
            .book
            .stable_quote
            .map(|q| q.amount_out)
            .unwrap_or_else(|| ctx.fallback_out(stable_pool.fee_bps() as u16));
        Some(StrategyPlan {
            kind: self.kind(),
            method: ContractMethod::V3Flash(flash_pool.address),
            residual: SwapLeg::residual(primary.kind, primary.router, primary.path.clone()),
            primary,
            flash_fee_bps: flash_fee,
            swap_fee_bps: stable_pool.fee_bps(),
            expected_out,
        })
    }
}

/// Debt borrowed via a V2 flash-swap from a pair holding at least twice the
/// required reserve; collateral exits through a single V2 swap. [3]
struct V2FlashSwap;

impl Strategy for V2FlashSwap {
    fn kind(&self) -> StrategyKind {
        StrategyKind::V2FlashSwap
    }

    fn can_handle(&self, ctx: &StrategyCtx) -> bool {
        ctx.book
            .v2_flash_pair
            .as_ref()
            .is_some_and(|(_, reserve)| {
                *reserve >= ctx.debt_to_cover * U256::from(FLASH_HEADROOM)
            })
    }

    fn build(&self, ctx: &StrategyCtx) -> Option<StrategyPlan> {
        let (pair, _) = ctx.book.v2_flash_pair.as_ref()?;
        let floor = repayment_floor(ctx.debt_to_cover, V2_FLASH_FEE_BPS);
        let path = [ctx.collateral, ctx.debt];
        let primary = v2_leg(ctx, &path, floor);
        let expected_out = ctx
            .book
            .v2_quote
            .filter(|q| q.amount_in == ctx.expected_collateral)
            .map(|q| q.amount_out)
            .unwrap_or_else(|| ctx.fallback_out(V2_FALLBACK_SLIPPAGE_BPS));
        Some(StrategyPlan {
            kind: self.kind(),
            method: ContractMethod::V2FlashSwap(pair.address),
            residual: SwapLeg::residual(primary.kind, primary.router, primary.path.clone()),
            primary,
            flash_fee_bps: V2_FLASH_FEE_BPS,
            swap_fee_bps: V2_SWAP_FEE_BPS,
            expected_out,
        })
    }
}

/// Debt flash-borrowed from a whitelisted V3 pool with at least twice the
/// required liquidity; collateral exits through a single V2 swap. [4]
struct V3Flash;

impl Strategy for V3Flash {
    fn kind(&self) -> StrategyKind {
        StrategyKind::V3Flash
    }

    fn can_handle(&self, ctx: &StrategyCtx) -> bool {
        ctx.book
            .v3_flash_pool
            .as_ref()
            .is_some_and(|(_, liquidity)| {
                *liquidity >= ctx.debt_to_cover * U256::from(FLASH_HEADROOM)
            })
    }

    fn build(&self, ctx: &StrategyCtx) -> Option<StrategyPlan> {
        let (pool, _) = ctx.book.v3_flash_pool.as_ref()?;
        let flash_fee = pool.fee_bps();
        let floor = repayment_floor(ctx.debt_to_cover, flash_fee);
        let path = [ctx.collateral, ctx.debt];
        let primary = v2_leg(ctx, &path, floor);
        let expected_out = ctx
            .book
            .v2_quote
            .filter(|q| q.amount_in == ctx.expected_collateral)
            .map(|q| q.amount_out)
            .unwrap_or_else(|| ctx.fallback_out(V2_FALLBACK_SLIPPAGE_BPS));
        Some(StrategyPlan {
            kind: self.kind(),
            method: ContractMethod::V3Flash(pool.address),
            residual: SwapLeg::residual(primary.kind, primary.router, primary.path.clone()),
            primary,
            flash_fee_bps: flash_fee,
            swap_fee_bps: V2_SWAP_FEE_BPS,
            expected_out,
        })
    }
}

/// Non-stable pair: money-market flash loan, collateral exits through a V2
/// route (single or multi-hop). [5]
struct V2DirectOverAaveFlash;

impl Strategy for V2DirectOverAaveFlash {
    fn kind(&self) -> StrategyKind {
        StrategyKind::V2DirectOverAaveFlash
    }

    fn can_handle(&self, ctx: &StrategyCtx) -> bool {
        !(ctx.collateral_is_stable && ctx.debt_is_stable) && !ctx.book.v2_path.is_empty()
    }

    fn build(&self, ctx: &StrategyCtx) -> Option<StrategyPlan> {
        if ctx.book.v2_path.is_empty() {
            return None;
        }
        let floor = repayment_floor(ctx.debt_to_cover, AAVE_FLASH_FEE_BPS);
        let primary = v2_leg(ctx, &ctx.book.v2_path, floor);
        let expected_out = ctx
            .book
            .v2_quote
            .map(|q| q.amount_out)
            .unwrap_or_else(|| ctx.fallback_out(V2_FALLBACK_SLIPPAGE_BPS));
        Some(StrategyPlan {
            kind: self.kind(),
            method: ContractMethod::FlashPool,
            residual: SwapLeg::residual(primary.kind, primary.router, primary.path.clone()),
            primary,
            flash_fee_bps: AAVE_FLASH_FEE_BPS,
            swap_fee_bps: V2_SWAP_FEE_BPS,
            expected_out,
        })
    }
}

/// Money-market flash loan with the collateral exiting directly on the pair's
/// V3 pool; the residual drains through the V2 route. [6]
struct V3DirectOverAaveFlash;

impl Strategy for V3DirectOverAaveFlash {
    fn kind(&self) -> StrategyKind {
        StrategyKind::V3DirectOverAaveFlash
    }

    fn can_handle(&self, ctx: &StrategyCtx) -> bool {
        ctx.book.v3_pair_pool.is_some() && !ctx.book.v2_path.is_empty()
    }

    fn build(&self, ctx: &StrategyCtx) -> Option<StrategyPlan> {
        let pool = ctx.book.v3_pair_pool.as_ref()?;
        let floor = repayment_floor(ctx.debt_to_cover, AAVE_FLASH_FEE_BPS);
        let primary = v3_leg(ctx, pool, floor);
        let residual = SwapLeg::residual(
            SwapKind::V2,
            ctx.v2_router,
            encode_v2_path(&ctx.book.v2_path),
        );
        // The sqrt-price figure is ranking-only; haircut it like a V3 venue.
        let expected_out = ctx
            .book
            .v3_quote
            .map(|q| math::apply_bps_down(q.amount_out, V3_FALLBACK_SLIPPAGE_BPS))
            .unwrap_or_else(|| ctx.fallback_out(V3_FALLBACK_SLIPPAGE_BPS));
        Some(StrategyPlan {
            kind: self.kind(),
            method: ContractMethod::FlashPool,
            primary,
            residual,
            flash_fee_bps: AAVE_FLASH_FEE_BPS,
            swap_fee_bps: V2_SWAP_FEE_BPS,
            expected_out,
        })
    }
}

/// Last resort: money-market flash loan with the collateral exit routed by
/// the external aggregator. [99]
struct AggregatorOverAaveFlash;

impl Strategy for AggregatorOverAaveFlash {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AggregatorOverAaveFlash
    }

    fn can_handle(&self, ctx: &StrategyCtx) -> bool {
        ctx.book.aggregator.is_some()
    }

    fn build(&self, ctx: &StrategyCtx) -> Option<StrategyPlan> {
        let quote = ctx.book.aggregator.as_ref()?;
        let floor = repayment_floor(ctx.debt_to_cover, AAVE_FLASH_FEE_BPS);
        let path = encode_pair_path(ctx.collateral, ctx.debt, quote.data.clone());
        let primary = SwapLeg {
            kind: SwapKind::ExternalAggregator,
            router: quote.to,
            path: path.clone(),
            amount_in: ctx.expected_collateral,
            amount_out_min: floor,
        };
        Some(StrategyPlan {
            kind: self.kind(),
            method: ContractMethod::FlashPool,
            residual: SwapLeg::residual(SwapKind::ExternalAggregator, quote.to, path),
            primary,
            flash_fee_bps: AAVE_FLASH_FEE_BPS,
            swap_fee_bps: AGGREGATOR_FALLBACK_SLIPPAGE_BPS as u32,
            expected_out: quote.to_amount,
        })
    }
}

/// The closed registry, iterated in priority order.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn standard() -> Self {
        let mut strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(StableKittyOverAaveFlash),
            Box::new(StableKittyOverV3Flash),
            Box::new(V2FlashSwap),
            Box::new(V3Flash),
            Box::new(V2DirectOverAaveFlash),
            Box::new(V3DirectOverAaveFlash),
            Box::new(AggregatorOverAaveFlash),
        ];
        strategies.sort_by_key(|s| s.priority());
        Self { strategies }
    }

    /// Every applicable route, ordered by priority then projected output.
    pub fn applicable(&self, ctx: &StrategyCtx) -> Vec<StrategyPlan> {
        let mut plans: Vec<StrategyPlan> = self
            .strategies
            .iter()
            .filter(|s| s.can_handle(ctx))
            .filter_map(|s| s.build(ctx))
            .collect();
        plans.sort_by(|a, b| {
            a.kind
                .priority()
                .cmp(&b.kind.priority())
                .then(b.expected_out.cmp(&a.expected_out))
        });
        plans
    }

    /// Highest-priority applicable route.
    pub fn best(&self, ctx: &StrategyCtx) -> Option<StrategyPlan> {
        self.applicable(ctx).into_iter().next()
    }
}

/// Build the contract-call parameter block for a plan.
pub fn execute_params(ctx: &StrategyCtx) -> ExecuteParams {
    ExecuteParams {
        collateral_asset: ctx.collateral,
        debt_asset: ctx.debt,
        user: ctx.borrower,
        amount: ctx.debt_to_cover,
        transfer_amount: ctx.debt_to_cover,
        debt_to_cover: ctx.debt_to_cover,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquidator_chain::Venue;

    const PRICE_ONE: u64 = 100_000_000;

    fn stable_pool() -> PoolRef {
        PoolRef {
            venue: Venue::Stable,
            address: Address::repeat_byte(0x50),
            token0: Address::repeat_byte(0x01),
            token1: Address::repeat_byte(0x02),
            fee_micro: 400,
            index0: 0,
            index1: 1,
        }
    }

    fn ctx<'a>(book: &'a VenueBook, both_stable: bool) -> StrategyCtx<'a> {
        StrategyCtx {
            borrower: Address::repeat_byte(0xB0),
            collateral: Address::repeat_byte(0x01),
            debt: Address::repeat_byte(0x02),
            collateral_is_stable: both_stable,
            debt_is_stable: both_stable,
            collateral_decimals: 6,
            debt_decimals: 6,
            collateral_price: U256::from(PRICE_ONE),
            debt_price: U256::from(PRICE_ONE),
            debt_to_cover: U256::from(500_500_000u64),
            expected_collateral: U256::from(520_269_750u64),
            v2_router: Address::repeat_byte(0xD2),
            v3_router: Address::repeat_byte(0xD3),
            book,
        }
    }

    #[test]
    fn test_find_stable_pool_canonical_order() {
        let exact = stable_pool();
        let mut flipped = stable_pool();
        flipped.address = Address::repeat_byte(0x51);
        flipped.token0 = exact.token1;
        flipped.token1 = exact.token0;

        // Flipped listed first, exact second: exact orientation still wins.
        let pools = vec![flipped, exact];
        let found =
            find_stable_pool(&pools, Address::repeat_byte(0x01), Address::repeat_byte(0x02))
                .unwrap();
        assert_eq!(found.address, exact.address);

        // Only the flipped orientation present: it is accepted.
        let pools = vec![flipped];
        let found =
            find_stable_pool(&pools, Address::repeat_byte(0x01), Address::repeat_byte(0x02))
                .unwrap();
        assert_eq!(found.address, flipped.address);

        assert!(find_stable_pool(&[], Address::ZERO, Address::ZERO).is_none());
    }

    #[test]
    fn test_stable_pair_selects_priority_one() {
        let book = VenueBook {
            stable_pool: Some(stable_pool()),
            stable_quote: Some(Quote {
                venue: Venue::Stable,
                pool: Address::repeat_byte(0x50),
                amount_in: U256::from(520_269_750u64),
                amount_out: U256::from(525_800_000u64),
                fee_bps: 4,
            }),
            ..Default::default()
        };
        let ctx = ctx(&book, true);
        let registry = StrategyRegistry::standard();

        let plan = registry.best(&ctx).unwrap();
        assert_eq!(plan.kind, StrategyKind::StableKittyOverAaveFlash);
        assert_eq!(plan.method, ContractMethod::FlashPool);
        assert_eq!(plan.fee_bps(), 5 + 4);
        assert_eq!(plan.expected_out, U256::from(525_800_000u64));
        // minOut floor covers flash repayment: debtToCover * 1.0005
        assert_eq!(plan.primary.amount_out_min, U256::from(500_750_250u64));
        // Residual is a balance pass-through
        assert_eq!(plan.residual.amount_in, U256::ZERO);
    }

    #[test]
    fn test_v2_flash_swap_requires_double_reserve() {
        let pair = PoolRef {
            venue: Venue::V2,
            address: Address::repeat_byte(0x60),
            token0: Address::repeat_byte(0x02),
            token1: Address::repeat_byte(0x03),
            fee_micro: 3_000,
            index0: 0,
            index1: 1,
        };

        // Reserve below 2x requirement: not applicable
        let thin = VenueBook {
            v2_flash_pair: Some((pair, U256::from(900_000_000u64))),
            v2_path: vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02)],
            ..Default::default()
        };
        let thin_ctx = ctx(&thin, false);
        let registry = StrategyRegistry::standard();
        let plans = registry.applicable(&thin_ctx);
        assert!(!plans.iter().any(|p| p.kind == StrategyKind::V2FlashSwap));

        // Reserve at 2x: applicable and outranks the direct route
        let deep = VenueBook {
            v2_flash_pair: Some((pair, U256::from(1_001_000_000u64))),
            v2_path: vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02)],
            ..Default::default()
        };
        let deep_ctx = ctx(&deep, false);
        let plan = registry.best(&deep_ctx).unwrap();
        assert_eq!(plan.kind, StrategyKind::V2FlashSwap);
        assert_eq!(plan.fee_bps(), 30 + 30);
        assert!(matches!(plan.method, ContractMethod::V2FlashSwap(addr) if addr == pair.address));
    }

    #[test]
    fn test_non_stable_falls_through_to_v2_direct() {
        let book = VenueBook {
            v2_path: vec![
                Address::repeat_byte(0x01),
                Address::repeat_byte(0x0E),
                Address::repeat_byte(0x02),
            ],
            v2_quote: Some(Quote {
                venue: Venue::V2,
                pool: Address::ZERO,
                amount_in: U256::from(520_269_750u64),
                amount_out: U256::from(515_000_000u64),
                fee_bps: 30,
            }),
            ..Default::default()
        };
        let ctx = ctx(&book, false);
        let registry = StrategyRegistry::standard();

        let plan = registry.best(&ctx).unwrap();
        assert_eq!(plan.kind, StrategyKind::V2DirectOverAaveFlash);
        assert_eq!(plan.fee_bps(), 5 + 30);
        // Multi-hop path survives encoding: 3 tokens = 60 bytes
        assert_eq!(plan.primary.path.len(), 60);
    }

    #[test]
    fn test_aggregator_is_last_resort() {
        let book = VenueBook {
            aggregator: Some(AggregatorQuote {
                to: Address::repeat_byte(0x70),
                data: Bytes::from(vec![0xAB]),
                to_amount: U256::from(519_000_000u64),
                to_amount_min: U256::from(510_000_000u64),
                from_amount_usd: 520.0,
                to_amount_usd: 519.0,
            }),
            v2_path: vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02)],
            v2_quote: Some(Quote {
                venue: Venue::V2,
                pool: Address::ZERO,
                amount_in: U256::from(520_269_750u64),
                amount_out: U256::from(1u64), // terrible, but higher priority
                fee_bps: 30,
            }),
            ..Default::default()
        };
        let ctx = ctx(&book, false);
        let registry = StrategyRegistry::standard();

        let plans = registry.applicable(&ctx);
        // Priority wins over projected output
        assert_eq!(plans[0].kind, StrategyKind::V2DirectOverAaveFlash);
        assert_eq!(
            plans.last().unwrap().kind,
            StrategyKind::AggregatorOverAaveFlash
        );
    }

    #[test]
    fn test_no_venue_no_plan() {
        let book = VenueBook::default();
        let ctx = ctx(&book, false);
        let registry = StrategyRegistry::standard();
        assert!(registry.best(&ctx).is_none());
    }

    #[test]
    fn test_stable_leg_orientation() {
        let book = VenueBook {
            stable_pool: Some(stable_pool()),
            ..Default::default()
        };
        let context = ctx(&book, true);
        let leg = stable_leg(&context, &stable_pool(), U256::from(1u64));
        assert_eq!(leg.kind, SwapKind::NativeAggregator);
        assert_eq!(leg.router, Address::repeat_byte(0x50));

        let (t0, t1, hint) = liquidator_chain::contracts::decode_pair_path(&leg.path).unwrap();
        assert_eq!(t0, context.collateral);
        assert_eq!(t1, context.debt);
        assert_eq!(hint, stable_exchange_hint(0, 1));
    }
}
