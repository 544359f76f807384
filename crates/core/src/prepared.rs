//! Prepared-liquidation cache and background preparer.
//!
//! For hot borrowers the full routing/sizing work happens ahead of time so
//! the block trigger can go from "HF crossed one" to a signed transaction
//! within a single handler activation. Prepared bundles expire after a short
//! TTL; concurrent preparation for one borrower is suppressed by a sentinel.

use alloy::primitives::{Address, U256};
use anyhow::Result;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use liquidator_api::{AggregatorClient, AggregatorRequest};
use liquidator_chain::contracts::pool as pool_abi;
use liquidator_chain::{
    LiquidityProbe, Multicall, PoolRef, Quote, QuoteRequest, SubCall,
};

use crate::assets::AssetRegistry;
use crate::caches::{PriceCache, ReserveConfigCache};
use crate::math;
use crate::sizer::{self, SizedCandidate};
use crate::strategy::{execute_params, find_stable_pool, StrategyCtx, StrategyRegistry, VenueBook};
use crate::types::{FailReason, PreparedLiquidation};

/// Soft limit of borrowers prepared per batch pass.
const BORROWER_CHUNK: usize = 50;

/// Gas-unit budget shared by all ladder rungs.
const LIQUIDATION_GAS_UNITS: u64 = 1_900_000;

/// Cache of ready-to-submit liquidations with a preparing sentinel.
pub struct PreparedCache {
    entries: DashMap<Address, PreparedLiquidation>,
    preparing: DashSet<Address>,
    ttl: Duration,
}

impl PreparedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            preparing: DashSet::new(),
            ttl,
        }
    }

    /// A prepared bundle is only handed out while inside its TTL.
    pub fn get_valid(&self, borrower: &Address) -> Option<PreparedLiquidation> {
        self.entries
            .get(borrower)
            .filter(|p| p.age() <= self.ttl)
            .map(|p| p.clone())
    }

    pub fn has_valid(&self, borrower: &Address) -> bool {
        self.get_valid(borrower).is_some()
    }

    pub fn insert(&self, prepared: PreparedLiquidation) {
        self.entries.insert(prepared.borrower, prepared);
    }

    pub fn invalidate(&self, borrower: &Address) {
        self.entries.remove(borrower);
    }

    /// Claim the preparing sentinel; false when someone else already holds it.
    pub fn begin_preparing(&self, borrower: Address) -> bool {
        self.preparing.insert(borrower)
    }

    pub fn finish_preparing(&self, borrower: &Address) {
        self.preparing.remove(borrower);
    }

    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, p| p.age() <= self.ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whitelisted venues, resolved from configuration once at startup.
#[derive(Debug, Clone, Default)]
pub struct Venues {
    pub stable_pools: Vec<PoolRef>,
    pub v2_pairs: Vec<PoolRef>,
    pub v3_pools: Vec<PoolRef>,
    pub v2_hop_tokens: Vec<Address>,
}

impl Venues {
    /// Direct or one-hop V2 route from `from` to `to`; empty when none.
    pub fn v2_route(&self, from: Address, to: Address) -> Vec<Address> {
        if self.v2_pairs.iter().any(|p| p.pairs(from, to)) {
            return vec![from, to];
        }
        for hop in &self.v2_hop_tokens {
            if *hop != from
                && *hop != to
                && self.v2_pairs.iter().any(|p| p.pairs(from, *hop))
                && self.v2_pairs.iter().any(|p| p.pairs(*hop, to))
            {
                return vec![from, *hop, to];
            }
        }
        Vec::new()
    }

    pub fn v3_pair_pool(&self, a: Address, b: Address) -> Option<PoolRef> {
        self.v3_pools.iter().find(|p| p.pairs(a, b)).copied()
    }

    pub fn v2_pair_with(&self, token: Address) -> Option<PoolRef> {
        self.v2_pairs.iter().find(|p| p.carries(token)).copied()
    }

    pub fn v3_pool_with(&self, token: Address) -> Option<PoolRef> {
        self.v3_pools.iter().find(|p| p.carries(token)).copied()
    }
}

/// Sizing and routing knobs, lifted from the config at startup.
#[derive(Debug, Clone)]
pub struct PrepareSettings {
    pub ladder_pct: Vec<u8>,
    pub close_factor_pct: u8,
    pub interest_buffer_bps: u16,
    pub conservative_factor_pct: u8,
    pub gas_cost_usd: f64,
    pub chain_id: u64,
    pub v2_router: Address,
    pub v3_router: Address,
    pub profit_receiver: Address,
    pub aggregator_slippage: f64,
}

/// Outcome of building one candidate.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Ready(PreparedLiquidation),
    Rejected(FailReason),
}

/// Largest collateral and debt holding of one borrower.
#[derive(Debug, Clone)]
struct HoldingView {
    collateral: Address,
    collateral_amount: U256,
    debt: Address,
    debt_amount: U256,
}

/// Background builder of prepared liquidations.
pub struct Preparer {
    multicall: Multicall,
    probe: LiquidityProbe,
    prices: Arc<PriceCache>,
    reserve_configs: Arc<ReserveConfigCache>,
    assets: Arc<AssetRegistry>,
    registry: StrategyRegistry,
    cache: Arc<PreparedCache>,
    aggregator: Option<Arc<AggregatorClient>>,
    venues: Venues,
    settings: PrepareSettings,
}

impl Preparer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        multicall: Multicall,
        probe: LiquidityProbe,
        prices: Arc<PriceCache>,
        reserve_configs: Arc<ReserveConfigCache>,
        assets: Arc<AssetRegistry>,
        cache: Arc<PreparedCache>,
        aggregator: Option<Arc<AggregatorClient>>,
        venues: Venues,
        settings: PrepareSettings,
    ) -> Self {
        Self {
            multicall,
            probe,
            prices,
            reserve_configs,
            assets,
            registry: StrategyRegistry::standard(),
            cache,
            aggregator,
            venues,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<PreparedCache> {
        &self.cache
    }

    /// Prepare liquidations for a set of hot borrowers, chunked at the
    /// borrower soft limit. Individual failures are logged, never fatal.
    pub async fn prepare_batch(&self, borrowers: &[(Address, Address)]) {
        for chunk in borrowers.chunks(BORROWER_CHUNK) {
            let claimed: Vec<(Address, Address)> = chunk
                .iter()
                .filter(|(borrower, _)| {
                    !self.cache.has_valid(borrower) && self.cache.begin_preparing(*borrower)
                })
                .copied()
                .collect();
            if claimed.is_empty() {
                continue;
            }

            let result = self.prepare_claimed(&claimed).await;
            for (borrower, _) in &claimed {
                self.cache.finish_preparing(borrower);
            }
            if let Err(e) = result {
                warn!(error = %e, batch = claimed.len(), "Batched preparation failed");
            }
        }
    }

    async fn prepare_claimed(&self, borrowers: &[(Address, Address)]) -> Result<()> {
        let batch_start = Instant::now();

        // Stage 1: receipt-token balances for every borrower x reserve.
        let stage = Instant::now();
        let holdings = self.read_holdings(borrowers).await?;
        let holdings_ms = stage.elapsed().as_millis() as u64;

        // Stage 2: oracle prices for every involved asset.
        let stage = Instant::now();
        let mut involved: Vec<Address> = holdings
            .values()
            .flat_map(|h| [h.collateral, h.debt])
            .collect();
        involved.sort();
        involved.dedup();
        let prices = self.prices.get_many(&involved).await?;
        let configs = self.reserve_configs.get_many(&involved).await?;
        let prices_ms = stage.elapsed().as_millis() as u64;

        // Stage 3: debt-reserve availability per borrower's debt asset.
        let stage = Instant::now();
        let reserves = self.read_available_reserves(&holdings).await?;
        let reserves_ms = stage.elapsed().as_millis() as u64;

        // Stage 4+5: quotes and routing, per borrower.
        let stage = Instant::now();
        let mut ready = 0usize;
        for ((borrower, pool), holding) in borrowers.iter().filter_map(|key| {
            holdings.get(&key.0).map(|h| (*key, h.clone()))
        }) {
            let available = reserves
                .get(&holding.debt)
                .copied()
                .unwrap_or(U256::MAX);
            match self
                .build_candidate(borrower, pool, &holding, &prices, &configs, available, &[])
                .await
            {
                Ok(BuildOutcome::Ready(prepared)) => {
                    info!(
                        borrower = %borrower,
                        strategy = prepared.strategy.name(),
                        profit_usd = prepared.estimated_profit_usd,
                        "Liquidation prepared"
                    );
                    self.cache.insert(prepared);
                    ready += 1;
                }
                Ok(BuildOutcome::Rejected(reason)) => {
                    debug!(borrower = %borrower, reason = reason.as_str(), "Preparation rejected");
                }
                Err(e) => {
                    debug!(borrower = %borrower, error = %e, "Preparation failed");
                }
            }
        }

        debug!(
            borrowers = borrowers.len(),
            ready,
            holdings_ms,
            prices_ms,
            reserves_ms,
            route_ms = stage.elapsed().as_millis() as u64,
            total_ms = batch_start.elapsed().as_millis() as u64,
            "Preparation batch timings"
        );
        Ok(())
    }

    /// Route and size one borrower; usable directly by the executor's slow
    /// path as well as the background batch.
    pub async fn build_one(&self, borrower: Address, pool: Address) -> Result<BuildOutcome> {
        self.build_one_excluding(borrower, pool, &[]).await
    }

    /// Same, but skipping strategies that already failed simulation this
    /// attempt. The executor escalates through routes with this.
    pub async fn build_one_excluding(
        &self,
        borrower: Address,
        pool: Address,
        exclude: &[crate::types::StrategyKind],
    ) -> Result<BuildOutcome> {
        let keys = [(borrower, pool)];
        let holdings = self.read_holdings(&keys).await?;
        let Some(holding) = holdings.get(&borrower).cloned() else {
            return Ok(BuildOutcome::Rejected(FailReason::NoStrategy));
        };

        let involved = [holding.collateral, holding.debt];
        let prices = self.prices.get_many(&involved).await?;
        let configs = self.reserve_configs.get_many(&involved).await?;
        let reserves = self.read_available_reserves(&holdings).await?;
        let available = reserves
            .get(&holding.debt)
            .copied()
            .unwrap_or(U256::MAX);

        self.build_candidate(borrower, pool, &holding, &prices, &configs, available, exclude)
            .await
    }

    async fn read_holdings(
        &self,
        borrowers: &[(Address, Address)],
    ) -> Result<HashMap<Address, HoldingView>> {
        let assets: Vec<_> = self.assets.all().cloned().collect();
        let mut calls = Vec::with_capacity(borrowers.len() * assets.len() * 2);
        for (borrower, _) in borrowers {
            for asset in &assets {
                calls.push(SubCall::new(asset.a_token, pool_abi::balance_of_call(*borrower)));
                calls.push(SubCall::new(
                    asset.variable_debt_token,
                    pool_abi::balance_of_call(*borrower),
                ));
            }
        }
        let results = self.multicall.aggregate(&calls).await?;

        // Prices for ranking largest holdings; stale values are acceptable
        // here, the executor re-simulates before submitting.
        let asset_addrs: Vec<Address> = assets.iter().map(|a| a.address).collect();
        let prices = self.prices.get_many(&asset_addrs).await.unwrap_or_default();

        let mut out = HashMap::new();
        let per_borrower = assets.len() * 2;
        for (i, (borrower, _)) in borrowers.iter().enumerate() {
            let slice = &results[i * per_borrower..(i + 1) * per_borrower];
            let mut best_collateral: Option<(Address, U256, f64)> = None;
            let mut best_debt: Option<(Address, U256, f64)> = None;

            for (j, asset) in assets.iter().enumerate() {
                let supply = slice[j * 2]
                    .success
                    .then(|| pool_abi::decode_balance(&slice[j * 2].return_data).ok())
                    .flatten()
                    .unwrap_or(U256::ZERO);
                let borrowed = slice[j * 2 + 1]
                    .success
                    .then(|| pool_abi::decode_balance(&slice[j * 2 + 1].return_data).ok())
                    .flatten()
                    .unwrap_or(U256::ZERO);

                let price = prices.get(&asset.address).copied().unwrap_or(U256::ZERO);
                if !supply.is_zero() {
                    let usd = math::token_value_usd(supply, price, asset.decimals);
                    if best_collateral.is_none_or(|(_, _, v)| usd > v) {
                        best_collateral = Some((asset.address, supply, usd));
                    }
                }
                if !borrowed.is_zero() {
                    let usd = math::token_value_usd(borrowed, price, asset.decimals);
                    if best_debt.is_none_or(|(_, _, v)| usd > v) {
                        best_debt = Some((asset.address, borrowed, usd));
                    }
                }
            }

            if let (Some((collateral, collateral_amount, _)), Some((debt, debt_amount, _))) =
                (best_collateral, best_debt)
            {
                out.insert(
                    *borrower,
                    HoldingView {
                        collateral,
                        collateral_amount,
                        debt,
                        debt_amount,
                    },
                );
            }
        }
        Ok(out)
    }

    /// Underlying debt-asset balance held by its own aToken: the reserve the
    /// pool can actually pay out in a liquidation.
    async fn read_available_reserves(
        &self,
        holdings: &HashMap<Address, HoldingView>,
    ) -> Result<HashMap<Address, U256>> {
        let mut debt_assets: Vec<Address> = holdings.values().map(|h| h.debt).collect();
        debt_assets.sort();
        debt_assets.dedup();

        let mut calls = Vec::new();
        let mut targets = Vec::new();
        for debt in &debt_assets {
            if let Some(asset) = self.assets.get(debt) {
                calls.push(SubCall::new(*debt, pool_abi::balance_of_call(asset.a_token)));
                targets.push(*debt);
            }
        }
        let results = self.multicall.aggregate(&calls).await?;

        let mut out = HashMap::new();
        for (debt, result) in targets.iter().zip(results) {
            if result.success {
                if let Ok(balance) = pool_abi::decode_balance(&result.return_data) {
                    out.insert(*debt, balance);
                }
            }
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_candidate(
        &self,
        borrower: Address,
        pool: Address,
        holding: &HoldingView,
        prices: &HashMap<Address, U256>,
        configs: &HashMap<Address, liquidator_chain::ReserveConfig>,
        available_reserve: U256,
        exclude: &[crate::types::StrategyKind],
    ) -> Result<BuildOutcome> {
        let Some(collateral_asset) = self.assets.get(&holding.collateral) else {
            return Ok(BuildOutcome::Rejected(FailReason::NoStrategy));
        };
        let Some(debt_asset) = self.assets.get(&holding.debt) else {
            return Ok(BuildOutcome::Rejected(FailReason::NoStrategy));
        };
        let (Some(&collateral_price), Some(&debt_price)) = (
            prices.get(&holding.collateral),
            prices.get(&holding.debt),
        ) else {
            return Ok(BuildOutcome::Rejected(FailReason::NoStrategy));
        };
        let bonus = configs
            .get(&holding.collateral)
            .map(|c| c.liquidation_bonus)
            .unwrap_or(10_500);

        // Per-rung amounts, then every venue quote for every rung in one pass.
        // Rungs are clamped at the close factor regardless of configuration.
        let rungs: Vec<(u8, U256, U256)> = self
            .settings
            .ladder_pct
            .iter()
            .map(|&fraction| {
                let debt_to_cover = math::ladder_amount(
                    holding.debt_amount,
                    fraction.min(self.settings.close_factor_pct),
                    self.settings.interest_buffer_bps,
                    available_reserve,
                );
                let seized = math::expected_collateral(
                    debt_to_cover,
                    debt_price,
                    collateral_price,
                    bonus,
                    debt_asset.decimals,
                    collateral_asset.decimals,
                    self.settings.conservative_factor_pct,
                );
                (fraction, debt_to_cover, seized)
            })
            .collect();

        // Cap the seizure at what the borrower actually holds.
        let rungs: Vec<(u8, U256, U256)> = rungs
            .into_iter()
            .map(|(f, d, s)| (f, d, s.min(holding.collateral_amount)))
            .collect();

        let stable_pool = find_stable_pool(
            &self.venues.stable_pools,
            holding.collateral,
            holding.debt,
        );
        let v3_pair_pool = self.venues.v3_pair_pool(holding.collateral, holding.debt);
        let v2_path = self.venues.v2_route(holding.collateral, holding.debt);
        let v2_flash = self.venues.v2_pair_with(holding.debt);
        let v3_flash = self.venues.v3_pool_with(holding.debt);

        let mut requests = Vec::new();
        let mut request_index: Vec<(usize, &'static str)> = Vec::new();
        for (i, (_, _, seized)) in rungs.iter().enumerate() {
            if seized.is_zero() {
                continue;
            }
            if let Some(pool_ref) = stable_pool {
                requests.push(QuoteRequest {
                    pool: pool_ref,
                    token_in: holding.collateral,
                    token_out: holding.debt,
                    amount_in: *seized,
                });
                request_index.push((i, "stable"));
            }
            if v2_path.len() == 2 {
                if let Some(pair) = self.venues.v2_pairs.iter().find(|p| {
                    p.pairs(holding.collateral, holding.debt)
                }) {
                    requests.push(QuoteRequest {
                        pool: *pair,
                        token_in: holding.collateral,
                        token_out: holding.debt,
                        amount_in: *seized,
                    });
                    request_index.push((i, "v2"));
                }
            }
            if let Some(pool_ref) = v3_pair_pool {
                requests.push(QuoteRequest {
                    pool: pool_ref,
                    token_in: holding.collateral,
                    token_out: holding.debt,
                    amount_in: *seized,
                });
                request_index.push((i, "v3"));
            }
        }
        let quotes = self.probe.quote_batch(&requests).await?;

        // Flash-source depth reads.
        let v2_flash_reserve = match v2_flash {
            Some(pair) => {
                let reserves = self.probe.v2_reserves(&[pair.address]).await?;
                reserves[0].map(|(r0, r1)| {
                    let debt_side = if pair.token0 == holding.debt { r0 } else { r1 };
                    (pair, debt_side)
                })
            }
            None => None,
        };
        let v3_flash_liquidity = match v3_flash {
            Some(pool_ref) => {
                let liquidity = self.probe.v3_liquidity(&[pool_ref.address]).await?;
                liquidity[0].map(|l| (pool_ref, l))
            }
            None => None,
        };

        let mut per_rung_quotes: Vec<HashMap<&'static str, Quote>> =
            vec![HashMap::new(); rungs.len()];
        for ((rung, venue), quote) in request_index.iter().zip(quotes) {
            if let Some(quote) = quote {
                per_rung_quotes[*rung].insert(*venue, quote);
            }
        }

        // Aggregator fallback only when no on-chain venue exists at all.
        let no_onchain_venue =
            stable_pool.is_none() && v2_path.is_empty() && v3_pair_pool.is_none();
        let aggregator_quote = if no_onchain_venue {
            self.fetch_aggregator_quote(holding, &rungs).await
        } else {
            None
        };

        let ladder = self.settings.ladder_pct.clone();
        let sized = sizer::pick_size(
            &ladder,
            LIQUIDATION_GAS_UNITS,
            |fraction| {
                let idx = rungs.iter().position(|(f, _, _)| *f == fraction)?;
                let (_, debt_to_cover, seized) = rungs[idx];
                if debt_to_cover.is_zero() || seized.is_zero() {
                    return None;
                }
                let book = VenueBook {
                    stable_pool,
                    stable_quote: per_rung_quotes[idx].get("stable").copied(),
                    v3_pair_pool,
                    v3_quote: per_rung_quotes[idx].get("v3").copied(),
                    v2_path: v2_path.clone(),
                    v2_quote: per_rung_quotes[idx].get("v2").copied(),
                    v2_flash_pair: v2_flash_reserve,
                    v3_flash_pool: v3_flash_liquidity,
                    aggregator: aggregator_quote.clone(),
                };
                let ctx = StrategyCtx {
                    borrower,
                    collateral: holding.collateral,
                    debt: holding.debt,
                    collateral_is_stable: collateral_asset.stable,
                    debt_is_stable: debt_asset.stable,
                    collateral_decimals: collateral_asset.decimals,
                    debt_decimals: debt_asset.decimals,
                    collateral_price,
                    debt_price,
                    debt_to_cover,
                    expected_collateral: seized,
                    v2_router: self.settings.v2_router,
                    v3_router: self.settings.v3_router,
                    book: &book,
                };
                let plan = self
                    .registry
                    .applicable(&ctx)
                    .into_iter()
                    .find(|p| !exclude.contains(&p.kind))?;
                let profit_usd = sizer::plan_profit_usd(
                    &plan,
                    debt_to_cover,
                    debt_price,
                    debt_asset.decimals,
                    self.settings.gas_cost_usd,
                );
                Some(SizedCandidate {
                    fraction_pct: fraction,
                    debt_to_cover,
                    expected_collateral: seized,
                    plan,
                    profit_usd,
                })
            },
        );

        let candidate = match sized {
            Ok(candidate) => candidate,
            Err(reason) => return Ok(BuildOutcome::Rejected(reason)),
        };

        let ctx_for_params = StrategyCtx {
            borrower,
            collateral: holding.collateral,
            debt: holding.debt,
            collateral_is_stable: collateral_asset.stable,
            debt_is_stable: debt_asset.stable,
            collateral_decimals: collateral_asset.decimals,
            debt_decimals: debt_asset.decimals,
            collateral_price,
            debt_price,
            debt_to_cover: candidate.debt_to_cover,
            expected_collateral: candidate.expected_collateral,
            v2_router: self.settings.v2_router,
            v3_router: self.settings.v3_router,
            book: &VenueBook::default(),
        };

        Ok(BuildOutcome::Ready(PreparedLiquidation {
            borrower,
            pool,
            strategy: candidate.plan.kind,
            method: candidate.plan.method,
            params: execute_params(&ctx_for_params),
            primary_swap: candidate.plan.primary.clone(),
            residual_swap: candidate.plan.residual.clone(),
            expected_collateral: candidate.expected_collateral,
            expected_out: candidate.plan.expected_out,
            flash_fee_bps: candidate.plan.flash_fee_bps,
            debt_to_cover_usd: math::token_value_usd(
                candidate.debt_to_cover,
                debt_price,
                debt_asset.decimals,
            ),
            estimated_profit_usd: candidate.profit_usd,
            created_at: Instant::now(),
        }))
    }

    async fn fetch_aggregator_quote(
        &self,
        holding: &HoldingView,
        rungs: &[(u8, U256, U256)],
    ) -> Option<liquidator_api::AggregatorQuote> {
        let client = self.aggregator.as_ref()?;
        // Quote the largest rung; the aggregator path is the venue of last
        // resort and is not re-quoted per fraction.
        let (_, _, seized) = rungs.last()?;
        if seized.is_zero() {
            return None;
        }
        let request = AggregatorRequest {
            chain_id: self.settings.chain_id,
            from_token: holding.collateral,
            to_token: holding.debt,
            from_amount: *seized,
            from_address: self.settings.profit_receiver,
            to_address: self.settings.profit_receiver,
            slippage: self.settings.aggregator_slippage,
        };
        match client.quote(&request).await {
            Ok(quote) => Some(quote),
            Err(e) => {
                debug!(error = %e, "Aggregator quote failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquidator_chain::{ContractMethod, SwapKind, SwapLeg, Venue};

    fn prepared(borrower: Address) -> PreparedLiquidation {
        let leg = SwapLeg {
            kind: SwapKind::V2,
            router: Address::ZERO,
            path: alloy::primitives::Bytes::new(),
            amount_in: U256::ZERO,
            amount_out_min: U256::ZERO,
        };
        PreparedLiquidation {
            borrower,
            pool: Address::repeat_byte(0xF0),
            strategy: crate::types::StrategyKind::V2DirectOverAaveFlash,
            method: ContractMethod::FlashPool,
            params: liquidator_chain::ExecuteParams {
                collateral_asset: Address::repeat_byte(1),
                debt_asset: Address::repeat_byte(2),
                user: borrower,
                amount: U256::from(1000u64),
                transfer_amount: U256::from(1000u64),
                debt_to_cover: U256::from(1000u64),
            },
            primary_swap: leg.clone(),
            residual_swap: leg,
            expected_collateral: U256::from(1100u64),
            expected_out: U256::from(1050u64),
            flash_fee_bps: 5,
            debt_to_cover_usd: 1_000.0,
            estimated_profit_usd: 4.2,
            created_at: Instant::now(),
        }
    }

    #[test]
    fn test_cache_ttl() {
        let cache = PreparedCache::new(Duration::from_millis(30));
        let borrower = Address::repeat_byte(1);
        cache.insert(prepared(borrower));
        assert!(cache.has_valid(&borrower));

        std::thread::sleep(Duration::from_millis(40));
        assert!(!cache.has_valid(&borrower));
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_preparing_sentinel() {
        let cache = PreparedCache::new(Duration::from_secs(30));
        let borrower = Address::repeat_byte(2);
        assert!(cache.begin_preparing(borrower));
        // Second claim is rejected while the first is in flight
        assert!(!cache.begin_preparing(borrower));
        cache.finish_preparing(&borrower);
        assert!(cache.begin_preparing(borrower));
    }

    #[test]
    fn test_invalidate() {
        let cache = PreparedCache::new(Duration::from_secs(30));
        let borrower = Address::repeat_byte(3);
        cache.insert(prepared(borrower));
        cache.invalidate(&borrower);
        assert!(!cache.has_valid(&borrower));
    }

    #[test]
    fn test_v2_route_discovery() {
        let pair = |a: u8, b: u8| PoolRef {
            venue: Venue::V2,
            address: Address::repeat_byte(a ^ b),
            token0: Address::repeat_byte(a),
            token1: Address::repeat_byte(b),
            fee_micro: 3_000,
            index0: 0,
            index1: 1,
        };
        let venues = Venues {
            v2_pairs: vec![pair(0x01, 0x0E), pair(0x0E, 0x02)],
            v2_hop_tokens: vec![Address::repeat_byte(0x0E)],
            ..Default::default()
        };

        // No direct pair: routes through the hop token
        let route = venues.v2_route(Address::repeat_byte(0x01), Address::repeat_byte(0x02));
        assert_eq!(route.len(), 3);
        assert_eq!(route[1], Address::repeat_byte(0x0E));

        // Direct pair wins
        let route = venues.v2_route(Address::repeat_byte(0x01), Address::repeat_byte(0x0E));
        assert_eq!(route.len(), 2);

        // Nothing whitelisted
        let route = venues.v2_route(Address::repeat_byte(0x07), Address::repeat_byte(0x08));
        assert!(route.is_empty());
    }
}
