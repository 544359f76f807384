//! Reactive liquidation agent for Aave-v3-style money markets.
//!
//! Watches borrower health across the configured pools, prepares
//! flash-loan liquidations for positions drifting toward the threshold,
//! and races them on-chain the moment the health factor crosses one.
//!
//! Configuration comes from a TOML file (path in `LIQUIDATOR_CONFIG`,
//! default `config.toml`); the signing key only from the
//! `LIQUIDATOR_PRIVATE_KEY` environment variable.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_api::{AggregatorClient, IndexerClient, NoopNotifier, Notifier, WebhookNotifier};
use liquidator_chain::{LiquidityProbe, Multicall, RpcGateway, TransactionSender};
use liquidator_core::{
    AssetRegistry, Blacklist, BlockTrigger, Config, Coordinator, Executor, FullScanner,
    HotTracker, PrepareSettings, PreparedCache, Preparer, PriceCache, ReserveConfigCache,
    Venues, PRIVATE_KEY_ENV, WARM_HF,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,liquidator_core=debug")),
        )
        .init();

    info!("Starting liquidation agent");

    // Fatal on any config problem: exit nonzero before touching the chain.
    let config = Config::load_from_env()?;
    config.log_config();

    let private_key = std::env::var(PRIVATE_KEY_ENV)
        .with_context(|| format!("missing env var {PRIVATE_KEY_ENV}"))?;

    // Chain plumbing.
    let gateway = Arc::new(RpcGateway::new(
        &config.read_rpc_url,
        &config.tx_rpc_url,
        &config.ws_url,
        config.block_poll_interval(),
    ));
    let block = gateway.check_connectivity().await?;
    info!(block, "Connected");

    let multicall = Multicall::new(config.multicall_address, gateway.clone());
    let probe = LiquidityProbe::new(multicall.clone(), config.v2_router);

    let sender = Arc::new(
        TransactionSender::new(&private_key, &config.tx_rpc_url, config.chain_id).await?,
    );
    info!(address = %sender.address, "Signer ready");

    // Reserve metadata for every asset the venues can touch.
    let reserve_universe: Vec<_> = config
        .stable_assets
        .iter()
        .copied()
        .chain(config.v2_pairs.iter().flat_map(|p| [p.token0, p.token1]))
        .chain(config.v3_pools.iter().flat_map(|p| [p.token0, p.token1]))
        .chain(
            config
                .stable_pools
                .values()
                .flat_map(|p| [p.token0, p.token1]),
        )
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    let assets = Arc::new(
        AssetRegistry::load(
            &reserve_universe,
            &config.stable_assets,
            config.reserve_data_provider_address,
            &multicall,
        )
        .await?,
    );

    // Shared mutable state, owned here and passed down by reference.
    let prices = Arc::new(PriceCache::new(
        config.oracle_address,
        multicall.clone(),
        config.price_ttl(),
    ));
    let reserve_configs = Arc::new(ReserveConfigCache::new(
        config.reserve_data_provider_address,
        multicall.clone(),
        config.reserve_cfg_ttl(),
    ));
    let tracker = Arc::new(HotTracker::new(
        std::time::Duration::from_secs(300),
        config.min_debt_usd,
        WARM_HF,
    ));
    let prepared = Arc::new(PreparedCache::new(config.prepared_ttl()));
    let blacklist = Arc::new(Blacklist::new(config.blacklist_ttl()));

    let notifier: Arc<dyn Notifier> =
        match (&config.alert_webhook_url, &config.info_webhook_url) {
            (Some(alert), Some(info)) => {
                Arc::new(WebhookNotifier::new(alert.clone(), info.clone()))
            }
            (Some(alert), None) => Arc::new(WebhookNotifier::new(alert.clone(), alert.clone())),
            _ => {
                info!("No notification channel configured");
                Arc::new(NoopNotifier)
            }
        };

    let aggregator = match (&config.aggregator_url, &config.aggregator_api_key) {
        (Some(url), Some(key)) => {
            Some(Arc::new(AggregatorClient::new(url.clone(), key.clone())))
        }
        _ => None,
    };

    let venues = Venues {
        stable_pools: config.stable_pool_refs(),
        v2_pairs: config.v2_pair_refs(),
        v3_pools: config.v3_pool_refs(),
        v2_hop_tokens: config.v2_hop_tokens.clone(),
    };

    let preparer = Arc::new(Preparer::new(
        multicall.clone(),
        probe.clone(),
        prices.clone(),
        reserve_configs.clone(),
        assets.clone(),
        prepared.clone(),
        aggregator,
        venues.clone(),
        PrepareSettings {
            ladder_pct: config.liquidation_ladder_pct.clone(),
            close_factor_pct: config.close_factor_pct,
            interest_buffer_bps: config.interest_buffer_bps,
            conservative_factor_pct: config.conservative_factor_pct,
            gas_cost_usd: config.estimated_gas_cost_usd,
            chain_id: config.chain_id,
            v2_router: config.v2_router,
            v3_router: config.v3_router,
            profit_receiver: config.profit_receiver,
            aggregator_slippage: 0.05,
        },
    ));

    let indexer = Arc::new(IndexerClient::new(config.indexer_url.clone()));
    let scanner = Arc::new(FullScanner::new(
        indexer,
        gateway.clone(),
        multicall.clone(),
        config.pools.clone(),
        tracker.clone(),
        config.min_debt_usd,
    ));

    let executor = Arc::new(Executor::new(
        gateway.clone(),
        sender.clone(),
        preparer.clone(),
        prepared.clone(),
        tracker.clone(),
        blacklist.clone(),
        notifier.clone(),
        config.liquidation_contracts.clone(),
        config.profit_receiver,
        config.gas_tier_table(),
        config.slippage_tier_table(),
    ));

    let (candidate_tx, candidate_rx) = mpsc::channel(256);
    let (prepare_tx, prepare_rx) = mpsc::channel(256);
    let trigger = Arc::new(BlockTrigger::new(
        gateway.clone(),
        multicall.clone(),
        tracker.clone(),
        prepared.clone(),
        candidate_tx.clone(),
        prepare_tx,
    ));

    let coordinator = Coordinator::new(
        config,
        gateway,
        probe,
        scanner,
        trigger,
        executor,
        preparer,
        tracker,
        prepared,
        blacklist,
        notifier,
        sender,
        venues,
        candidate_tx,
        candidate_rx,
        prepare_rx,
    );

    // Graceful stop on SIGINT; in-flight submissions drain asynchronously.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    coordinator.run(shutdown_rx).await?;
    info!("Stopped");
    Ok(())
}
