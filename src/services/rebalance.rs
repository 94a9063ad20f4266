//! 组合再平衡流程
//!
//! 拉取余额、价格和交易规则，按目标配置分配现金，生成并提交限价买单

use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

use super::binance::{market_symbol, BinanceClient};
use super::orders::{cash_spent, plan_order, submit_orders, OrderMode};
use super::pricing::{PriceSource, Pricer};
use crate::config::{AppConfig, TradingConfig};
use crate::models::{
    AccountDetails, AccountInfo, Allocation, Asset, AssetSummary, CategorySummary, OrderOutcome,
    OrderRequest, Portfolio, SkippedOrder, SymbolFilters,
};

pub const ACCOUNT_ID: &str = "binance";
pub const ACCOUNT_NAME: &str = "Binance.US";

/// 预览默认使用交易所 5 分钟均价
pub const PREVIEW_PRICE_SOURCE: PriceSource = PriceSource::Average;

/// 预览的价格来源，未指定时使用均价
pub fn preview_source(requested: Option<PriceSource>) -> PriceSource {
    requested.unwrap_or(PREVIEW_PRICE_SOURCE)
}

/// 单次再平衡参数
#[derive(Debug, Clone)]
pub struct RebalanceOptions {
    pub mode: OrderMode,
    /// 本次投资金额上限（美元）
    pub investment_amount: f64,
    pub price_source: PriceSource,
}

/// 组合快照：分配现金后的汇总
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshot {
    pub account_name: String,
    pub price_source: PriceSource,
    /// 可投资现金
    pub cash: f64,
    pub prices: BTreeMap<String, f64>,
    /// 没有价格、不参与本次分配的配置资产
    pub unpriced: Vec<String>,
    pub categories: Vec<CategorySummary>,
    pub assets: Vec<AssetSummary>,
    #[serde(skip)]
    pub category_table: String,
    #[serde(skip)]
    pub asset_table: String,
}

/// 再平衡结果
#[derive(Debug, Clone, Serialize)]
pub struct RebalanceReport {
    pub live: bool,
    pub outcomes: Vec<OrderOutcome>,
    pub skipped: Vec<SkippedOrder>,
    pub cash_spent: f64,
    pub snapshot: PortfolioSnapshot,
    pub runtime_secs: f64,
}

/// 账户余额（free + locked），计价资产按投资上限和保留现金截断，只保留正数
pub fn collect_balances(
    account: &AccountInfo,
    quote_asset: &str,
    investment_amount: f64,
    cash_reserve: f64,
) -> Vec<(String, f64)> {
    account
        .balances
        .iter()
        .filter_map(|b| {
            let mut total = b.total();
            if b.asset == quote_asset {
                total = investment_amount.min(total - cash_reserve);
            }
            (total > 0.0).then(|| (b.asset.clone(), total))
        })
        .collect()
}

/// 生成组合资产，只保留计价资产和配置内的资产
pub fn build_assets(
    balances: &[(String, f64)],
    prices: &BTreeMap<String, f64>,
    allocation: &Allocation,
    quote_asset: &str,
    account_id: &str,
) -> Vec<Asset> {
    let mut assets = Vec::new();

    for (symbol, quantity) in balances {
        if symbol != quote_asset && !allocation.contains(symbol) {
            log::debug!("跳过配置外的持仓 {} ({})", symbol, quantity);
            continue;
        }
        let price = match prices.get(symbol) {
            Some(price) => *price,
            None => {
                log::warn!("{} 没有价格，按 0 估值", symbol);
                0.0
            }
        };
        assets.push(Asset::new(account_id, symbol, *quantity, price));
    }

    // 未持有的配置资产也带上价格，便于生成订单
    for symbol in allocation.symbols() {
        if !assets.iter().any(|a| a.symbol == symbol) {
            let price = prices.get(&symbol).copied().unwrap_or(0.0);
            assets.push(Asset::new(account_id, &symbol, 0.0, price));
        }
    }

    assets
}

/// 为计划投入的资产生成订单，不满足条件的记录原因
pub fn plan_orders(
    assets: &[&Asset],
    quote_asset: &str,
    prices: &BTreeMap<String, f64>,
    filters: &BTreeMap<String, SymbolFilters>,
) -> (Vec<OrderRequest>, Vec<SkippedOrder>) {
    let mut requests = Vec::new();
    let mut skipped = Vec::new();

    for asset in assets.iter().filter(|a| a.amount_invested > 0.0) {
        let reason = match (prices.get(&asset.symbol), filters.get(&asset.symbol)) {
            (None, _) => "missing price".to_string(),
            (_, None) => "missing symbol info".to_string(),
            (Some(price), Some(filters)) => match plan_order(asset, quote_asset, *price, filters) {
                Ok(request) => {
                    requests.push(request);
                    continue;
                }
                Err(violation) => violation.to_string(),
            },
        };
        log::warn!("*!* Could not submit {} order: {} *!*", asset.symbol, reason);
        skipped.push(SkippedOrder {
            symbol: asset.symbol.clone(),
            reason,
        });
    }

    (requests, skipped)
}

/// 再平衡服务
#[derive(Clone)]
pub struct Rebalancer {
    client: BinanceClient,
    config: AppConfig,
    allocation: Allocation,
}

impl Rebalancer {
    pub fn new(client: BinanceClient, config: AppConfig, allocation: Allocation) -> Self {
        Self {
            client,
            config,
            allocation,
        }
    }

    pub fn client(&self) -> &BinanceClient {
        &self.client
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    pub fn trading(&self) -> &TradingConfig {
        &self.config.trading
    }

    fn account_details(&self) -> AccountDetails {
        AccountDetails::new(
            ACCOUNT_ID,
            ACCOUNT_NAME,
            &self.config.trading.quote_asset,
            self.allocation.clone(),
        )
    }

    /// 账户中计价资产的余额（free + locked）
    pub async fn available_cash(&self) -> Result<f64> {
        let balance = self
            .client
            .get_asset_balance(&self.config.trading.quote_asset)
            .await?;
        Ok(balance.total())
    }

    /// 并发获取配置内资产的交易规则
    pub async fn symbol_filters(&self) -> BTreeMap<String, SymbolFilters> {
        let quote = &self.config.trading.quote_asset;
        let symbols = self.allocation.symbols();
        let markets: Vec<String> = symbols.iter().map(|s| market_symbol(s, quote)).collect();
        let results = join_all(markets.iter().map(|m| self.client.get_symbol_info(m))).await;

        symbols
            .into_iter()
            .zip(results)
            .filter_map(|(symbol, result)| match result {
                Ok(info) => Some((info.base_asset.clone(), SymbolFilters::from(&info))),
                Err(e) => {
                    log::warn!("获取 {} 交易规则失败: {}", symbol, e);
                    None
                }
            })
            .collect()
    }

    fn snapshot(
        &self,
        balances: &[(String, f64)],
        prices: BTreeMap<String, f64>,
        source: PriceSource,
    ) -> (Portfolio, AccountDetails, PortfolioSnapshot) {
        let quote = &self.config.trading.quote_asset;

        // 没有价格的资产无法估值和下单，从配置中移除，其余权重按比例放大
        let unpriced: Vec<String> = self
            .allocation
            .symbols()
            .into_iter()
            .filter(|s| !prices.contains_key(s))
            .collect();
        let mut details = self.account_details();
        if !unpriced.is_empty() {
            log::warn!("以下资产没有价格，不参与本次分配: {}", unpriced.join(", "));
            details.allocation = self.allocation.without(&unpriced);
        }

        let assets = build_assets(balances, &prices, &details.allocation, quote, ACCOUNT_ID);
        let mut portfolio = Portfolio::new(assets, std::slice::from_ref(&details));
        portfolio.invest_balanced(&details);

        let snapshot = PortfolioSnapshot {
            account_name: details.account_name.clone(),
            price_source: source,
            cash: portfolio.cash(&details).map(|c| c.initial_balance).unwrap_or(0.0),
            prices,
            unpriced,
            categories: portfolio.category_summaries(&details),
            assets: portfolio.asset_summaries(&details),
            category_table: portfolio.render_categories(&details),
            asset_table: portfolio.render_assets(&details),
        };
        (portfolio, details, snapshot)
    }

    /// 只计算分配结果，不下单
    ///
    /// 投入账户全部计价资产余额，不受投资上限和保留现金限制
    pub async fn preview(&self, source: PriceSource) -> Result<PortfolioSnapshot> {
        let pricer = Pricer::new(&self.config.trading, source);
        let symbols = self.allocation.symbols();
        let (account, prices) =
            tokio::join!(self.client.get_account(), pricer.prices(&self.client, &symbols));
        let account = account?;

        let balances =
            collect_balances(&account, &self.config.trading.quote_asset, f64::INFINITY, 0.0);
        let (_, _, snapshot) = self.snapshot(&balances, prices, source);
        Ok(snapshot)
    }

    /// 执行一次再平衡
    pub async fn run(&self, options: &RebalanceOptions) -> Result<RebalanceReport> {
        let start = Instant::now();
        let pricer = Pricer::new(&self.config.trading, options.price_source);
        let symbols = self.allocation.symbols();

        let (account, prices, filters) = tokio::join!(
            self.client.get_account(),
            pricer.prices(&self.client, &symbols),
            self.symbol_filters()
        );
        let account = account?;

        let balances = collect_balances(
            &account,
            &self.config.trading.quote_asset,
            options.investment_amount,
            self.config.trading.cash_reserve,
        );
        let (portfolio, details, snapshot) =
            self.snapshot(&balances, prices, options.price_source);

        let (requests, planned_skips) = plan_orders(
            &portfolio.get_assets(&details),
            &details.quote_asset,
            &snapshot.prices,
            &filters,
        );
        let skipped: Vec<SkippedOrder> = snapshot
            .unpriced
            .iter()
            .filter(|s| self.allocation.weight_of(s).unwrap_or(0.0) > 0.0)
            .map(|s| SkippedOrder {
                symbol: s.clone(),
                reason: "missing price".to_string(),
            })
            .chain(planned_skips)
            .collect();

        log::info!(
            "提交 {} 笔订单（{}），跳过 {} 笔",
            requests.len(),
            if options.mode == OrderMode::Live { "实盘" } else { "测试" },
            skipped.len()
        );
        let outcomes = submit_orders(&self.client, &requests, options.mode).await;
        let spent = cash_spent(&outcomes);

        Ok(RebalanceReport {
            live: options.mode == OrderMode::Live,
            outcomes,
            skipped,
            cash_spent: spent,
            snapshot,
            runtime_secs: start.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AllocationCategory, Balance};

    fn rebalancer() -> Rebalancer {
        let config = AppConfig::default();
        let client = BinanceClient::new(&config.binance, None).unwrap();
        Rebalancer::new(client, config, allocation())
    }

    fn prices(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    fn account(balances: &[(&str, f64, f64)]) -> AccountInfo {
        AccountInfo {
            can_trade: true,
            balances: balances
                .iter()
                .map(|(asset, free, locked)| Balance {
                    asset: asset.to_string(),
                    free: *free,
                    locked: *locked,
                })
                .collect(),
        }
    }

    fn allocation() -> Allocation {
        Allocation::new()
            .with_category(
                AllocationCategory::new("Core")
                    .with_asset("BTC", 0.5)
                    .with_asset("ETH", 0.5),
            )
            .verify()
            .unwrap()
    }

    #[test]
    fn test_collect_balances_caps_cash() {
        let info = account(&[("BTC", 0.1, 0.05), ("USD", 500.0, 20.0), ("DOGE", 0.0, 0.0)]);
        let balances = collect_balances(&info, "USD", 200.0, 10.0);
        assert_eq!(balances.len(), 2);
        assert!((balances[0].1 - 0.15).abs() < 1e-12);
        assert_eq!(balances[1], ("USD".to_string(), 200.0));

        // 余额不足时扣除保留现金
        let info = account(&[("USD", 50.0, 0.0)]);
        assert_eq!(collect_balances(&info, "USD", 200.0, 10.0), vec![("USD".to_string(), 40.0)]);

        // 低于保留现金时不投资
        let info = account(&[("USD", 8.0, 0.0)]);
        assert!(collect_balances(&info, "USD", 200.0, 10.0).is_empty());

        // 预览不设上限
        let info = account(&[("USD", 500.0, 20.0)]);
        assert_eq!(
            collect_balances(&info, "USD", f64::INFINITY, 0.0),
            vec![("USD".to_string(), 520.0)]
        );
    }

    #[test]
    fn test_preview_defaults_to_average_price() {
        assert_eq!(preview_source(None), PriceSource::Average);
        assert_eq!(preview_source(Some(PriceSource::OrderBook)), PriceSource::OrderBook);
    }

    #[test]
    fn test_unpriced_asset_is_left_out_of_allocation() {
        let rebalancer = rebalancer();
        let balances = vec![("ETH".to_string(), 0.4), ("USD".to_string(), 200.0)];

        let (portfolio, details, snapshot) = rebalancer.snapshot(
            &balances,
            prices(&[("BTC", 50_000.0), ("USD", 1.0)]),
            PriceSource::Average,
        );

        assert_eq!(snapshot.unpriced, vec!["ETH"]);
        assert!(!details.allocation.contains("ETH"));

        // 全部现金投入有价格的 BTC
        let assets = portfolio.get_assets(&details);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].symbol, "BTC");
        assert!((assets[0].amount_invested - 200.0).abs() < 1e-9);
        assert!((snapshot.cash - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_fully_priced_snapshot_keeps_allocation() {
        let rebalancer = rebalancer();
        let balances = vec![("USD".to_string(), 100.0)];

        let (portfolio, details, snapshot) = rebalancer.snapshot(
            &balances,
            prices(&[("BTC", 50_000.0), ("ETH", 2_500.0), ("USD", 1.0)]),
            PriceSource::Predicted,
        );

        assert!(snapshot.unpriced.is_empty());
        assert_eq!(details.allocation, *rebalancer.allocation());
        for asset in portfolio.get_assets(&details) {
            assert!((asset.amount_invested - 50.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_build_assets_filters_and_fills() {
        let balances = vec![
            ("BTC".to_string(), 0.01),
            ("DOGE".to_string(), 1000.0),
            ("USD".to_string(), 100.0),
        ];
        let prices: BTreeMap<String, f64> = [("BTC", 50_000.0), ("ETH", 2_500.0), ("USD", 1.0)]
            .iter()
            .map(|(s, p)| (s.to_string(), *p))
            .collect();

        let assets = build_assets(&balances, &prices, &allocation(), "USD", ACCOUNT_ID);
        let symbols: Vec<&str> = assets.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "USD", "ETH"]);
        assert_eq!(assets[0].initial_balance, 500.0);
        assert_eq!(assets[2].quantity, 0.0);
        assert_eq!(assets[2].price, 2_500.0);
    }

    #[test]
    fn test_plan_orders_reports_skips() {
        let mut btc = Asset::new(ACCOUNT_ID, "BTC", 0.0, 50_000.0);
        btc.amount_invested = 60.0;
        let mut eth = Asset::new(ACCOUNT_ID, "ETH", 0.0, 2_500.0);
        eth.amount_invested = 40.0;
        let mut ada = Asset::new(ACCOUNT_ID, "ADA", 0.0, 0.5);
        ada.amount_invested = 5.0;
        let idle = Asset::new(ACCOUNT_ID, "BNB", 0.0, 300.0);

        let prices: BTreeMap<String, f64> = [("BTC", 50_000.0), ("ADA", 0.5)]
            .iter()
            .map(|(s, p)| (s.to_string(), *p))
            .collect();
        let filters = SymbolFilters {
            tick_size: 0.01,
            min_price: 0.0,
            max_price: f64::INFINITY,
            step_size: 0.00001,
            min_qty: 0.00001,
            max_qty: f64::INFINITY,
            min_notional: 10.0,
        };
        let filter_map: BTreeMap<String, SymbolFilters> = ["BTC", "ETH", "ADA"]
            .iter()
            .map(|s| (s.to_string(), filters))
            .collect();

        let (requests, skipped) =
            plan_orders(&[&btc, &eth, &ada, &idle], "USD", &prices, &filter_map);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].market_symbol, "BTCUSD");
        assert_eq!(requests[0].quantity, 0.0012);

        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].symbol, "ETH");
        assert_eq!(skipped[0].reason, "missing price");
        assert_eq!(skipped[1].symbol, "ADA");
        assert!(skipped[1].reason.starts_with("notional"));
    }
}
