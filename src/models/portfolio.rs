//! 投资组合模型
//!
//! 持仓资产、账户信息，以及按目标配置分配现金的逻辑

use serde::Serialize;
use std::fmt::Write;

use super::allocation::Allocation;

/// 持仓资产（金额单位均为美元）
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Asset {
    pub account_id: String,
    pub symbol: String,
    /// 持有数量（free + locked）
    pub quantity: f64,
    /// 估值价格
    pub price: f64,
    /// 投资前市值
    pub initial_balance: f64,
    /// 本次计划投入金额，现金资产为负
    pub amount_invested: f64,
}

impl Asset {
    pub fn new(account_id: &str, symbol: &str, quantity: f64, price: f64) -> Self {
        Self {
            account_id: account_id.to_string(),
            symbol: symbol.to_string(),
            quantity,
            price,
            initial_balance: quantity * price,
            amount_invested: 0.0,
        }
    }

    /// 投资后市值
    pub fn final_balance(&self) -> f64 {
        self.initial_balance + self.amount_invested
    }
}

/// 账户信息
#[derive(Debug, Clone, Serialize)]
pub struct AccountDetails {
    pub account_id: String,
    pub account_name: String,
    /// 计价资产（现金）
    pub quote_asset: String,
    pub allocation: Allocation,
}

impl AccountDetails {
    pub fn new(account_id: &str, account_name: &str, quote_asset: &str, allocation: Allocation) -> Self {
        Self {
            account_id: account_id.to_string(),
            account_name: account_name.to_string(),
            quote_asset: quote_asset.to_string(),
            allocation,
        }
    }
}

/// 分类汇总
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub target_weight: f64,
    pub initial_value: f64,
    pub final_value: f64,
    pub initial_weight: f64,
    pub final_weight: f64,
}

/// 资产汇总
#[derive(Debug, Clone, Serialize)]
pub struct AssetSummary {
    pub symbol: String,
    pub category: String,
    pub quantity: f64,
    pub price: f64,
    pub initial_value: f64,
    pub invested: f64,
    pub final_value: f64,
    pub target_weight: f64,
    pub initial_weight: f64,
    pub final_weight: f64,
}

/// 投资组合
#[derive(Debug, Clone)]
pub struct Portfolio {
    assets: Vec<Asset>,
}

impl Portfolio {
    /// 创建投资组合，配置中未持有的资产以数量 0 补齐
    pub fn new(mut assets: Vec<Asset>, accounts: &[AccountDetails]) -> Self {
        for account in accounts {
            for symbol in account.allocation.symbols() {
                let held = assets
                    .iter()
                    .any(|a| a.account_id == account.account_id && a.symbol == symbol);
                if !held {
                    assets.push(Asset::new(&account.account_id, &symbol, 0.0, 0.0));
                }
            }
        }
        Self { assets }
    }

    /// 将账户现金按目标配置投入各资产
    ///
    /// 先补足低于目标市值的缺口；现金不足时按缺口比例分配，
    /// 补足后剩余的现金按目标权重分配。
    pub fn invest_balanced(&mut self, account: &AccountDetails) {
        let allocation = &account.allocation;
        let cash = self
            .assets
            .iter()
            .filter(|a| a.account_id == account.account_id && a.symbol == account.quote_asset)
            .map(|a| a.initial_balance)
            .sum::<f64>();

        for asset in self.assets.iter_mut().filter(|a| a.account_id == account.account_id) {
            asset.amount_invested = 0.0;
        }

        if cash <= 0.0 {
            log::warn!("账户 {} 没有可投资现金", account.account_name);
            return;
        }

        let holdings: f64 = self
            .assets
            .iter()
            .filter(|a| a.account_id == account.account_id && allocation.contains(&a.symbol))
            .map(|a| a.initial_balance)
            .sum();
        let total = holdings + cash;

        let deficits: Vec<(usize, f64, f64)> = self
            .assets
            .iter()
            .enumerate()
            .filter(|(_, a)| a.account_id == account.account_id)
            .filter_map(|(i, a)| {
                let weight = allocation.weight_of(&a.symbol)?;
                let deficit = (total * weight - a.initial_balance).max(0.0);
                Some((i, weight, deficit))
            })
            .collect();
        let deficit_sum: f64 = deficits.iter().map(|(_, _, d)| d).sum();

        let mut invested_total = 0.0;
        for (i, weight, deficit) in deficits {
            if weight <= 0.0 {
                continue;
            }
            let amount = if deficit_sum >= cash {
                cash * deficit / deficit_sum
            } else {
                deficit + (cash - deficit_sum) * weight
            };
            self.assets[i].amount_invested = amount;
            invested_total += amount;
        }

        if let Some(cash_asset) = self
            .assets
            .iter_mut()
            .find(|a| a.account_id == account.account_id && a.symbol == account.quote_asset)
        {
            cash_asset.amount_invested = -invested_total;
        }

        log::info!(
            "账户 {} 计划投入 ${:.2}（持仓市值 ${:.2}）",
            account.account_name,
            invested_total,
            holdings
        );
    }

    /// 账户的非现金资产
    pub fn get_assets(&self, account: &AccountDetails) -> Vec<&Asset> {
        self.assets
            .iter()
            .filter(|a| a.account_id == account.account_id && a.symbol != account.quote_asset)
            .collect()
    }

    pub fn cash(&self, account: &AccountDetails) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|a| a.account_id == account.account_id && a.symbol == account.quote_asset)
    }

    fn totals(&self, account: &AccountDetails) -> (f64, f64) {
        self.get_assets(account)
            .iter()
            .filter(|a| account.allocation.contains(&a.symbol))
            .fold((0.0, 0.0), |(initial, fin), a| {
                (initial + a.initial_balance, fin + a.final_balance())
            })
    }

    pub fn category_summaries(&self, account: &AccountDetails) -> Vec<CategorySummary> {
        let (initial_total, final_total) = self.totals(account);
        let assets = self.get_assets(account);

        account
            .allocation
            .categories
            .iter()
            .map(|category| {
                let members = assets
                    .iter()
                    .filter(|a| category.assets.iter().any(|(s, _)| *s == a.symbol));
                let (initial_value, final_value) = members
                    .fold((0.0, 0.0), |(i, f), a| (i + a.initial_balance, f + a.final_balance()));
                CategorySummary {
                    name: category.name.clone(),
                    target_weight: category.weight(),
                    initial_value,
                    final_value,
                    initial_weight: share(initial_value, initial_total),
                    final_weight: share(final_value, final_total),
                }
            })
            .collect()
    }

    pub fn asset_summaries(&self, account: &AccountDetails) -> Vec<AssetSummary> {
        let (initial_total, final_total) = self.totals(account);

        self.get_assets(account)
            .into_iter()
            .filter_map(|a| {
                let target_weight = account.allocation.weight_of(&a.symbol)?;
                Some(AssetSummary {
                    symbol: a.symbol.clone(),
                    category: account
                        .allocation
                        .category_of(&a.symbol)
                        .unwrap_or_default()
                        .to_string(),
                    quantity: a.quantity,
                    price: a.price,
                    initial_value: a.initial_balance,
                    invested: a.amount_invested,
                    final_value: a.final_balance(),
                    target_weight,
                    initial_weight: share(a.initial_balance, initial_total),
                    final_weight: share(a.final_balance(), final_total),
                })
            })
            .collect()
    }

    /// 分类汇总表
    pub fn render_categories(&self, account: &AccountDetails) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n{} - 分类", account.account_name);
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>12} {:>8} {:>12} {:>8}",
            "分类", "目标", "投资前", "占比", "投资后", "占比"
        );
        for c in self.category_summaries(account) {
            let _ = writeln!(
                out,
                "{:<12} {:>7.2}% {:>12.2} {:>7.2}% {:>12.2} {:>7.2}%",
                c.name,
                c.target_weight * 100.0,
                c.initial_value,
                c.initial_weight * 100.0,
                c.final_value,
                c.final_weight * 100.0
            );
        }
        out
    }

    /// 资产明细表
    pub fn render_assets(&self, account: &AccountDetails) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n{} - 资产", account.account_name);
        let _ = writeln!(
            out,
            "{:<8} {:>14} {:>12} {:>12} {:>10} {:>12} {:>8} {:>8}",
            "资产", "数量", "价格", "投资前", "投入", "投资后", "目标", "投资后占比"
        );
        for a in self.asset_summaries(account) {
            let _ = writeln!(
                out,
                "{:<8} {:>14.6} {:>12.4} {:>12.2} {:>10.2} {:>12.2} {:>7.2}% {:>7.2}%",
                a.symbol,
                a.quantity,
                a.price,
                a.initial_value,
                a.invested,
                a.final_value,
                a.target_weight * 100.0,
                a.final_weight * 100.0
            );
        }
        if let Some(cash) = self.cash(account) {
            let _ = writeln!(
                out,
                "{:<8} {:>14.2} {:>12} {:>12.2} {:>10.2} {:>12.2}",
                cash.symbol,
                cash.quantity,
                "",
                cash.initial_balance,
                cash.amount_invested,
                cash.final_balance()
            );
        }
        out
    }
}

fn share(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AllocationCategory;

    fn account() -> AccountDetails {
        let allocation = Allocation::new()
            .with_category(
                AllocationCategory::new("Large Cap")
                    .with_asset("BTC", 0.5)
                    .with_asset("ETH", 0.3),
            )
            .with_category(
                AllocationCategory::new("Other")
                    .with_asset("ADA", 0.2)
                    .with_asset("BNB", 0.0),
            )
            .verify()
            .unwrap();
        AccountDetails::new("binance", "Binance.US", "USD", allocation)
    }

    fn invested(portfolio: &Portfolio, account: &AccountDetails, symbol: &str) -> f64 {
        portfolio
            .get_assets(account)
            .into_iter()
            .find(|a| a.symbol == symbol)
            .map(|a| a.amount_invested)
            .unwrap()
    }

    #[test]
    fn test_missing_allocated_assets_are_added() {
        let account = account();
        let portfolio = Portfolio::new(
            vec![Asset::new("binance", "USD", 100.0, 1.0)],
            &[account.clone()],
        );
        let symbols: Vec<&str> = portfolio
            .get_assets(&account)
            .iter()
            .map(|a| a.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "ADA", "BNB"]);
    }

    #[test]
    fn test_empty_portfolio_invests_by_weight() {
        let account = account();
        let mut portfolio = Portfolio::new(
            vec![Asset::new("binance", "USD", 100.0, 1.0)],
            &[account.clone()],
        );
        portfolio.invest_balanced(&account);

        assert!((invested(&portfolio, &account, "BTC") - 50.0).abs() < 1e-9);
        assert!((invested(&portfolio, &account, "ETH") - 30.0).abs() < 1e-9);
        assert!((invested(&portfolio, &account, "ADA") - 20.0).abs() < 1e-9);
        assert_eq!(invested(&portfolio, &account, "BNB"), 0.0);
        assert!((portfolio.cash(&account).unwrap().amount_invested + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cash_below_deficits_is_split_by_deficit() {
        let account = account();
        // total = 1000 + 100; BTC 已超配，ETH 缺口 330，ADA 缺口 220
        let mut portfolio = Portfolio::new(
            vec![
                Asset::new("binance", "BTC", 0.02, 50_000.0),
                Asset::new("binance", "USD", 100.0, 1.0),
            ],
            &[account.clone()],
        );
        portfolio.invest_balanced(&account);

        assert_eq!(invested(&portfolio, &account, "BTC"), 0.0);
        assert!((invested(&portfolio, &account, "ETH") - 60.0).abs() < 1e-9);
        assert!((invested(&portfolio, &account, "ADA") - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_cash_above_deficits_fills_then_spreads() {
        let account = account();
        // total = 200 + 300 = 500；BTC 缺口 50，ETH 缺口 150，ADA 缺口 100
        let mut portfolio = Portfolio::new(
            vec![
                Asset::new("binance", "BTC", 1.0, 200.0),
                Asset::new("binance", "USD", 300.0, 1.0),
            ],
            &[account.clone()],
        );
        portfolio.invest_balanced(&account);

        assert!((invested(&portfolio, &account, "BTC") - 50.0).abs() < 1e-9);
        assert!((invested(&portfolio, &account, "ETH") - 150.0).abs() < 1e-9);
        assert!((invested(&portfolio, &account, "ADA") - 100.0).abs() < 1e-9);

        let total: f64 = portfolio
            .get_assets(&account)
            .iter()
            .map(|a| a.amount_invested)
            .sum();
        assert!((total - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_cash_invests_nothing() {
        let account = account();
        let mut portfolio = Portfolio::new(
            vec![Asset::new("binance", "BTC", 1.0, 100.0)],
            &[account.clone()],
        );
        portfolio.invest_balanced(&account);
        assert!(portfolio
            .get_assets(&account)
            .iter()
            .all(|a| a.amount_invested == 0.0));
    }

    #[test]
    fn test_summaries_after_investment() {
        let account = account();
        let mut portfolio = Portfolio::new(
            vec![Asset::new("binance", "USD", 100.0, 1.0)],
            &[account.clone()],
        );
        portfolio.invest_balanced(&account);

        let categories = portfolio.category_summaries(&account);
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Large Cap");
        assert!((categories[0].final_value - 80.0).abs() < 1e-9);
        assert!((categories[0].final_weight - 0.8).abs() < 1e-9);
        assert_eq!(categories[0].initial_weight, 0.0);

        let assets = portfolio.asset_summaries(&account);
        let ada = assets.iter().find(|a| a.symbol == "ADA").unwrap();
        assert_eq!(ada.category, "Other");
        assert!((ada.final_weight - 0.2).abs() < 1e-9);

        let table = portfolio.render_assets(&account);
        println!("{}", table);
        assert!(table.contains("BTC"));
        assert!(table.contains("USD"));
        assert!(portfolio.render_categories(&account).contains("Large Cap"));
    }
}
