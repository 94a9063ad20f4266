//! 资产定价
//!
//! 计价资产本身按 1.0 计价，其它资产按 `{资产}{计价资产}` 交易对取价

use anyhow::{anyhow, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::binance::{market_symbol, BinanceClient};
use super::predictor::PricePredictor;
use crate::config::TradingConfig;

/// 价格来源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum PriceSource {
    /// 最近成交价的多项式外推
    #[default]
    Predicted,
    /// 订单簿前 N 档买价均值
    OrderBook,
    /// 交易所 5 分钟均价
    Average,
}

/// 定价器
#[derive(Debug, Clone)]
pub struct Pricer {
    pub source: PriceSource,
    pub quote_asset: String,
    pub order_book_depth: u32,
    pub predictor: PricePredictor,
}

impl Pricer {
    pub fn new(trading: &TradingConfig, source: PriceSource) -> Self {
        Self {
            source,
            quote_asset: trading.quote_asset.clone(),
            order_book_depth: trading.order_book_depth,
            predictor: PricePredictor::new(trading.predictor.trade_limit, trading.predictor.degree),
        }
    }

    /// 单个资产价格
    pub async fn price(&self, client: &BinanceClient, asset: &str) -> Result<f64> {
        if asset == self.quote_asset {
            return Ok(1.0);
        }
        let market = market_symbol(asset, &self.quote_asset);

        match self.source {
            PriceSource::Predicted => self.predictor.predict(client, &market).await,
            PriceSource::OrderBook => {
                let book = client.get_order_book(&market, self.order_book_depth).await?;
                let bids: Vec<f64> = book
                    .bids
                    .iter()
                    .take(self.order_book_depth as usize)
                    .map(|level| level.0)
                    .collect();
                mean(&bids).ok_or_else(|| anyhow!("{} 订单簿没有买单", market))
            }
            PriceSource::Average => Ok(client.get_avg_price(&market).await?.price),
        }
    }

    /// 并发获取多个资产价格，失败的资产记录警告后跳过
    pub async fn prices(&self, client: &BinanceClient, assets: &[String]) -> BTreeMap<String, f64> {
        let mut symbols: Vec<&str> = assets.iter().map(|s| s.as_str()).collect();
        if !symbols.contains(&self.quote_asset.as_str()) {
            symbols.push(&self.quote_asset);
        }

        let results = join_all(symbols.iter().map(|s| self.price(client, s))).await;

        symbols
            .into_iter()
            .zip(results)
            .filter_map(|(symbol, result)| match result {
                Ok(price) => Some((symbol.to_string(), price)),
                Err(e) => {
                    log::warn!("获取 {} 价格失败: {}", symbol, e);
                    None
                }
            })
            .collect()
    }
}

/// 算术平均
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
