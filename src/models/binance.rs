//! Binance REST 数据模型
//!
//! 接口返回的数值大多是字符串形式的小数，解析时统一转换为 f64

use serde::{Deserialize, Deserializer, Serialize};

fn de_str_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

/// 账户信息 GET /api/v3/account
#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub can_trade: bool,
    pub balances: Vec<Balance>,
}

/// 单个资产余额
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    #[serde(deserialize_with = "de_str_f64")]
    pub free: f64,
    #[serde(deserialize_with = "de_str_f64")]
    pub locked: f64,
}

impl Balance {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}

/// 盘口档位 [价格, 数量]
#[derive(Debug, Clone, Deserialize)]
pub struct PriceLevel(
    #[serde(deserialize_with = "de_str_f64")] pub f64,
    #[serde(deserialize_with = "de_str_f64")] pub f64,
);

/// 订单簿 GET /api/v3/depth，买单按价格从高到低
#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    pub last_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// 归集成交 GET /api/v3/aggTrades，最早的成交在前
#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct AggTrade {
    #[serde(rename = "a")]
    pub id: u64,
    #[serde(rename = "p", deserialize_with = "de_str_f64")]
    pub price: f64,
    #[serde(rename = "q", deserialize_with = "de_str_f64")]
    pub quantity: f64,
    #[serde(rename = "T")]
    pub time: i64,
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

/// 5 分钟均价 GET /api/v3/avgPrice
#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct AvgPrice {
    pub mins: u32,
    #[serde(deserialize_with = "de_str_f64")]
    pub price: f64,
}

/// 交易规则 GET /api/v3/exchangeInfo
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub filters: Vec<SymbolFilter>,
}

/// 交易对过滤器，只解析下单校验需要的几类
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price {
        #[serde(deserialize_with = "de_str_f64")]
        min_price: f64,
        #[serde(deserialize_with = "de_str_f64")]
        max_price: f64,
        #[serde(deserialize_with = "de_str_f64")]
        tick_size: f64,
    },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        #[serde(deserialize_with = "de_str_f64")]
        min_qty: f64,
        #[serde(deserialize_with = "de_str_f64")]
        max_qty: f64,
        #[serde(deserialize_with = "de_str_f64")]
        step_size: f64,
    },
    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional {
        #[serde(deserialize_with = "de_str_f64")]
        min_notional: f64,
    },
    #[serde(rename = "NOTIONAL", rename_all = "camelCase")]
    Notional {
        #[serde(deserialize_with = "de_str_f64")]
        min_notional: f64,
    },
    #[serde(other)]
    Other,
}

/// 下单校验使用的交易对规则
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct SymbolFilters {
    pub tick_size: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub step_size: f64,
    pub min_qty: f64,
    pub max_qty: f64,
    pub min_notional: f64,
}

impl Default for SymbolFilters {
    /// 缺失的过滤器不做限制
    fn default() -> Self {
        Self {
            tick_size: 0.0,
            min_price: 0.0,
            max_price: f64::INFINITY,
            step_size: 0.0,
            min_qty: 0.0,
            max_qty: f64::INFINITY,
            min_notional: 0.0,
        }
    }
}

impl From<&SymbolInfo> for SymbolFilters {
    fn from(info: &SymbolInfo) -> Self {
        let mut filters = SymbolFilters::default();
        for filter in &info.filters {
            match *filter {
                SymbolFilter::Price { min_price, max_price, tick_size } => {
                    filters.min_price = min_price;
                    // 0 表示不限制
                    if max_price > 0.0 {
                        filters.max_price = max_price;
                    }
                    filters.tick_size = tick_size;
                }
                SymbolFilter::LotSize { min_qty, max_qty, step_size } => {
                    filters.min_qty = min_qty;
                    if max_qty > 0.0 {
                        filters.max_qty = max_qty;
                    }
                    filters.step_size = step_size;
                }
                SymbolFilter::MinNotional { min_notional }
                | SymbolFilter::Notional { min_notional } => {
                    filters.min_notional = min_notional;
                }
                SymbolFilter::Other => {}
            }
        }
        filters
    }
}

/// 下单响应，测试下单接口返回空对象
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transact_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_qty: Option<String>,
}

/// 当前挂单 GET /api/v3/openOrders
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    pub symbol: String,
    pub order_id: u64,
    pub client_order_id: String,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub status: String,
    pub time_in_force: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: String,
    pub time: i64,
}

/// 接口错误响应
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account() {
        let json = r#"{
            "makerCommission": 10, "canTrade": true,
            "balances": [
                {"asset": "BTC", "free": "0.00120000", "locked": "0.00030000"},
                {"asset": "USD", "free": "250.5000", "locked": "0.0000"}
            ]
        }"#;
        let account: AccountInfo = serde_json::from_str(json).unwrap();
        assert!(account.can_trade);
        assert_eq!(account.balances.len(), 2);
        assert!((account.balances[0].total() - 0.0015).abs() < 1e-12);
    }

    #[test]
    fn test_parse_order_book_and_trades() {
        let json = r#"{"lastUpdateId": 1027024,
            "bids": [["4.00000000", "431.00000000"], ["3.90000000", "12.0"]],
            "asks": [["4.00000200", "12.00000000"]]}"#;
        let book: OrderBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.bids[1].0, 3.9);

        let trades = r#"[{"a": 26129, "p": "0.01633102", "q": "4.70443515",
            "f": 27781, "l": 27781, "T": 1498793709153, "m": true, "M": true}]"#;
        let trades: Vec<AggTrade> = serde_json::from_str(trades).unwrap();
        assert_eq!(trades[0].price, 0.01633102);
        assert!(trades[0].is_buyer_maker);
    }

    #[test]
    fn test_symbol_filters_from_exchange_info() {
        let json = r#"{"symbols": [{
            "symbol": "BTCUSD", "status": "TRADING",
            "baseAsset": "BTC", "quoteAsset": "USD",
            "filters": [
                {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "100000.00", "tickSize": "0.01"},
                {"filterType": "LOT_SIZE", "minQty": "0.00000100", "maxQty": "9000.0", "stepSize": "0.00000100"},
                {"filterType": "PERCENT_PRICE", "multiplierUp": "5", "multiplierDown": "0.2", "avgPriceMins": 5},
                {"filterType": "NOTIONAL", "minNotional": "1.00", "applyMinToMarket": true,
                 "maxNotional": "9000000.00", "applyMaxToMarket": false, "avgPriceMins": 5}
            ]
        }]}"#;
        let info: ExchangeInfo = serde_json::from_str(json).unwrap();
        let filters = SymbolFilters::from(&info.symbols[0]);
        assert_eq!(filters.tick_size, 0.01);
        assert_eq!(filters.step_size, 0.000001);
        assert_eq!(filters.max_qty, 9000.0);
        assert_eq!(filters.min_notional, 1.0);
    }

    #[test]
    fn test_missing_filters_are_permissive() {
        let json = r#"{"symbol": "XUSD", "status": "TRADING", "baseAsset": "X",
            "quoteAsset": "USD", "filters": [
                {"filterType": "PRICE_FILTER", "minPrice": "0", "maxPrice": "0", "tickSize": "0.1"}
            ]}"#;
        let info: SymbolInfo = serde_json::from_str(json).unwrap();
        let filters = SymbolFilters::from(&info);
        assert_eq!(filters.max_price, f64::INFINITY);
        assert_eq!(filters.step_size, 0.0);
        assert_eq!(filters.min_notional, 0.0);
    }

    #[test]
    fn test_empty_test_order_response() {
        let response: OrderResponse = serde_json::from_str("{}").unwrap();
        assert!(response.order_id.is_none());
        assert_eq!(serde_json::to_string(&response).unwrap(), "{}");
    }
}
