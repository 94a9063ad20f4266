//! Binance.US REST 客户端
//!
//! 公共行情接口直接请求，账户和下单接口需要 API Key 与 HMAC 签名

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::common::{
    sign, ACCOUNT_PATH, AGG_TRADES_PATH, API_KEY_HEADER, AVG_PRICE_PATH, DEPTH_PATH,
    EXCHANGE_INFO_PATH, OPEN_ORDERS_PATH, ORDER_PATH, TEST_ORDER_PATH,
};
use super::error::ExchangeError;
use crate::config::{BinanceConfig, Credentials};
use crate::models::{
    AccountInfo, AggTrade, ApiErrorBody, AvgPrice, Balance, ExchangeInfo, OpenOrder, OrderBook,
    OrderRequest, OrderResponse, SymbolInfo,
};

pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Binance.US 客户端
///
/// 内部的 reqwest::Client 带连接池，克隆开销很小
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_secret: Option<String>,
    recv_window_ms: u64,
}

impl BinanceClient {
    /// 创建客户端，凭证为空时只能访问公共接口
    pub fn new(config: &BinanceConfig, credentials: Option<Credentials>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(creds) = &credentials {
            headers.insert(API_KEY_HEADER, HeaderValue::from_str(&creds.api_key)?);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_secret: credentials.map(|c| c.api_secret),
            recv_window_ms: config.recv_window_ms,
        })
    }

    // ==================== 账户 ====================

    /// 获取账户信息和全部余额
    pub async fn get_account(&self) -> Result<AccountInfo> {
        self.send_signed(Method::GET, ACCOUNT_PATH, &[]).await
    }

    /// 获取单个资产余额，账户中没有该资产时返回 0 余额
    pub async fn get_asset_balance(&self, asset: &str) -> Result<Balance> {
        let account = self.get_account().await?;
        Ok(account
            .balances
            .into_iter()
            .find(|b| b.asset == asset)
            .unwrap_or(Balance {
                asset: asset.to_string(),
                free: 0.0,
                locked: 0.0,
            }))
    }

    /// 当前挂单
    pub async fn get_open_orders(&self) -> Result<Vec<OpenOrder>> {
        self.send_signed(Method::GET, OPEN_ORDERS_PATH, &[]).await
    }

    // ==================== 行情 ====================

    /// 订单簿
    pub async fn get_order_book(&self, symbol: &str, limit: u32) -> Result<OrderBook> {
        self.get_public(DEPTH_PATH, &[("symbol", symbol.to_string()), ("limit", limit.to_string())])
            .await
    }

    /// 最近的归集成交，最早的在前
    pub async fn get_aggregate_trades(&self, symbol: &str, limit: usize) -> Result<Vec<AggTrade>> {
        self.get_public(
            AGG_TRADES_PATH,
            &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// 5 分钟均价
    pub async fn get_avg_price(&self, symbol: &str) -> Result<AvgPrice> {
        self.get_public(AVG_PRICE_PATH, &[("symbol", symbol.to_string())])
            .await
    }

    /// 交易对规则
    pub async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let info: ExchangeInfo = self
            .get_public(EXCHANGE_INFO_PATH, &[("symbol", symbol.to_string())])
            .await?;
        info.symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| ExchangeError::Decode(format!("交易规则中没有 {}", symbol)))
    }

    // ==================== 下单 ====================

    /// 提交限价买单（GTC）
    pub async fn create_order(&self, order: &OrderRequest) -> Result<OrderResponse> {
        self.send_signed(Method::POST, ORDER_PATH, &order_params(order))
            .await
    }

    /// 测试下单，交易所只做校验
    pub async fn create_test_order(&self, order: &OrderRequest) -> Result<OrderResponse> {
        self.send_signed(Method::POST, TEST_ORDER_PATH, &order_params(order))
            .await
    }

    // ==================== 请求 ====================

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}?{}", self.base_url, path, encode_params(params));
        log::debug!("📡 请求 {}", url);

        let response = self.client.get(&url).send().await?;
        parse_response(response).await
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let query = self.signed_query(params, Utc::now().timestamp_millis())?;
        let url = format!("{}{}?{}", self.base_url, path, query);
        log::debug!("📡 {} {}{}", method, self.base_url, path);

        let response = self.client.request(method, &url).send().await?;
        parse_response(response).await
    }

    /// 追加 recvWindow、timestamp 和 signature
    fn signed_query(&self, params: &[(&str, String)], timestamp_ms: i64) -> Result<String> {
        let secret = self
            .api_secret
            .as_deref()
            .ok_or_else(|| ExchangeError::Signing("未配置 API Secret".to_string()))?;

        let mut all: Vec<(&str, String)> = params.to_vec();
        all.push(("recvWindow", self.recv_window_ms.to_string()));
        all.push(("timestamp", timestamp_ms.to_string()));

        let query = encode_params(&all);
        let signature = sign(secret, &query).map_err(|e| ExchangeError::Signing(e.to_string()))?;
        Ok(format!("{}&signature={}", query, signature))
    }
}

fn order_params(order: &OrderRequest) -> Vec<(&'static str, String)> {
    vec![
        ("symbol", order.market_symbol.clone()),
        ("side", "BUY".to_string()),
        ("type", "LIMIT".to_string()),
        ("timeInForce", "GTC".to_string()),
        ("quantity", order.quantity_text.clone()),
        ("price", order.price_text.clone()),
    ]
}

fn encode_params(params: &[(&str, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let (code, msg) = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => (body.code, body.msg),
            Err(_) => (-1, text.chars().take(200).collect()),
        };
        log::warn!("❌ Binance 返回错误 {}: {} {}", status, code, msg);
        return Err(ExchangeError::Api {
            status: status.as_u16(),
            code,
            msg,
        });
    }

    serde_json::from_str(&text).map_err(|e| ExchangeError::Decode(e.to_string()))
}
