//! 订单模型

use serde::Serialize;

use super::binance::OrderResponse;

/// 限价买单请求
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderRequest {
    /// 资产代码（如 BTC）
    pub symbol: String,
    /// 交易对（如 BTCUSD）
    pub market_symbol: String,
    pub quantity: f64,
    pub price: f64,
    /// 按步长格式化后的数量
    #[serde(skip)]
    pub quantity_text: String,
    /// 按最小价格变动格式化后的价格
    #[serde(skip)]
    pub price_text: String,
}

impl OrderRequest {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// 下单结果
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderResult {
    Success,
    Failure,
}

/// 单笔订单的提交结果
#[derive(Debug, Clone, Serialize)]
pub struct OrderOutcome {
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub notional: f64,
    pub result: OrderResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<OrderResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
    pub message: String,
}

impl OrderOutcome {
    pub fn success(request: &OrderRequest, response: OrderResponse) -> Self {
        let notional = request.notional();
        Self {
            symbol: request.symbol.clone(),
            quantity: request.quantity,
            price: request.price,
            notional,
            result: OrderResult::Success,
            response: Some(response),
            exception_type: None,
            message: format!(
                "Ordered {} {} at ${:.3} (Total: ${:.3})",
                request.quantity_text, request.symbol, request.price, notional
            ),
        }
    }

    pub fn failure(request: &OrderRequest, exception_type: &str, message: String) -> Self {
        Self {
            symbol: request.symbol.clone(),
            quantity: request.quantity,
            price: request.price,
            notional: request.notional(),
            result: OrderResult::Failure,
            response: None,
            exception_type: Some(exception_type.to_string()),
            message,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == OrderResult::Success
    }
}

/// 未通过校验、未提交的订单
#[derive(Debug, Clone, Serialize)]
pub struct SkippedOrder {
    pub symbol: String,
    pub reason: String,
}
