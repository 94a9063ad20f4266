//! 下单
//!
//! 把计划投入的金额换算成限价买单，按交易对规则取整和校验后并发提交

use futures::future::join_all;
use thiserror::Error;

use super::binance::{format_decimal, market_symbol, round_step_size, BinanceClient};
use crate::models::{Asset, OrderOutcome, OrderRequest, SymbolFilters};

/// 订单未通过交易对规则
#[derive(Error, Debug, PartialEq)]
pub enum FilterViolation {
    #[error("price {0} is not positive")]
    NonPositivePrice(f64),
    #[error("price {price} < minPrice {min}")]
    BelowMinPrice { price: f64, min: f64 },
    #[error("price {price} > maxPrice {max}")]
    AboveMaxPrice { price: f64, max: f64 },
    #[error("quantity {quantity} < minQty {min}")]
    BelowMinQty { quantity: f64, min: f64 },
    #[error("quantity {quantity} > maxQty {max}")]
    AboveMaxQty { quantity: f64, max: f64 },
    #[error("notional {notional} < minNotional {min}")]
    BelowMinNotional { notional: f64, min: f64 },
}

/// 下单模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderMode {
    /// 走测试下单接口
    Test,
    /// 真实下单
    Live,
}

/// 按计划投入金额生成订单
pub fn plan_order(
    asset: &Asset,
    quote_asset: &str,
    price: f64,
    filters: &SymbolFilters,
) -> Result<OrderRequest, FilterViolation> {
    if !(price > 0.0) {
        return Err(FilterViolation::NonPositivePrice(price));
    }

    let quantity = round_step_size(asset.amount_invested / price, filters.step_size);
    let price = round_step_size(price, filters.tick_size);
    let notional = price * quantity;

    if price < filters.min_price {
        return Err(FilterViolation::BelowMinPrice { price, min: filters.min_price });
    }
    if price > filters.max_price {
        return Err(FilterViolation::AboveMaxPrice { price, max: filters.max_price });
    }
    if quantity < filters.min_qty {
        return Err(FilterViolation::BelowMinQty { quantity, min: filters.min_qty });
    }
    if quantity > filters.max_qty {
        return Err(FilterViolation::AboveMaxQty { quantity, max: filters.max_qty });
    }
    if notional < filters.min_notional {
        return Err(FilterViolation::BelowMinNotional { notional, min: filters.min_notional });
    }

    Ok(OrderRequest {
        symbol: asset.symbol.clone(),
        market_symbol: market_symbol(&asset.symbol, quote_asset),
        quantity,
        price,
        quantity_text: format_decimal(quantity, filters.step_size),
        price_text: format_decimal(price, filters.tick_size),
    })
}

/// 提交单笔订单，失败记录在结果中
pub async fn submit_order(
    client: &BinanceClient,
    request: &OrderRequest,
    mode: OrderMode,
) -> OrderOutcome {
    let result = match mode {
        OrderMode::Test => client.create_test_order(request).await,
        OrderMode::Live => client.create_order(request).await,
    };

    match result {
        Ok(response) => {
            let outcome = OrderOutcome::success(request, response);
            log::info!("✅ {}", outcome.message);
            outcome
        }
        Err(e) => {
            log::warn!("❌ {} 下单失败: {}", request.market_symbol, e);
            OrderOutcome::failure(request, e.kind(), e.to_string())
        }
    }
}

/// 并发提交全部订单
pub async fn submit_orders(
    client: &BinanceClient,
    requests: &[OrderRequest],
    mode: OrderMode,
) -> Vec<OrderOutcome> {
    join_all(requests.iter().map(|r| submit_order(client, r, mode))).await
}

/// 成功订单的总金额
pub fn cash_spent(outcomes: &[OrderOutcome]) -> f64 {
    outcomes
        .iter()
        .filter(|o| o.is_success())
        .map(|o| o.notional)
        .sum()
}
