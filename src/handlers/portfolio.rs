//! 组合预览接口处理器
//!
//! 只读接口，不会提交任何订单
//!
//! ## API 列表
//! - GET /allocation - 当前资产配置
//! - GET /portfolio - 按目标配置分配现金后的组合汇总（默认使用均价）
//! - GET /prices - 配置内资产的价格
//! - GET /orders/open - 当前挂单

use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::AppState;
use crate::models::{ApiResponse, OpenOrder};
use crate::services::pricing::{PriceSource, Pricer};
use crate::services::rebalance::{preview_source, PortfolioSnapshot};

/// 价格来源查询参数
#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub source: Option<PriceSource>,
}

pub async fn get_allocation(state: web::Data<AppState>) -> Result<HttpResponse> {
    let allocation = state.rebalancer.allocation().clone();
    Ok(HttpResponse::Ok().json(ApiResponse::success(allocation, state.timezone)))
}

pub async fn get_portfolio(
    state: web::Data<AppState>,
    query: web::Query<PriceQuery>,
) -> Result<HttpResponse> {
    let source = preview_source(query.source);

    match state.rebalancer.preview(source).await {
        Ok(snapshot) => Ok(HttpResponse::Ok().json(ApiResponse::success(snapshot, state.timezone))),
        Err(e) => {
            let response = ApiResponse::<PortfolioSnapshot>::error(e.to_string(), state.timezone);
            Ok(HttpResponse::InternalServerError().json(response))
        }
    }
}

pub async fn get_prices(
    state: web::Data<AppState>,
    query: web::Query<PriceQuery>,
) -> Result<HttpResponse> {
    let source = query.source.unwrap_or(state.price_source);
    let pricer = Pricer::new(state.rebalancer.trading(), source);
    let symbols = state.rebalancer.allocation().symbols();

    let prices: BTreeMap<String, f64> = pricer
        .prices(state.rebalancer.client(), &symbols)
        .await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(prices, state.timezone)))
}

pub async fn get_open_orders(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.rebalancer.client().get_open_orders().await {
        Ok(orders) => Ok(HttpResponse::Ok().json(ApiResponse::success(orders, state.timezone))),
        Err(e) => {
            let response = ApiResponse::<Vec<OpenOrder>>::error(e.to_string(), state.timezone);
            Ok(HttpResponse::InternalServerError().json(response))
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/allocation", web::get().to(get_allocation))
        .route("/portfolio", web::get().to(get_portfolio))
        .route("/prices", web::get().to(get_prices))
        .route("/orders/open", web::get().to(get_open_orders));
}
