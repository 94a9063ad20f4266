pub mod health;
pub mod portfolio;

use actix_web::web;
use chrono_tz::Tz;

use crate::services::pricing::PriceSource;
use crate::services::rebalance::Rebalancer;

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub rebalancer: Rebalancer,
    pub timezone: Tz,
    pub price_source: PriceSource,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(health::config)
            .configure(portfolio::config)
    );
}
