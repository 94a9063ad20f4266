//! Binance.US 接口
//!
//! ## 主要功能
//! - 账户余额、当前挂单（签名）
//! - 订单簿、归集成交、5 分钟均价
//! - 交易对规则（价格/数量过滤器）
//! - 限价买单与测试下单（签名）

mod client;
mod common;
mod error;

pub use client::BinanceClient;
pub use common::{format_decimal, market_symbol, round_step_size};
