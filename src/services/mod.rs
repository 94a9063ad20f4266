//! 业务逻辑服务模块
//!
//! 封装交易所访问、定价、下单和再平衡流程

pub mod binance;    // Binance.US 接口
pub mod orders;     // 下单与规则校验
pub mod predictor;  // 价格预测
pub mod pricing;    // 资产定价
pub mod rebalance;  // 再平衡流程
