//! 配置模块
//!
//! 支持从 JSON 文件加载系统配置，API 凭证从 .env 读取

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{Allocation, AllocationCategory};
use crate::services::pricing::PriceSource;

/// 默认配置文件路径，按顺序查找
const CONFIG_PATHS: [&str; 2] = ["config.json", "config/config.json"];

/// API Key 环境变量名
pub const API_KEY_VAR: &str = "binana_api";
/// API Secret 环境变量名
pub const API_SECRET_VAR: &str = "binana_secret";

/// Binance 接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceConfig {
    /// REST 接口地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 签名请求的 recvWindow（毫秒）
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// 连接超时时间（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// 价格预测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// 参与拟合的最近成交笔数
    #[serde(default = "default_trade_limit")]
    pub trade_limit: usize,
    /// 多项式阶数
    #[serde(default = "default_degree")]
    pub degree: usize,
}

/// 交易配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// 计价资产
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// 默认投资金额（美元）
    #[serde(default = "default_investment_amount")]
    pub investment_amount: f64,
    /// 账户中保留不投资的现金（美元）
    #[serde(default = "default_cash_reserve")]
    pub cash_reserve: f64,
    /// 盘口均价使用的买单档数
    #[serde(default = "default_order_book_depth")]
    pub order_book_depth: u32,
    /// 下单价格来源
    #[serde(default)]
    pub price_source: PriceSource,
    /// 价格预测参数
    #[serde(default)]
    pub predictor: PredictorConfig,
}

/// HTTP 预览服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// API Key（为空则不启用认证）
    #[serde(default)]
    pub api_key: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// 配置文件中的资产配置分类
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    /// 资产代码 -> 目标权重
    pub assets: Vec<(String, f64)>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub binance: BinanceConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    /// 覆盖内置资产配置（为空则使用内置配置）
    #[serde(default)]
    pub allocation: Option<Vec<CategoryConfig>>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// 报告时间戳使用的时区
    #[serde(default = "default_timezone")]
    pub display_timezone: String,
}

// 默认值函数
fn default_base_url() -> String { "https://api.binance.us".to_string() }
fn default_recv_window() -> u64 { 5000 }
fn default_timeout() -> u64 { 30 }
fn default_connect_timeout() -> u64 { 10 }
fn default_trade_limit() -> usize { 50 }
fn default_degree() -> usize { 5 }
fn default_quote_asset() -> String { "USD".to_string() }
fn default_investment_amount() -> f64 { 200.0 }
fn default_cash_reserve() -> f64 { 10.0 }
fn default_order_book_depth() -> u32 { 15 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_log_level() -> String { "info".to_string() }
fn default_timezone() -> String { "America/New_York".to_string() }

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            recv_window_ms: default_recv_window(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            trade_limit: default_trade_limit(),
            degree: default_degree(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            quote_asset: default_quote_asset(),
            investment_amount: default_investment_amount(),
            cash_reserve: default_cash_reserve(),
            order_book_depth: default_order_book_depth(),
            price_source: PriceSource::default(),
            predictor: PredictorConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: String::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            binance: BinanceConfig::default(),
            trading: TradingConfig::default(),
            allocation: None,
            server: ServerConfig::default(),
            log: LogConfig::default(),
            display_timezone: default_timezone(),
        }
    }
}

impl AppConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("读取配置文件 {} 失败", path.as_ref().display()))?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 在当前目录下查找配置文件
    pub fn locate() -> Option<PathBuf> {
        Self::locate_in(Path::new("."))
    }

    /// 依次查找 config.json、config/config.json
    fn locate_in(dir: &Path) -> Option<PathBuf> {
        CONFIG_PATHS
            .iter()
            .map(|p| dir.join(p))
            .find(|p| p.exists())
    }

    /// 获取服务器绑定地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 构建并校验资产配置
    pub fn allocation(&self) -> anyhow::Result<Allocation> {
        let allocation = match &self.allocation {
            Some(categories) => categories.iter().fold(Allocation::new(), |acc, c| {
                let category = c
                    .assets
                    .iter()
                    .fold(AllocationCategory::new(&c.name), |cat, (symbol, weight)| {
                        cat.with_asset(symbol, *weight)
                    });
                acc.with_category(category)
            }),
            None => Allocation::default(),
        };
        Ok(allocation.verify()?)
    }

    /// 解析显示时区
    pub fn timezone(&self) -> chrono_tz::Tz {
        self.display_timezone.parse().unwrap_or_else(|_| {
            log::warn!("无法识别时区 {}，使用 UTC", self.display_timezone);
            chrono_tz::UTC
        })
    }
}

/// Binance API 凭证
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .finish()
    }
}

impl Credentials {
    /// 从 .env 和环境变量读取凭证
    pub fn from_env() -> anyhow::Result<Self> {
        if let Err(e) = dotenv::dotenv() {
            log::debug!("未加载 .env 文件: {}", e);
        }
        Ok(Self {
            api_key: read_var(API_KEY_VAR)?,
            api_secret: read_var(API_SECRET_VAR)?,
        })
    }
}

fn read_var(name: &str) -> anyhow::Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(anyhow!("未设置环境变量 {}，请在 .env 中配置", name)),
    }
}
