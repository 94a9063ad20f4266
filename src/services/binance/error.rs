//! 交易所请求错误

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    /// 交易所返回的业务错误，如 -1013 Filter failure
    #[error("Binance API 错误 (HTTP {status}, code {code}): {msg}")]
    Api { status: u16, code: i64, msg: String },

    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("解析响应失败: {0}")]
    Decode(String),

    #[error("请求签名失败: {0}")]
    Signing(String),
}

impl ExchangeError {
    /// 错误类型名称，写入订单结果
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Api { .. } => "BinanceAPIException",
            ExchangeError::Http(_) => "BinanceRequestException",
            ExchangeError::Decode(_) => "BinanceDecodeException",
            ExchangeError::Signing(_) => "BinanceSigningException",
        }
    }
}
