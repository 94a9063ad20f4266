//! 公共常量和辅助函数

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

// ==================== Binance REST 接口 ====================

/// 账户信息（签名）
pub const ACCOUNT_PATH: &str = "/api/v3/account";
/// 订单簿
pub const DEPTH_PATH: &str = "/api/v3/depth";
/// 归集成交
pub const AGG_TRADES_PATH: &str = "/api/v3/aggTrades";
/// 5 分钟均价
pub const AVG_PRICE_PATH: &str = "/api/v3/avgPrice";
/// 交易规则
pub const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";
/// 下单（签名）
pub const ORDER_PATH: &str = "/api/v3/order";
/// 测试下单，只校验不成交（签名）
pub const TEST_ORDER_PATH: &str = "/api/v3/order/test";
/// 当前挂单（签名）
pub const OPEN_ORDERS_PATH: &str = "/api/v3/openOrders";

/// API Key 请求头
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// 对查询字符串做 HMAC-SHA256 签名，返回小写十六进制
pub fn sign(secret: &str, query: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("无效的 API Secret: {}", e))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// 交易对代码，如 BTC + USD -> BTCUSD
pub fn market_symbol(asset: &str, quote: &str) -> String {
    format!("{}{}", asset, quote)
}

/// 步长的小数位数，如 0.001 -> 3
pub fn step_precision(step: f64) -> usize {
    if step <= 0.0 || !step.is_finite() {
        return 8;
    }
    let text = format!("{:.10}", step);
    let trimmed = text.trim_end_matches('0');
    match trimmed.find('.') {
        Some(pos) => trimmed.len() - pos - 1,
        None => 0,
    }
}

/// 向下取整到步长的整数倍，步长为 0 时不取整
pub fn round_step_size(value: f64, step: f64) -> f64 {
    if step <= 0.0 || !step.is_finite() {
        return value;
    }
    let precision = step_precision(step);
    // 补偿浮点误差，避免 0.3 / 0.1 得到 2.9999
    let steps = (value / step + 1e-9).floor();
    let factor = 10f64.powi(precision as i32);
    (steps * step * factor).round() / factor
}

/// 按步长的精度格式化数值
pub fn format_decimal(value: f64, step: f64) -> String {
    let text = format!("{:.*}", step_precision(step), value);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Binance 文档中的签名示例
    #[test]
    fn test_sign_matches_documented_example() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_step_precision() {
        assert_eq!(step_precision(1.0), 0);
        assert_eq!(step_precision(0.1), 1);
        assert_eq!(step_precision(0.001), 3);
        assert_eq!(step_precision(0.00000100), 6);
        assert_eq!(step_precision(0.0), 8);
    }

    #[test]
    fn test_round_step_size() {
        assert_eq!(round_step_size(1.23456, 0.01), 1.23);
        assert_eq!(round_step_size(0.3, 0.1), 0.3);
        assert_eq!(round_step_size(0.0019999, 0.001), 0.001);
        assert_eq!(round_step_size(17.9, 1.0), 17.0);
        assert_eq!(round_step_size(42.4242, 0.0), 42.4242);
        assert_eq!(round_step_size(3345.678, 0.01), 3345.67);
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(0.0123, 0.0001), "0.0123");
        assert_eq!(format_decimal(1.5, 0.01), "1.5");
        assert_eq!(format_decimal(17.0, 1.0), "17");
        assert_eq!(format_decimal(2.0, 0.01), "2");
    }

    #[test]
    fn test_market_symbol() {
        assert_eq!(market_symbol("BTC", "USD"), "BTCUSD");
    }
}
