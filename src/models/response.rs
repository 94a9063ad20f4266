//! 通用 API 响应模型
//!
//! 定义统一的 API 响应格式

use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// 统一 API 响应结构
///
/// 所有接口返回统一格式，包含：
/// - success: 请求是否成功
/// - data: 响应数据（成功时有值）
/// - message: 响应消息
/// - timestamp: 响应时间戳（配置的显示时区）
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
    /// ISO 8601 格式
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T, tz: Tz) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
            timestamp: Utc::now().with_timezone(&tz).to_rfc3339(),
        }
    }

    /// 创建错误响应
    pub fn error(message: String, tz: Tz) -> Self {
        Self {
            success: false,
            data: None,
            message,
            timestamp: Utc::now().with_timezone(&tz).to_rfc3339(),
        }
    }
}
