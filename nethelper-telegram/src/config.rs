//! 传输层最小配置：token、可选 API URL、长轮询等待时长。
//! 等待时长同时决定 HTTP 客户端超时。

use std::time::Duration;

/// 在长轮询等待时长之上追加的余量，HTTP 客户端超时不会早于一次长轮询结束。
pub const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Telegram 接入配置（仅 token、API 地址与轮询等待）。
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// 可选：Bot API 基础 URL（测试时可指向 mock 服务器）。
    pub telegram_api_url: Option<String>,
    pub long_poll_wait: Duration,
}

impl TelegramConfig {
    /// 仅使用给定 token 构造：默认 API 地址，长轮询等待 50 秒。
    pub fn with_token(bot_token: String) -> Self {
        Self {
            bot_token,
            telegram_api_url: None,
            long_poll_wait: Duration::from_secs(50),
        }
    }

    /// HTTP 客户端超时 = 长轮询等待 + 余量。
    pub fn http_timeout(&self) -> Duration {
        self.long_poll_wait + HTTP_TIMEOUT_MARGIN
    }
}
