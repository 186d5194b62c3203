//! Bot 配置：Telegram 接入、存储、日志、轮询与探测参数，均从环境变量加载。

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use net_tools::PingOptions;
use nethelper_dispatcher::PollingConfig;
use nethelper_telegram::TelegramConfig;

/// 读取并解析环境变量 `name`：未设置返回 `None`，无法解析则报错。
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(env_parse(name)?.unwrap_or(default))
}

fn env_bool(name: &str, default: bool) -> Result<bool> {
    match env::var(name).ok().map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => anyhow::bail!("{} must be a boolean (true/false), got {:?}", name, v),
    }
}

/// 应用配置，启动时构建一次并按引用传递。
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// BOT_TOKEN（命令行 `--token` 优先）
    pub bot_token: String,
    /// TELEGRAM_API_URL 或 TELOXIDE_API_URL
    pub telegram_api_url: Option<String>,
    /// DATABASE_URL 或 SQLITE_DB_PATH
    pub database_url: String,
    pub log_file: String,

    pub poll_timeout_secs: u64,
    pub poll_limit: u32,
    /// 设置后每次拉取不等待，两次拉取之间休眠该秒数。
    pub poll_interval_secs: Option<u64>,
    pub poll_retry_delay_secs: u64,
    /// 启动时清除残留的 `*_RUNNING` 状态。
    pub reset_running_on_start: bool,

    pub ping_count: u32,
    /// 为 0 时不设整体截止时间。
    pub ping_deadline_secs: u64,
    pub ping_reply_timeout_secs: u64,
    pub dns_timeout_secs: u64,
    pub whois_timeout_secs: u64,
    pub tls_timeout_secs: u64,
    pub myip_timeout_secs: u64,
}

impl BotConfig {
    /// 从环境变量加载配置。
    /// 传入 `token` 时覆盖 BOT_TOKEN；已设置但无法解析的数值或布尔变量直接报错。
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("BOT_TOKEN").context("BOT_TOKEN not set (or pass --token)")?,
        };
        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .or_else(|_| env::var("TELOXIDE_API_URL"))
            .ok();
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("SQLITE_DB_PATH"))
            .unwrap_or_else(|_| "./nethelper.db".to_string());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/nethelper.log".to_string());

        Ok(Self {
            bot_token,
            telegram_api_url,
            database_url,
            log_file,
            poll_timeout_secs: env_or("POLL_TIMEOUT_SECS", 50)?,
            poll_limit: env_or("POLL_LIMIT", 100)?,
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS")?,
            poll_retry_delay_secs: env_or("POLL_RETRY_DELAY_SECS", 2)?,
            reset_running_on_start: env_bool("RESET_RUNNING_ON_START", true)?,
            ping_count: env_or("PING_COUNT", 10)?,
            ping_deadline_secs: env_or("PING_DEADLINE_SECS", 20)?,
            ping_reply_timeout_secs: env_or("PING_REPLY_TIMEOUT_SECS", 2)?,
            dns_timeout_secs: env_or("DNS_TIMEOUT_SECS", 4)?,
            whois_timeout_secs: env_or("WHOIS_TIMEOUT_SECS", 8)?,
            tls_timeout_secs: env_or("TLS_TIMEOUT_SECS", 7)?,
            myip_timeout_secs: env_or("MYIP_TIMEOUT_SECS", 4)?,
        })
    }

    /// 校验配置：API URL 可解析、POLL_LIMIT 在 1..=100 之间、各超时不为 0。
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN is empty");
        }
        if let Some(ref url_str) = self.telegram_api_url {
            if reqwest::Url::parse(url_str).is_err() {
                anyhow::bail!(
                    "TELEGRAM_API_URL (or TELOXIDE_API_URL) is set but not a valid URL: {}",
                    url_str
                );
            }
        }
        if !(1..=100).contains(&self.poll_limit) {
            anyhow::bail!("POLL_LIMIT must be between 1 and 100, got {}", self.poll_limit);
        }
        if self.ping_count == 0 {
            anyhow::bail!("PING_COUNT must be at least 1");
        }
        let timeouts = [
            ("POLL_TIMEOUT_SECS", self.poll_timeout_secs),
            ("POLL_RETRY_DELAY_SECS", self.poll_retry_delay_secs),
            ("PING_REPLY_TIMEOUT_SECS", self.ping_reply_timeout_secs),
            ("DNS_TIMEOUT_SECS", self.dns_timeout_secs),
            ("WHOIS_TIMEOUT_SECS", self.whois_timeout_secs),
            ("TLS_TIMEOUT_SECS", self.tls_timeout_secs),
            ("MYIP_TIMEOUT_SECS", self.myip_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            anyhow::bail!("{} must be greater than zero", name);
        }
        if self.poll_interval_secs == Some(0) {
            anyhow::bail!("POLL_INTERVAL_SECS must be greater than zero when set");
        }
        Ok(())
    }

    pub fn polling_config(&self) -> PollingConfig {
        PollingConfig {
            long_poll_wait: Duration::from_secs(self.poll_timeout_secs),
            limit: u8::try_from(self.poll_limit.clamp(1, 100)).unwrap_or(100),
            interval: self.poll_interval_secs.map(Duration::from_secs),
            retry_delay: Duration::from_secs(self.poll_retry_delay_secs),
        }
    }

    pub fn telegram_config(&self) -> TelegramConfig {
        TelegramConfig {
            bot_token: self.bot_token.clone(),
            telegram_api_url: self.telegram_api_url.clone(),
            long_poll_wait: self.polling_config().fetch_wait(),
        }
    }

    pub fn ping_options(&self) -> PingOptions {
        PingOptions {
            count: self.ping_count,
            deadline: (self.ping_deadline_secs > 0)
                .then(|| Duration::from_secs(self.ping_deadline_secs)),
            reply_timeout: Duration::from_secs(self.ping_reply_timeout_secs),
        }
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_secs(self.whois_timeout_secs)
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_timeout_secs)
    }

    pub fn myip_timeout(&self) -> Duration {
        Duration::from_secs(self.myip_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 18] = [
        "BOT_TOKEN",
        "TELEGRAM_API_URL",
        "TELOXIDE_API_URL",
        "DATABASE_URL",
        "SQLITE_DB_PATH",
        "LOG_FILE",
        "POLL_TIMEOUT_SECS",
        "POLL_LIMIT",
        "POLL_INTERVAL_SECS",
        "POLL_RETRY_DELAY_SECS",
        "RESET_RUNNING_ON_START",
        "PING_COUNT",
        "PING_DEADLINE_SECS",
        "PING_REPLY_TIMEOUT_SECS",
        "DNS_TIMEOUT_SECS",
        "WHOIS_TIMEOUT_SECS",
        "TLS_TIMEOUT_SECS",
        "MYIP_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for name in VARS {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_load_config_with_defaults() {
        clear_env();
        env::set_var("BOT_TOKEN", "test_token");

        let config = BotConfig::load(None).unwrap();

        assert_eq!(config.bot_token, "test_token");
        assert!(config.telegram_api_url.is_none());
        assert_eq!(config.database_url, "./nethelper.db");
        assert_eq!(config.log_file, "logs/nethelper.log");
        assert!(config.reset_running_on_start);
        config.validate().unwrap();

        let polling = config.polling_config();
        assert_eq!(polling.long_poll_wait, Duration::from_secs(50));
        assert_eq!(polling.limit, 100);
        assert!(polling.interval.is_none());
        assert_eq!(polling.retry_delay, Duration::from_secs(2));

        let ping = config.ping_options();
        assert_eq!(ping.count, 10);
        assert_eq!(ping.deadline, Some(Duration::from_secs(20)));
        assert_eq!(ping.reply_timeout, Duration::from_secs(2));
        assert_eq!(config.dns_timeout(), Duration::from_secs(4));
        assert_eq!(config.whois_timeout(), Duration::from_secs(8));
        assert_eq!(config.tls_timeout(), Duration::from_secs(7));
        assert_eq!(config.myip_timeout(), Duration::from_secs(4));
    }

    #[test]
    #[serial]
    fn test_load_config_with_custom_values() {
        clear_env();
        env::set_var("BOT_TOKEN", "custom_token");
        env::set_var("SQLITE_DB_PATH", "/tmp/nh.db");
        env::set_var("TELOXIDE_API_URL", "http://127.0.0.1:8081");
        env::set_var("POLL_INTERVAL_SECS", "5");
        env::set_var("POLL_LIMIT", "20");
        env::set_var("RESET_RUNNING_ON_START", "false");
        env::set_var("PING_COUNT", "4");
        env::set_var("PING_DEADLINE_SECS", "0");

        let config = BotConfig::load(None).unwrap();
        config.validate().unwrap();

        assert_eq!(config.database_url, "/tmp/nh.db");
        assert_eq!(config.telegram_api_url.as_deref(), Some("http://127.0.0.1:8081"));
        assert!(!config.reset_running_on_start);
        assert_eq!(config.polling_config().limit, 20);
        assert_eq!(config.polling_config().interval, Some(Duration::from_secs(5)));
        assert_eq!(config.telegram_config().long_poll_wait, Duration::ZERO);
        assert_eq!(config.ping_options().count, 4);
        assert!(config.ping_options().deadline.is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_config_with_override_token() {
        clear_env();
        env::set_var("BOT_TOKEN", "env_token");

        let config = BotConfig::load(Some("override_token".to_string())).unwrap();

        assert_eq!(config.bot_token, "override_token");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_token_is_an_error() {
        clear_env();
        assert!(BotConfig::load(None).is_err());
    }

    #[test]
    #[serial]
    fn test_validate_rejects_bad_values() {
        clear_env();
        env::set_var("BOT_TOKEN", "t");

        env::set_var("TELEGRAM_API_URL", "not a url");
        assert!(BotConfig::load(None).unwrap().validate().is_err());
        env::remove_var("TELEGRAM_API_URL");

        env::set_var("POLL_LIMIT", "101");
        assert!(BotConfig::load(None).unwrap().validate().is_err());
        env::set_var("POLL_LIMIT", "0");
        assert!(BotConfig::load(None).unwrap().validate().is_err());
        env::remove_var("POLL_LIMIT");

        env::set_var("DNS_TIMEOUT_SECS", "0");
        let err = BotConfig::load(None).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("DNS_TIMEOUT_SECS"));
        env::remove_var("DNS_TIMEOUT_SECS");

        env::set_var("POLL_TIMEOUT_SECS", "0");
        let err = BotConfig::load(None).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("POLL_TIMEOUT_SECS"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparsable_values_abort_load() {
        clear_env();
        env::set_var("BOT_TOKEN", "t");

        env::set_var("PING_COUNT", "ten");
        let err = BotConfig::load(None).unwrap_err();
        assert!(err.to_string().contains("PING_COUNT"));
        env::remove_var("PING_COUNT");

        env::set_var("POLL_INTERVAL_SECS", "-5");
        let err = BotConfig::load(None).unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_SECS"));
        env::remove_var("POLL_INTERVAL_SECS");

        env::set_var("RESET_RUNNING_ON_START", "maybe");
        let err = BotConfig::load(None).unwrap_err();
        assert!(err.to_string().contains("RESET_RUNNING_ON_START"));
        clear_env();
    }
}
