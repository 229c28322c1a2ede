/// 服务器配置 - Order Hub 的所有配置项
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HTTP_PORT | 5000 | HTTP/WS 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (none) | 日志目录，设置后按天滚动写文件 |
/// | LIVE_ACCESS_TOKEN | (none) | 实时通道令牌；未设置时接受任意非空令牌 |
/// | LIVE_BUFFER | 256 | 实时广播缓冲 |
/// | LIVE_PING_SECS | 30 | WS ping 间隔 |
/// | DEFAULT_LIST_LIMIT | 50 | 列表默认条数 |
/// | MAX_LIST_LIMIT | 200 | 列表最大条数 |
#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub live_access_token: Option<String>,
    pub live_buffer: usize,
    pub live_ping_secs: u64,
    pub default_list_limit: u32,
    pub max_list_limit: u32,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self {
            http_port: env_or("HTTP_PORT", 5000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            live_access_token: std::env::var("LIVE_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            live_buffer: env_or("LIVE_BUFFER", 256),
            live_ping_secs: env_or("LIVE_PING_SECS", 30),
            default_list_limit: env_or("DEFAULT_LIST_LIMIT", 50),
            max_list_limit: env_or("MAX_LIST_LIMIT", 200),
        }
    }

    /// 使用自定义端口覆盖配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.http_port = http_port;
        config
    }

    pub fn with_live_access_token(mut self, token: impl Into<String>) -> Self {
        self.live_access_token = Some(token.into());
        self
    }

    /// Effective list size for a requested limit
    pub fn list_limit(&self, requested: Option<u32>) -> usize {
        requested
            .unwrap_or(self.default_list_limit)
            .clamp(1, self.max_list_limit.max(1)) as usize
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_limit_clamped() {
        let mut config = Config::with_overrides(0);
        config.default_list_limit = 50;
        config.max_list_limit = 200;
        assert_eq!(config.list_limit(None), 50);
        assert_eq!(config.list_limit(Some(0)), 1);
        assert_eq!(config.list_limit(Some(10_000)), 200);
    }
}
