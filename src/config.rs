/// 中继配置
///
/// 进程启动时从环境变量读取一次，之后作为不可变值传入每个会话；
/// 运行期间不会变更
use crate::error::RelayError;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "STREAM_RELAY_";

/// 默认压缩级别（-1 表示使用 DEFLATE 的默认级别）- 可通过环境变量 STREAM_RELAY_COMPRESSION_LEVEL 覆盖
pub const DEFAULT_COMPRESSION_LEVEL: i32 = -1;
/// 默认监听端口（服务名或数字端口）- 可通过环境变量 STREAM_RELAY_PORT 覆盖
pub const DEFAULT_LISTEN_PORT: &str = "http";
/// 默认上游地址 - 可通过环境变量 STREAM_RELAY_UPSTREAM_ADDR 覆盖
pub const DEFAULT_UPSTREAM_ADDR: &str = "stream.binance.com:443";

/// 中继配置
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 下行方向的压缩级别（-1 为默认级别，0-9 为显式级别）
    ///
    /// 超出范围的值在压缩写入器构造时被拒绝，只会终止当次会话的
    /// 下行泵，不影响进程
    pub compression_level: i32,
    /// 监听端口，服务名（http/https）或数字端口
    pub listen_port: String,
    /// 上游 host:port
    pub upstream_addr: String,
    /// 跳过上游 TLS 证书校验（显式不安全选项，默认关闭）
    pub insecure_skip_verify: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            listen_port: DEFAULT_LISTEN_PORT.to_string(),
            upstream_addr: DEFAULT_UPSTREAM_ADDR.to_string(),
            insecure_skip_verify: false,
        }
    }
}

impl RelayConfig {
    /// 从环境变量读取配置，缺失或无法解析的值回退到默认值
    pub fn from_env() -> Self {
        Self {
            compression_level: std::env::var(format!("{}COMPRESSION_LEVEL", ENV_PREFIX))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_COMPRESSION_LEVEL),
            listen_port: std::env::var(format!("{}PORT", ENV_PREFIX))
                .unwrap_or_else(|_| DEFAULT_LISTEN_PORT.to_string()),
            upstream_addr: std::env::var(format!("{}UPSTREAM_ADDR", ENV_PREFIX))
                .unwrap_or_else(|_| DEFAULT_UPSTREAM_ADDR.to_string()),
            insecure_skip_verify: std::env::var(format!("{}INSECURE_SKIP_VERIFY", ENV_PREFIX))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    /// 解析监听端口为数字端口
    ///
    /// 无法解析的端口使监听套接字无法打开，属于启动期致命错误
    pub fn listen_port_number(&self) -> Result<u16, RelayError> {
        resolve_port(&self.listen_port).ok_or_else(|| {
            RelayError::config_error(format!("Unresolvable listen port '{}'", self.listen_port))
        })
    }

    /// 上游主机名（用于 TLS 服务器名校验）
    pub fn upstream_host(&self) -> Result<&str, RelayError> {
        match self.upstream_addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(host),
            _ => Err(RelayError::config_error(format!(
                "Invalid upstream address '{}' (expected host:port)",
                self.upstream_addr
            ))),
        }
    }
}

/// 解析端口字符串，支持数字端口和常用服务名
fn resolve_port(port: &str) -> Option<u16> {
    if let Ok(n) = port.parse::<u16>() {
        return Some(n);
    }
    match port {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.compression_level, -1);
        assert_eq!(config.listen_port, "http");
        assert_eq!(config.upstream_addr, "stream.binance.com:443");
        assert!(!config.insecure_skip_verify);
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port("8080"), Some(8080));
        assert_eq!(resolve_port("http"), Some(80));
        assert_eq!(resolve_port("https"), Some(443));
        assert_eq!(resolve_port("gopher"), None);
        assert_eq!(resolve_port(""), None);
        assert_eq!(resolve_port("99999"), None);
    }

    #[test]
    fn test_listen_port_number() {
        let config = RelayConfig::default();
        assert_eq!(config.listen_port_number().unwrap(), 80);

        let config = RelayConfig {
            listen_port: "9443".to_string(),
            ..Default::default()
        };
        assert_eq!(config.listen_port_number().unwrap(), 9443);

        let config = RelayConfig {
            listen_port: "not-a-port".to_string(),
            ..Default::default()
        };
        let err = config.listen_port_number().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_upstream_host() {
        let config = RelayConfig::default();
        assert_eq!(config.upstream_host().unwrap(), "stream.binance.com");

        let config = RelayConfig {
            upstream_addr: "127.0.0.1:9443".to_string(),
            ..Default::default()
        };
        assert_eq!(config.upstream_host().unwrap(), "127.0.0.1");

        for bad in ["no-port", ":443", "host:", "host:abc"] {
            let config = RelayConfig {
                upstream_addr: bad.to_string(),
                ..Default::default()
            };
            assert!(
                config.upstream_host().is_err(),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("STREAM_RELAY_COMPRESSION_LEVEL", "3");
        std::env::set_var("STREAM_RELAY_PORT", "18080");
        std::env::set_var("STREAM_RELAY_UPSTREAM_ADDR", "feed.example.com:443");
        std::env::set_var("STREAM_RELAY_INSECURE_SKIP_VERIFY", "true");

        let config = RelayConfig::from_env();
        assert_eq!(config.compression_level, 3);
        assert_eq!(config.listen_port, "18080");
        assert_eq!(config.upstream_addr, "feed.example.com:443");
        assert!(config.insecure_skip_verify);

        std::env::remove_var("STREAM_RELAY_COMPRESSION_LEVEL");
        std::env::remove_var("STREAM_RELAY_PORT");
        std::env::remove_var("STREAM_RELAY_UPSTREAM_ADDR");
        std::env::remove_var("STREAM_RELAY_INSECURE_SKIP_VERIFY");
    }
}
