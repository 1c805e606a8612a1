use std::time::Duration;

use thiserror::Error;

pub const HOST_VAR: &str = "DOSE3D_HOST";
pub const PORT_VAR: &str = "DOSE3D_PORT";
pub const RESOURCE_DIR_VAR: &str = "DOSE3D_RESOURCE_DIR";
pub const GRID_TTL_VAR: &str = "DOSE3D_GRID_TTL_SECS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// 服务配置，从环境变量读取，未设置时使用默认值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 资源目录，请求中的文件名都相对于该目录
    pub resource_dir: String,
    /// 已加载网格在缓存中的保留时间
    pub grid_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            resource_dir: "test/resource".to_string(),
            grid_ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// 通过任意查找函数构建，便于测试时不修改进程环境
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup(HOST_VAR) {
            config.host = host;
        }
        if let Some(value) = lookup(PORT_VAR) {
            config.port = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: PORT_VAR,
                expected: "a port number",
                value,
            })?;
        }
        if let Some(dir) = lookup(RESOURCE_DIR_VAR) {
            config.resource_dir = dir;
        }
        if let Some(value) = lookup(GRID_TTL_VAR) {
            let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: GRID_TTL_VAR,
                expected: "a number of seconds",
                value,
            })?;
            config.grid_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
