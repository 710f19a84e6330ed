use std::env;
use thiserror::Error;

use crate::access_policy::AccessPolicy;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} 环境变量必须设置")]
    Missing(&'static str),
    #[error("{name} 取值无效: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub access_policy: AccessPolicy,
    pub max_page_size: u64,
}

impl AppConfig {
    /// 从环境变量读取配置，调用前先加载 .env
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        if !is_supported_database_url(&database_url) {
            return Err(ConfigError::Invalid {
                name: "DATABASE_URL",
                reason: "必须是 PostgreSQL 或 SQLite 连接字符串".to_string(),
            });
        }

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("PORT") {
            Some(port) => port.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let access_policy = match lookup("ACCESS_POLICY") {
            Some(json) => AccessPolicy::from_json(&json).map_err(|e| ConfigError::Invalid {
                name: "ACCESS_POLICY",
                reason: e.to_string(),
            })?,
            None => AccessPolicy::default(),
        };
        let max_page_size = match lookup("MAX_PAGE_SIZE") {
            Some(size) => match size.parse::<u64>() {
                Ok(size) if size > 0 => size,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        name: "MAX_PAGE_SIZE",
                        reason: "必须大于 0".to_string(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        name: "MAX_PAGE_SIZE",
                        reason: e.to_string(),
                    })
                }
            },
            None => DEFAULT_MAX_PAGE_SIZE,
        };

        Ok(Self {
            database_url,
            host,
            port,
            access_policy,
            max_page_size,
        })
    }
}

fn is_supported_database_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://") || url.starts_with("sqlite:")
}
