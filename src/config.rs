//! 追踪配置
//!
//! 配置从 TOML 反序列化，也可以完全在代码中构造。所有字段都有默认值，
//! 默认配置包含 `correlation_id` 和 `request_id` 两个内置来源。
//!
//! ```toml
//! enabled = true
//! accept_external_headers = true
//!
//! [http_client]
//! enabled = false
//!
//! [tracings.correlation_id]
//! header = "X-Correlation-Id"
//! source = "correlation_id"
//! ```

use crate::error::Result;
use crate::manager::{CORRELATION_ID, REQUEST_ID};
use crate::source::{CORRELATION_ID_HEADER, REQUEST_ID_HEADER};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 全局开关的环境变量
pub const ENV_ENABLED: &str = "TRACINGS_ENABLED";
/// 外部头部接收开关的环境变量
pub const ENV_ACCEPT_EXTERNAL_HEADERS: &str = "TRACINGS_ACCEPT_EXTERNAL_HEADERS";
/// 出站 HTTP 自动附加开关的环境变量
pub const ENV_HTTP_CLIENT_ENABLED: &str = "TRACINGS_HTTP_CLIENT_ENABLED";
/// 关联ID请求头名称的环境变量
pub const ENV_CORRELATION_ID_HEADER: &str = "TRACINGS_CORRELATION_ID_HEADER";
/// 请求ID请求头名称的环境变量
pub const ENV_REQUEST_ID_HEADER: &str = "TRACINGS_REQUEST_ID_HEADER";

/// 追踪配置根
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// 全局开关，关闭时解析和传播完全跳过
    pub enabled: bool,

    /// 是否接收入站请求中的追踪头部
    pub accept_external_headers: bool,

    /// 追踪来源，按配置顺序注册
    pub tracings: IndexMap<String, SourceConfig>,

    /// 出站 HTTP 调用设置
    pub http_client: HttpClientConfig,
}

impl Default for TracingConfig {
    fn default() -> Self {
        let mut tracings = IndexMap::new();
        tracings.insert(
            CORRELATION_ID.to_string(),
            SourceConfig::new(CORRELATION_ID_HEADER, CORRELATION_ID),
        );
        tracings.insert(
            REQUEST_ID.to_string(),
            SourceConfig::new(REQUEST_ID_HEADER, REQUEST_ID),
        );

        Self {
            enabled: true,
            accept_external_headers: true,
            tracings,
            http_client: HttpClientConfig::default(),
        }
    }
}

impl TracingConfig {
    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 从 TOML 文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 添加或覆盖一个来源配置
    pub fn with_tracing(mut self, key: impl Into<String>, source: SourceConfig) -> Self {
        self.tracings.insert(key.into(), source);
        self
    }

    /// 使用进程环境变量覆盖配置
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// 使用给定的变量查找函数覆盖配置
    ///
    /// 布尔值接受 `1/0/true/false/yes/no/on/off`（大小写不敏感），
    /// 无法识别的值记录警告后忽略。
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(enabled) = lookup_bool(&lookup, ENV_ENABLED) {
            self.enabled = enabled;
        }
        if let Some(accept) = lookup_bool(&lookup, ENV_ACCEPT_EXTERNAL_HEADERS) {
            self.accept_external_headers = accept;
        }
        if let Some(enabled) = lookup_bool(&lookup, ENV_HTTP_CLIENT_ENABLED) {
            self.http_client.enabled = enabled;
        }

        for (var, key) in [
            (ENV_CORRELATION_ID_HEADER, CORRELATION_ID),
            (ENV_REQUEST_ID_HEADER, REQUEST_ID),
        ] {
            let Some(header) = lookup(var).filter(|h| !h.trim().is_empty()) else {
                continue;
            };
            if let Some(entry) = self.tracings.get_mut(key) {
                entry.header = header.trim().to_string();
            }
        }

        self
    }
}

/// 单个来源的配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// 是否启用，默认启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 读写的 HTTP 头部名称
    #[serde(default)]
    pub header: String,

    /// 来源在工厂表中的名称
    #[serde(default)]
    pub source: Option<String>,
}

impl SourceConfig {
    pub fn new(header: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            enabled: true,
            header: header.into(),
            source: Some(source.into()),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// 出站 HTTP 调用配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// 为追踪请求期间的所有出站调用自动附加追踪头部
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn lookup_bool<F>(lookup: &F, name: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(variable = name, value = %raw, "ignoring unrecognized boolean override");
            None
        }
    }
}
