//! 错误类型定义
//!
//! 只有配置阶段会产生错误。请求处理、响应传播和任务恢复路径上的异常输入
//! （无效请求头、未激活的会话、未知的 key）都会被静默吸收，不会出现在这里。

use thiserror::Error;

/// 追踪组件的错误类型
#[derive(Debug, Error)]
pub enum TracingError {
    /// 配置项缺少 `source` 字段
    #[error("tracing source '{key}' is missing a 'source' definition")]
    MissingSource { key: String },

    /// `source` 名称在工厂表中不存在
    #[error("tracing source '{source_name}' for '{key}' is not registered")]
    UnknownSource { key: String, source_name: String },

    /// 配置的请求头名称不是合法的 HTTP 头部名称
    #[error("tracing '{key}' has an invalid header name '{header}'")]
    InvalidHeader { key: String, header: String },

    /// 配置文件解析失败
    #[error("failed to parse tracing configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// 配置文件读取失败
    #[error("failed to read tracing configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// 本 crate 的 `Result` 别名
pub type Result<T> = std::result::Result<T, TracingError>;
