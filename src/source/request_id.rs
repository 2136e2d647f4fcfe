//! 请求ID来源

use super::{external_value, TracingRequest, TracingSource, REQUEST_ID_HEADER};
use crate::generator::generate;

/// 每次请求唯一的请求ID来源
///
/// 解析优先级：
/// 1. 外部请求头（开启外部头部接收且通过清洗时）
/// 2. 新生成的 UUID
///
/// 不读写任何会话存储，每次调用 `resolve` 都会重新解析，来源本身不做缓存。
/// 传播到任务中时保留原始值，不会重新生成。
#[derive(Debug, Clone)]
pub struct RequestIdSource {
    accept_external_headers: bool,
    header_name: String,
}

impl RequestIdSource {
    pub fn new(accept_external_headers: bool, header_name: impl Into<String>) -> Self {
        Self {
            accept_external_headers,
            header_name: header_name.into(),
        }
    }
}

impl Default for RequestIdSource {
    /// 使用默认请求头 `X-Request-Id`，并接收外部头部
    fn default() -> Self {
        Self::new(true, REQUEST_ID_HEADER)
    }
}

impl TracingSource for RequestIdSource {
    fn resolve(&self, request: &dyn TracingRequest) -> String {
        external_value(request, &self.header_name, self.accept_external_headers)
            .unwrap_or_else(generate)
    }

    fn header_name(&self) -> &str {
        &self.header_name
    }
}
