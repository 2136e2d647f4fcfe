//! 追踪来源
//!
//! 每个来源负责三件事：从入站请求解析出追踪值、提供对应的 HTTP 头部名称、
//! 以及从任务载荷中恢复追踪值。内置来源有两个：
//! - [`CorrelationIdSource`]：会话粘性，外部头部 → 会话值 → 新生成
//! - [`RequestIdSource`]：每次请求唯一，外部头部 → 新生成
//!
//! 自定义来源实现 [`TracingSource`] 后，通过配置工厂表或
//! [`TracingManager::extend`](crate::TracingManager::extend) 注册。

mod correlation_id;
mod request;
mod request_id;

pub use correlation_id::CorrelationIdSource;
pub use request::TracingRequest;
pub use request_id::RequestIdSource;

use crate::sanitizer::sanitize;

/// 关联ID的默认请求头
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";
/// 请求ID的默认请求头
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// 追踪来源接口
pub trait TracingSource: Send + Sync {
    /// 从入站请求解析追踪值
    ///
    /// 永远不会失败：新生成的值是最后的兜底。
    fn resolve(&self, request: &dyn TracingRequest) -> String;

    /// 该来源读写的 HTTP 头部名称
    fn header_name(&self) -> &str;

    /// 从任务载荷中恢复追踪值，默认原样返回
    fn restore_from_job(&self, value: &str) -> String {
        value.to_string()
    }
}

/// 读取并清洗外部请求头，未开启外部头部接收时直接返回 `None`
fn external_value(
    request: &dyn TracingRequest,
    header_name: &str,
    accept_external_headers: bool,
) -> Option<String> {
    if !accept_external_headers {
        return None;
    }
    sanitize(request.header(header_name))
}
