//! 追踪值的传播
//!
//! - 响应：处理完成后把追踪值写入响应头
//! - 出站调用：发起 HTTP 调用前把追踪值写入请求头
//! - 任务：入队时写入任务载荷，执行前从载荷恢复（见 [`job`]）

pub mod job;

use crate::manager::TracingManager;
use http::{HeaderMap, HeaderName, HeaderValue};

/// 收集所有已启用、已解析的追踪值，按来源配置的头部名称组成头部集合
///
/// 无法转换为合法 HTTP 头部的名称或值会记录警告后跳过。
pub fn tracing_headers(manager: &TracingManager) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (key, value) in manager.all() {
        let Some(value) = value else {
            continue;
        };
        let Some(source) = manager.source(&key) else {
            continue;
        };

        let name = match HeaderName::from_bytes(source.header_name().as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(key = %key, header = source.header_name(), "invalid tracing header name");
                continue;
            }
        };
        let value = match HeaderValue::from_str(&value) {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key = %key, "tracing value is not a valid header value");
                continue;
            }
        };

        headers.insert(name, value);
    }

    headers
}

/// 把追踪头部写入目标头部集合，已有的同名头部会被覆盖
///
/// 全局关闭时不做任何修改。重复调用是幂等的。
pub fn inject_headers(manager: &TracingManager, target: &mut HeaderMap) {
    if !manager.is_enabled() {
        return;
    }

    for (name, value) in tracing_headers(manager) {
        if let Some(name) = name {
            target.insert(name, value);
        }
    }
}

/// 把追踪头部写入出站响应
pub fn apply_to_response(manager: &TracingManager, response_headers: &mut HeaderMap) {
    inject_headers(manager, response_headers);
}

/// 把当前任务上下文中的追踪头部写入出站请求
///
/// 不在追踪上下文中时不做任何修改，返回 `false`。
pub fn inject_current(target: &mut HeaderMap) -> bool {
    match crate::context::current_manager() {
        Some(manager) => {
            inject_headers(&manager, target);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{RequestIdSource, TracingRequest, TracingSource};
    use std::sync::Arc;

    struct FixedSource {
        header: &'static str,
        value: &'static str,
    }

    impl TracingSource for FixedSource {
        fn resolve(&self, _request: &dyn TracingRequest) -> String {
            self.value.to_string()
        }

        fn header_name(&self) -> &str {
            self.header
        }
    }

    fn fixed(header: &'static str, value: &'static str) -> Arc<dyn TracingSource> {
        Arc::new(FixedSource { header, value })
    }

    #[test]
    fn test_tracing_headers() {
        let manager = TracingManager::in_memory();
        manager
            .extend("correlation_id", fixed("X-Correlation-Id", "corr-1"))
            .extend("request_id", fixed("X-Request-Id", "req-1"));
        manager.resolve_all(&HeaderMap::new());

        let headers = tracing_headers(&manager);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("x-correlation-id").unwrap(), "corr-1");
        assert_eq!(headers.get("x-request-id").unwrap(), "req-1");
    }

    #[test]
    fn test_unresolved_values_are_skipped() {
        let manager = TracingManager::in_memory();
        manager.extend("request_id", Arc::new(RequestIdSource::default()));

        assert!(tracing_headers(&manager).is_empty());
    }

    #[test]
    fn test_disabled_source_is_not_propagated() {
        let manager = TracingManager::in_memory().with_source_enabled("secret", false);
        manager
            .extend("request_id", fixed("X-Request-Id", "req-1"))
            .extend("secret", fixed("X-Secret", "do-not-leak"));
        manager.resolve_all(&HeaderMap::new());
        manager.restore([("secret".to_string(), "do-not-leak".to_string())]);

        let headers = tracing_headers(&manager);
        assert!(headers.get("x-secret").is_none());
        assert_eq!(headers.get("x-request-id").unwrap(), "req-1");
    }

    #[test]
    fn test_invalid_header_name_is_skipped() {
        let manager = TracingManager::in_memory();
        manager
            .extend("broken", fixed("Bad Header", "value"))
            .extend("request_id", fixed("X-Request-Id", "req-1"));
        manager.resolve_all(&HeaderMap::new());

        let headers = tracing_headers(&manager);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-request-id").unwrap(), "req-1");
    }

    #[test]
    fn test_inject_overwrites_and_is_idempotent() {
        let manager = TracingManager::in_memory();
        manager.extend("request_id", fixed("X-Request-Id", "req-1"));
        manager.resolve_all(&HeaderMap::new());

        let mut target = HeaderMap::new();
        target.insert("x-request-id", HeaderValue::from_static("stale"));
        target.insert("content-type", HeaderValue::from_static("application/json"));

        inject_headers(&manager, &mut target);
        inject_headers(&manager, &mut target);

        assert_eq!(target.get_all("x-request-id").iter().count(), 1);
        assert_eq!(target.get("x-request-id").unwrap(), "req-1");
        assert_eq!(target.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_inject_when_globally_disabled() {
        let manager = TracingManager::new(Box::new(crate::storage::RequestStorage::new()), false);
        manager.extend("request_id", fixed("X-Request-Id", "req-1"));
        // 全局关闭时 restore 也是空操作，这里直接确认不会写入任何头部
        let mut target = HeaderMap::new();
        apply_to_response(&manager, &mut target);
        assert!(target.is_empty());
    }

    #[tokio::test]
    async fn test_inject_current() {
        let mut target = HeaderMap::new();
        assert!(!inject_current(&mut target));
        assert!(target.is_empty());

        let manager = Arc::new(TracingManager::in_memory());
        manager.extend("request_id", fixed("X-Request-Id", "req-ctx"));
        manager.resolve_all(&HeaderMap::new());

        crate::context::with_manager(manager, async {
            assert!(inject_current(&mut target));
        })
        .await;
        assert_eq!(target.get("x-request-id").unwrap(), "req-ctx");
    }
}
