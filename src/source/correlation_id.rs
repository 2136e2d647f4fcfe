//! 关联ID来源

use super::{external_value, TracingRequest, TracingSource, CORRELATION_ID_HEADER};
use crate::generator::generate;
use crate::storage::{SessionStorage, TracingStorage};

/// 会话粘性的关联ID来源
///
/// 解析优先级：
/// 1. 外部请求头（开启外部头部接收且通过清洗时）
/// 2. 会话中保存的值（同一会话的上一次请求）
/// 3. 新生成的 UUID
///
/// 解析出的值总会写回会话，外部传入的关联ID会覆盖会话中已有的值。
#[derive(Debug, Clone)]
pub struct CorrelationIdSource {
    session: SessionStorage,
    accept_external_headers: bool,
    header_name: String,
}

impl CorrelationIdSource {
    /// 会话中保存关联ID使用的键
    pub const SESSION_KEY: &'static str = "correlation_id";

    pub fn new(
        session: SessionStorage,
        accept_external_headers: bool,
        header_name: impl Into<String>,
    ) -> Self {
        Self {
            session,
            accept_external_headers,
            header_name: header_name.into(),
        }
    }

    /// 使用默认请求头 `X-Correlation-Id`，并接收外部头部
    pub fn with_session(session: SessionStorage) -> Self {
        Self::new(session, true, CORRELATION_ID_HEADER)
    }
}

impl TracingSource for CorrelationIdSource {
    fn resolve(&self, request: &dyn TracingRequest) -> String {
        let value = external_value(request, &self.header_name, self.accept_external_headers)
            .or_else(|| self.session.get(Self::SESSION_KEY))
            .unwrap_or_else(generate);

        self.session.set(Self::SESSION_KEY, value.clone());
        value
    }

    fn header_name(&self) -> &str {
        &self.header_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::is_uuid_v4;
    use crate::storage::{MemorySession, Session};
    use http::{HeaderMap, HeaderValue};
    use std::sync::Arc;

    fn source_with_session() -> (Arc<MemorySession>, CorrelationIdSource) {
        let session = Arc::new(MemorySession::started());
        let source = CorrelationIdSource::with_session(SessionStorage::bound(session.clone()));
        (session, source)
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_generates_and_persists() {
        let (session, source) = source_with_session();

        let first = source.resolve(&HeaderMap::new());
        assert!(is_uuid_v4(&first));
        assert_eq!(session.get("tracings.correlation_id"), Some(first.clone()));

        // 同一会话再次解析返回同一个值
        let second = source.resolve(&HeaderMap::new());
        assert_eq!(first, second);
    }

    #[test]
    fn test_external_header_overwrites_session() {
        let (session, source) = source_with_session();
        session.put("tracings.correlation_id", "previous-value".to_string());

        let resolved = source.resolve(&headers_with("upstream-123"));

        assert_eq!(resolved, "upstream-123");
        assert_eq!(
            session.get("tracings.correlation_id").as_deref(),
            Some("upstream-123"),
            "外部传入的关联ID应覆盖会话中的值"
        );
    }

    #[test]
    fn test_invalid_header_falls_back_to_session() {
        let (session, source) = source_with_session();
        session.put("tracings.correlation_id", "session-value".to_string());

        let resolved = source.resolve(&headers_with("bad value;with spaces"));

        assert_eq!(resolved, "session-value");
    }

    #[test]
    fn test_invalid_header_falls_back_to_generation() {
        let (_session, source) = source_with_session();
        let raw = "a".repeat(256);

        let resolved = source.resolve(&headers_with(&raw));

        assert_ne!(resolved, raw);
        assert!(is_uuid_v4(&resolved));
    }

    #[test]
    fn test_external_headers_disabled() {
        let session = Arc::new(MemorySession::started());
        let source = CorrelationIdSource::new(
            SessionStorage::bound(session.clone()),
            false,
            "X-Correlation-Id",
        );

        let resolved = source.resolve(&headers_with("upstream-123"));

        assert_ne!(resolved, "upstream-123");
        assert!(is_uuid_v4(&resolved));
    }

    #[test]
    fn test_custom_header_name() {
        let session = Arc::new(MemorySession::started());
        let source = CorrelationIdSource::new(SessionStorage::bound(session), true, "X-Trace-Group");

        let mut headers = HeaderMap::new();
        headers.insert("x-trace-group", HeaderValue::from_static("group-7"));

        assert_eq!(source.header_name(), "X-Trace-Group");
        assert_eq!(source.resolve(&headers), "group-7");
    }

    #[test]
    fn test_without_active_session() {
        let session = Arc::new(MemorySession::new());
        let source = CorrelationIdSource::with_session(SessionStorage::bound(session.clone()));

        let first = source.resolve(&HeaderMap::new());
        let second = source.resolve(&HeaderMap::new());

        // 会话未启动时无法保持粘性，但解析本身不会失败
        assert!(is_uuid_v4(&first));
        assert!(is_uuid_v4(&second));
        assert_ne!(first, second);
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn test_restore_from_job_is_identity() {
        let (_session, source) = source_with_session();
        assert_eq!(source.restore_from_job("abc-123"), "abc-123");
    }
}
