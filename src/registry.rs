//! 追踪来源注册表
//!
//! 应用启动时根据 [`TracingConfig`] 和显式的工厂表 [`SourceFactories`] 构建一次，
//! 之后通过 `Arc` 共享给中间件和任务执行器。每个工作单元调用
//! [`TracingRegistry::manager`] 获得一个带独立请求级存储的 [`TracingManager`]。

use crate::config::{SourceConfig, TracingConfig};
use crate::error::{Result, TracingError};
use crate::manager::{TracingManager, CORRELATION_ID, REQUEST_ID};
use crate::source::{CorrelationIdSource, RequestIdSource, TracingSource};
use crate::storage::{RequestStorage, SessionStorage};
use http::HeaderName;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// 构造来源时可用的上下文
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// 追踪键
    pub key: String,
    /// 配置的 HTTP 头部名称
    pub header_name: String,
    /// 是否接收外部头部
    pub accept_external_headers: bool,
    /// 进程内共享的会话级存储
    pub session: SessionStorage,
}

/// 来源工厂函数
pub type SourceFactory = Arc<dyn Fn(&SourceContext) -> Arc<dyn TracingSource> + Send + Sync>;

/// 来源名称到工厂函数的映射
///
/// 默认包含内置的 `correlation_id` 和 `request_id`。
#[derive(Clone)]
pub struct SourceFactories {
    factories: HashMap<String, SourceFactory>,
}

impl SourceFactories {
    /// 不含任何工厂的空表
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// 注册一个工厂
    ///
    /// # 示例
    /// ```
    /// use request_tracing::{RequestIdSource, SourceFactories};
    /// use std::sync::Arc;
    ///
    /// let factories = SourceFactories::default().register("tenant_id", |ctx| {
    ///     Arc::new(RequestIdSource::new(ctx.accept_external_headers, ctx.header_name.clone()))
    /// });
    /// assert!(factories.contains("tenant_id"));
    /// ```
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&SourceContext) -> Arc<dyn TracingSource> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<&SourceFactory> {
        self.factories.get(name)
    }
}

impl Default for SourceFactories {
    fn default() -> Self {
        Self::empty()
            .register(CORRELATION_ID, |ctx| {
                Arc::new(CorrelationIdSource::new(
                    ctx.session.clone(),
                    ctx.accept_external_headers,
                    ctx.header_name.clone(),
                ))
            })
            .register(REQUEST_ID, |ctx| {
                Arc::new(RequestIdSource::new(
                    ctx.accept_external_headers,
                    ctx.header_name.clone(),
                ))
            })
    }
}

impl fmt::Debug for SourceFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("SourceFactories").field("names", &names).finish()
    }
}

/// 注册表构建器
#[derive(Debug)]
pub struct RegistryBuilder {
    config: TracingConfig,
    factories: SourceFactories,
    session: SessionStorage,
}

impl RegistryBuilder {
    /// 使用自定义工厂表
    pub fn factories(mut self, factories: SourceFactories) -> Self {
        self.factories = factories;
        self
    }

    /// 使用指定的会话级存储，默认从当前任务上下文查找会话
    pub fn session(mut self, session: SessionStorage) -> Self {
        self.session = session;
        self
    }

    /// 构建注册表
    ///
    /// 无法构造的来源记录警告后跳过，其余来源照常注册。
    pub fn build(self) -> TracingRegistry {
        let (registry, errors) = self.build_inner();
        for err in errors {
            tracing::warn!(error = %err, "skipping tracing source");
        }
        registry
    }

    /// 构建注册表，存在无法构造的来源时返回第一个错误
    pub fn try_build(self) -> Result<TracingRegistry> {
        let (registry, errors) = self.build_inner();
        match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(registry),
        }
    }

    fn build_inner(self) -> (TracingRegistry, Vec<TracingError>) {
        let config = self.config;
        let mut sources = IndexMap::new();
        let mut enabled_map = HashMap::new();
        let mut errors = Vec::new();

        for (key, entry) in &config.tracings {
            enabled_map.insert(key.clone(), entry.enabled);
            if !entry.enabled {
                continue;
            }

            match instantiate(key, entry, &config, &self.factories, &self.session) {
                Ok(source) => {
                    sources.insert(key.clone(), source);
                }
                Err(err) => errors.push(err),
            }
        }

        tracing::debug!(
            enabled = config.enabled,
            sources = ?sources.keys().collect::<Vec<_>>(),
            "tracing registry built"
        );

        let registry = TracingRegistry {
            sources: RwLock::new(sources),
            enabled_map,
            enabled: config.enabled,
            http_client_enabled: config.http_client.enabled,
            session: self.session,
        };
        (registry, errors)
    }
}

fn instantiate(
    key: &str,
    entry: &SourceConfig,
    config: &TracingConfig,
    factories: &SourceFactories,
    session: &SessionStorage,
) -> Result<Arc<dyn TracingSource>> {
    let source_name = entry
        .source
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| TracingError::MissingSource {
            key: key.to_string(),
        })?;

    let factory = factories
        .get(source_name)
        .ok_or_else(|| TracingError::UnknownSource {
            key: key.to_string(),
            source_name: source_name.to_string(),
        })?;

    if HeaderName::from_bytes(entry.header.as_bytes()).is_err() {
        return Err(TracingError::InvalidHeader {
            key: key.to_string(),
            header: entry.header.clone(),
        });
    }

    let ctx = SourceContext {
        key: key.to_string(),
        header_name: entry.header.clone(),
        accept_external_headers: config.accept_external_headers,
        session: session.clone(),
    };
    Ok(factory(&ctx))
}

/// 追踪来源注册表
pub struct TracingRegistry {
    sources: RwLock<IndexMap<String, Arc<dyn TracingSource>>>,
    enabled_map: HashMap<String, bool>,
    enabled: bool,
    http_client_enabled: bool,
    session: SessionStorage,
}

impl TracingRegistry {
    /// 创建构建器
    pub fn builder(config: TracingConfig) -> RegistryBuilder {
        RegistryBuilder {
            config,
            factories: SourceFactories::default(),
            session: SessionStorage::new(),
        }
    }

    /// 使用默认工厂表从配置构建，无法构造的来源会被跳过
    pub fn from_config(config: TracingConfig) -> Self {
        Self::builder(config).build()
    }

    /// 使用默认工厂表从配置构建，存在无法构造的来源时返回第一个错误
    pub fn try_from_config(config: TracingConfig) -> Result<Self> {
        Self::builder(config).try_build()
    }

    /// 为一个工作单元创建新的管理器
    ///
    /// 管理器共享注册表中的来源，但拥有独立的请求级存储。
    pub fn manager(&self) -> TracingManager {
        let sources = self
            .sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        TracingManager::from_parts(
            sources,
            Box::new(RequestStorage::new()),
            self.enabled,
            self.enabled_map.clone(),
        )
    }

    /// 为之后创建的所有管理器注册或覆盖来源
    pub fn extend(&self, key: impl Into<String>, source: Arc<dyn TracingSource>) -> &Self {
        self.sources
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.into(), source);
        self
    }

    /// 已注册的所有 key
    pub fn keys(&self) -> Vec<String> {
        self.sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// 全局是否启用
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 是否为所有出站调用自动附加追踪头部
    pub fn http_client_enabled(&self) -> bool {
        self.http_client_enabled
    }

    /// 注册表共享的会话级存储
    pub fn session_storage(&self) -> &SessionStorage {
        &self.session
    }
}

impl Default for TracingRegistry {
    fn default() -> Self {
        Self::from_config(TracingConfig::default())
    }
}

impl fmt::Debug for TracingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingRegistry")
            .field("keys", &self.keys())
            .field("enabled_map", &self.enabled_map)
            .field("enabled", &self.enabled)
            .field("http_client_enabled", &self.http_client_enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TracingRequest;
    use crate::storage::MemorySession;
    use http::HeaderMap;

    struct StaticSource(&'static str);

    impl TracingSource for StaticSource {
        fn resolve(&self, _request: &dyn TracingRequest) -> String {
            self.0.to_string()
        }

        fn header_name(&self) -> &str {
            "X-Static"
        }
    }

    #[test]
    fn test_default_registry() {
        let registry = TracingRegistry::default();
        assert!(registry.is_enabled());
        assert!(!registry.http_client_enabled());
        assert_eq!(registry.keys(), vec!["correlation_id", "request_id"]);

        let manager = registry.manager();
        assert_eq!(
            manager.source("correlation_id").unwrap().header_name(),
            "X-Correlation-Id"
        );
        assert_eq!(manager.source("request_id").unwrap().header_name(), "X-Request-Id");
    }

    #[test]
    fn test_managers_have_isolated_storage() {
        let registry = TracingRegistry::default();
        let first = registry.manager();
        let second = registry.manager();

        first.resolve_all(&HeaderMap::new());

        assert!(first.request_id().is_some());
        assert_eq!(second.request_id(), None);
    }

    #[test]
    fn test_disabled_entry_is_not_instantiated() {
        let config = TracingConfig::default().with_tracing(
            "correlation_id",
            SourceConfig::new("X-Correlation-Id", "correlation_id").disabled(),
        );
        let registry = TracingRegistry::from_config(config);

        assert_eq!(registry.keys(), vec!["request_id"]);
        let manager = registry.manager();
        assert!(!manager.is_source_enabled("correlation_id"));
        assert!(manager.is_source_enabled("request_id"));
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let config = TracingConfig::default()
            .with_tracing("unknown", SourceConfig::new("X-Unknown", "no_such_source"))
            .with_tracing(
                "missing",
                SourceConfig {
                    enabled: true,
                    header: "X-Missing".to_string(),
                    source: None,
                },
            )
            .with_tracing("bad_header", SourceConfig::new("Bad Header", "request_id"));

        let registry = TracingRegistry::from_config(config);
        assert_eq!(registry.keys(), vec!["correlation_id", "request_id"]);
    }

    #[test]
    fn test_try_build_reports_first_error() {
        let config = TracingConfig::default()
            .with_tracing("unknown", SourceConfig::new("X-Unknown", "no_such_source"));

        let err = TracingRegistry::builder(config).try_build().unwrap_err();
        assert!(matches!(
            err,
            TracingError::UnknownSource { ref key, ref source_name }
                if key == "unknown" && source_name == "no_such_source"
        ));
    }

    #[test]
    fn test_custom_factory() {
        let config = TracingConfig::default()
            .with_tracing("static", SourceConfig::new("X-Static", "static"));
        let factories = SourceFactories::default().register("static", |_ctx| {
            Arc::new(StaticSource("fixed")) as Arc<dyn TracingSource>
        });

        let registry = TracingRegistry::builder(config)
            .factories(factories)
            .try_build()
            .unwrap();

        let manager = registry.manager();
        manager.resolve_all(&HeaderMap::new());
        assert_eq!(manager.get("static").as_deref(), Some("fixed"));
    }

    #[test]
    fn test_registry_extend_applies_to_new_managers() {
        let registry = TracingRegistry::default();
        let before = registry.manager();

        registry.extend("static", Arc::new(StaticSource("fixed")));

        assert!(before.source("static").is_none(), "已创建的管理器不受影响");
        let after = registry.manager();
        after.resolve_all(&HeaderMap::new());
        assert_eq!(after.get("static").as_deref(), Some("fixed"));
    }

    #[test]
    fn test_shared_session_storage() {
        let session = Arc::new(MemorySession::started());
        let registry = TracingRegistry::builder(TracingConfig::default())
            .session(SessionStorage::bound(session))
            .build();

        let first = registry.manager();
        first.resolve_all(&HeaderMap::new());
        let second = registry.manager();
        second.resolve_all(&HeaderMap::new());

        assert_eq!(first.correlation_id(), second.correlation_id());
        assert_ne!(first.request_id(), second.request_id());
        assert!(registry.session_storage().is_available());
    }
}
