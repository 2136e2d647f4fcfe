//! Axum框架的追踪中间件

use crate::manager::TracingManager;
use crate::registry::TracingRegistry;
use crate::storage::SessionHandle;
use crate::tracings::Tracings;
use crate::{context, propagation};
use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    response::Response,
};
use std::convert::Infallible;
use std::future::Future;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::Instrument;

/// 追踪中间件配置选项
#[derive(Clone, Debug)]
pub struct TracingLayerConfig {
    /// 是否启用 tracing span（默认启用）
    pub enable_span: bool,
    /// 是否启用响应头（默认启用）
    pub enable_response_header: bool,
}

impl Default for TracingLayerConfig {
    fn default() -> Self {
        Self {
            enable_span: true,
            enable_response_header: true,
        }
    }
}

/// 入站追踪中间件层
///
/// 每个请求：
/// 1. 从注册表创建新的 [`TracingManager`]，解析所有已启用来源
/// 2. 把管理器放入请求扩展，并在处理期间设置为当前任务的管理器
/// 3. 处理完成后把追踪值写入响应头
///
/// 上游的会话中间件可以把 [`SessionHandle`] 放入请求扩展，
/// 会话粘性的来源会通过它读写会话。
#[derive(Clone)]
pub struct TracingLayer {
    registry: Arc<TracingRegistry>,
    config: TracingLayerConfig,
}

impl TracingLayer {
    /// 使用默认配置创建追踪层
    pub fn new(registry: Arc<TracingRegistry>) -> Self {
        Self::with_config(registry, TracingLayerConfig::default())
    }

    /// 创建高性能模式的追踪层
    ///
    /// 禁用 tracing span 以获得最佳性能
    pub fn new_high_performance(registry: Arc<TracingRegistry>) -> Self {
        Self::with_config(
            registry,
            TracingLayerConfig {
                enable_span: false,
                enable_response_header: true,
            },
        )
    }

    /// 使用自定义配置创建追踪层
    pub fn with_config(registry: Arc<TracingRegistry>, config: TracingLayerConfig) -> Self {
        Self { registry, config }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}

/// 入站追踪服务
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
    registry: Arc<TracingRegistry>,
    config: TracingLayerConfig,
}

impl<S> Service<Request> for TracingService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future =
        std::pin::Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // 全局关闭：直接透传，不做任何追踪逻辑
        if !self.registry.is_enabled() {
            return Box::pin(self.inner.call(req));
        }

        let manager = Arc::new(self.registry.manager());
        let session = req.extensions().get::<SessionHandle>().cloned();

        match &session {
            Some(session) => context::with_session_sync(Arc::clone(session), || {
                manager.resolve_all(req.headers())
            }),
            None => manager.resolve_all(req.headers()),
        }

        // 提取请求信息用于span（在req被移动之前）
        let method = req.method().clone();
        let uri = req.uri().clone();

        req.extensions_mut().insert(Arc::clone(&manager));

        let future = self.inner.call(req);
        let config = self.config.clone();

        Box::pin(async move {
            let handle = async move {
                let mut response = scoped(Arc::clone(&manager), session, future).await?;

                if config.enable_response_header {
                    propagation::apply_to_response(&manager, response.headers_mut());
                }

                Ok(response)
            };

            // 根据配置决定是否创建 span
            if config.enable_span {
                let span = tracing::info_span!(
                    "request",
                    correlation_id = tracing::field::Empty,
                    request_id = tracing::field::Empty,
                    method = %method,
                    uri = %uri
                );
                handle.instrument(span).await
            } else {
                handle.await
            }
        })
    }
}

/// 在管理器（以及可选的会话）上下文中执行请求处理
async fn scoped<F>(
    manager: Arc<TracingManager>,
    session: Option<SessionHandle>,
    future: F,
) -> F::Output
where
    F: Future,
{
    let span = tracing::Span::current();
    if let Some(id) = manager.correlation_id() {
        span.record("correlation_id", id.as_str());
    }
    if let Some(id) = manager.request_id() {
        span.record("request_id", id.as_str());
    }

    match session {
        Some(session) => context::with_session(session, context::with_manager(manager, future)).await,
        None => context::with_manager(manager, future).await,
    }
}

// -- Tracings Extractor --

/// Axum 提取器，用于在 handler 函数签名中直接获取当前请求的追踪值
///
/// # 示例
/// ```no_run
/// use axum::{routing::get, Router};
/// use request_tracing::{Tracings, TracingLayer, TracingRegistry};
/// use std::sync::Arc;
///
/// async fn my_handler(tracings: Tracings) -> String {
///     tracing::info!(correlation_id = ?tracings.correlation_id(), "Handler started");
///     format!("Your request ID is: {:?}", tracings.request_id())
/// }
///
/// let registry = Arc::new(TracingRegistry::default());
/// let app: Router = Router::new()
///     .route("/", get(my_handler))
///     .layer(TracingLayer::new(registry));
/// ```
impl<S> FromRequestParts<S> for Tracings
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    /// 优先读取请求扩展中的管理器，其次读取任务上下文；都不存在时返回空快照，
    /// 因此这个提取器永远不会失败。
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match parts.extensions.get::<Arc<TracingManager>>() {
            Some(manager) => Tracings::from_manager(manager),
            None => context::tracings(),
        })
    }
}
