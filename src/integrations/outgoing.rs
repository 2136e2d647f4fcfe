//! 出站 HTTP 调用的 tower 中间件
//!
//! 包装任意接收 `http::Request<B>` 的客户端服务（例如 hyper 客户端），
//! 在调用前写入追踪头部。

use crate::manager::TracingManager;
use crate::propagation;
use http::Request;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// 出站追踪中间件层
///
/// 默认在每次调用时读取当前任务上下文中的管理器；
/// 不在追踪上下文中时请求原样发出。
#[derive(Clone, Debug, Default)]
pub struct OutgoingTracingLayer {
    manager: Option<Arc<TracingManager>>,
}

impl OutgoingTracingLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定使用给定的管理器，而不是任务上下文
    pub fn with_manager(manager: Arc<TracingManager>) -> Self {
        Self {
            manager: Some(manager),
        }
    }
}

impl<S> Layer<S> for OutgoingTracingLayer {
    type Service = OutgoingTracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OutgoingTracingService {
            inner,
            manager: self.manager.clone(),
        }
    }
}

/// 出站追踪服务
#[derive(Clone, Debug)]
pub struct OutgoingTracingService<S> {
    inner: S,
    manager: Option<Arc<TracingManager>>,
}

impl<S, B> Service<Request<B>> for OutgoingTracingService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        match &self.manager {
            Some(manager) => propagation::inject_headers(manager, req.headers_mut()),
            None => {
                if !propagation::inject_current(req.headers_mut()) {
                    tracing::trace!(uri = %req.uri(), "outgoing call outside tracing context");
                }
            }
        }
        self.inner.call(req)
    }
}
