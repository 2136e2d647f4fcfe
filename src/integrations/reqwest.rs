//! reqwest 出站调用集成
//!
//! 两种用法：
//! - 逐个请求显式附加：[`RequestBuilderExt::with_tracing`]
//! - 配置 `http_client.enabled = true` 后用 [`TracingClient`] 自动附加

use crate::context;
use crate::manager::TracingManager;
use crate::propagation;
use crate::registry::TracingRegistry;
use reqwest::{Client, IntoUrl, Method, RequestBuilder};

/// 为 [`RequestBuilder`] 添加追踪头部
pub trait RequestBuilderExt {
    /// 附加当前任务上下文中的追踪头部，不在上下文中时原样返回
    fn with_tracing(self) -> Self;

    /// 附加给定管理器的追踪头部
    fn with_tracings_from(self, manager: &TracingManager) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn with_tracing(self) -> Self {
        match context::current_manager() {
            Some(manager) => self.with_tracings_from(&manager),
            None => self,
        }
    }

    fn with_tracings_from(self, manager: &TracingManager) -> Self {
        if !manager.is_enabled() {
            return self;
        }
        // headers() 会替换同名头部，重复附加不会产生重复值
        self.headers(propagation::tracing_headers(manager))
    }
}

/// 自动附加追踪头部的 reqwest 客户端包装
#[derive(Clone, Debug)]
pub struct TracingClient {
    inner: Client,
    auto_attach: bool,
}

impl TracingClient {
    pub fn new(inner: Client, auto_attach: bool) -> Self {
        Self { inner, auto_attach }
    }

    /// 按注册表的 `http_client.enabled` 决定是否自动附加
    pub fn from_registry(inner: Client, registry: &TracingRegistry) -> Self {
        Self::new(inner, registry.http_client_enabled())
    }

    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        let builder = self.inner.request(method, url);
        if self.auto_attach {
            builder.with_tracing()
        } else {
            builder
        }
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn delete<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn auto_attach(&self) -> bool {
        self.auto_attach
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }
}
