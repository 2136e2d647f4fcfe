//! 请求追踪值的解析与传播
//!
//! 为每个请求解析一组命名的追踪值（关联ID、请求ID以及自定义来源），
//! 并把它们传播到响应头、出站 HTTP 调用和排队任务中。
//! 核心功能与Web框架无关，并为Axum提供了开箱即用的中间件支持。
//!
//! - 关联ID：跨同一会话的多个请求保持不变
//! - 请求ID：每个请求唯一
//!
//! ## Usage
//!
//! ### 基础用法：解析追踪值
//! ```
//! use http::HeaderMap;
//! use request_tracing::TracingRegistry;
//!
//! // 启动时构建一次注册表
//! let registry = TracingRegistry::default();
//!
//! // 每个请求创建一个管理器
//! let manager = registry.manager();
//! let mut headers = HeaderMap::new();
//! headers.insert("X-Request-Id", "abc-123".parse().unwrap());
//! manager.resolve_all(&headers);
//!
//! assert_eq!(manager.request_id().as_deref(), Some("abc-123"));
//! assert!(manager.correlation_id().is_some());
//! ```
//!
//! ### 从配置文件加载
//! ```
//! use request_tracing::{TracingConfig, TracingRegistry};
//!
//! let config = TracingConfig::from_toml_str(r#"
//!     accept_external_headers = false
//!
//!     [tracings.request_id]
//!     header = "X-Req"
//!     source = "request_id"
//! "#).unwrap();
//!
//! let registry = TracingRegistry::try_from_config(config).unwrap();
//! assert_eq!(registry.keys(), vec!["request_id".to_string()]);
//! ```
//!
//! ### Axum 集成（需要启用 axum feature）
//! ```ignore
//! use axum::{routing::get, Router};
//! use request_tracing::{Tracings, TracingLayer, TracingRegistry};
//! use std::sync::Arc;
//!
//! async fn handler(tracings: Tracings) -> String {
//!     // 直接在函数签名中获取追踪值
//!     format!("Hello! Your request ID is: {:?}", tracings.request_id())
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(TracingRegistry::default());
//!     let app = Router::new()
//!         .route("/", get(handler))
//!         .layer(TracingLayer::new(registry));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod context;
pub mod propagation;

mod config;
mod error;
mod generator;
mod manager;
mod registry;
mod sanitizer;
mod source;
mod storage;
mod tracings;

pub use config::{
    HttpClientConfig, SourceConfig, TracingConfig, ENV_ACCEPT_EXTERNAL_HEADERS,
    ENV_CORRELATION_ID_HEADER, ENV_ENABLED, ENV_HTTP_CLIENT_ENABLED, ENV_REQUEST_ID_HEADER,
};
pub use error::{Result, TracingError};
pub use generator::{generate, is_uuid_v4};
pub use manager::{TracingManager, CORRELATION_ID, REQUEST_ID};
pub use propagation::job;
pub use propagation::{apply_to_response, inject_current, inject_headers, tracing_headers};
pub use registry::{RegistryBuilder, SourceContext, SourceFactories, SourceFactory, TracingRegistry};
pub use sanitizer::{sanitize, MAX_LENGTH};
pub use source::{
    CorrelationIdSource, RequestIdSource, TracingRequest, TracingSource, CORRELATION_ID_HEADER,
    REQUEST_ID_HEADER,
};
pub use storage::{
    MemorySession, RequestStorage, Session, SessionHandle, SessionStorage, TracingStorage,
    NAMESPACE as SESSION_NAMESPACE,
};
pub use tracings::Tracings;

// -- framework features --
#[cfg(any(feature = "tower", feature = "reqwest"))]
mod integrations;

#[cfg(feature = "axum")]
pub use integrations::axum::{TracingLayer, TracingLayerConfig, TracingService};
#[cfg(feature = "tower")]
pub use integrations::outgoing::{OutgoingTracingLayer, OutgoingTracingService};
#[cfg(feature = "reqwest")]
pub use integrations::reqwest::{RequestBuilderExt, TracingClient};
