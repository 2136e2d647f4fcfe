//! 追踪上下文管理
//!
//! 使用 `tokio::task_local` 提供与Web框架无关的上下文管理：
//! - 当前工作单元（请求或任务执行）的 [`TracingManager`]
//! - 当前执行上下文的会话（供 [`SessionStorage`](crate::SessionStorage) 查找）

use crate::manager::TracingManager;
use crate::storage::SessionHandle;
use crate::tracings::Tracings;
use std::future::Future;
use std::sync::Arc;
use tokio::task_local;

// 使用tokio的task_local来存储当前工作单元的管理器和会话
task_local! {
    static CURRENT_MANAGER: Arc<TracingManager>;
    static CURRENT_SESSION: SessionHandle;
}

/// 获取当前工作单元的追踪管理器
///
/// 不在追踪上下文中时返回 `None`。
pub fn current_manager() -> Option<Arc<TracingManager>> {
    CURRENT_MANAGER.try_with(Arc::clone).ok()
}

/// 获取当前工作单元的追踪值快照
///
/// 如果当前不在追踪上下文中，记录一条调试日志并返回空快照。
pub fn tracings() -> Tracings {
    match current_manager() {
        Some(manager) => Tracings::from_manager(&manager),
        None => {
            tracing::debug!("TracingManager not found in task-local context. Returning empty tracings.");
            Tracings::default()
        }
    }
}

/// 在指定的追踪管理器上下文中执行异步操作
///
/// # 参数
/// * `manager` - 当前工作单元的管理器
/// * `future` - 要执行的异步操作
///
/// # 返回
/// 异步操作的结果
pub async fn with_manager<F, T>(manager: Arc<TracingManager>, future: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_MANAGER.scope(manager, future).await
}

/// 获取当前执行上下文的会话
pub fn current_session() -> Option<SessionHandle> {
    CURRENT_SESSION.try_with(Arc::clone).ok()
}

/// 在指定的会话上下文中执行异步操作
///
/// 宿主的会话中间件在启动会话后调用，之后的 [`SessionStorage`](crate::SessionStorage)
/// 读写都会落到这个会话上。
pub async fn with_session<F, T>(session: SessionHandle, future: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_SESSION.scope(session, future).await
}

/// [`with_session`] 的同步版本
pub fn with_session_sync<F, T>(session: SessionHandle, f: F) -> T
where
    F: FnOnce() -> T,
{
    CURRENT_SESSION.sync_scope(session, f)
}
