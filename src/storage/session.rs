//! 会话级存储
//!
//! 值保存在外部会话机制中，统一放在 [`NAMESPACE`] 命名空间下，避免与应用自身的
//! 会话键冲突。
//!
//! 会话尚未激活时（例如宿主框架的会话中间件还没有运行），所有操作都会退化为
//! 空操作：`set` 丢弃写入，`get` 返回 `None`，`has` 返回 `false`。
//! 本存储从不主动启动会话，会话的启动顺序（Cookie、CSRF、驱动连接）由宿主负责。

use super::TracingStorage;
use crate::context;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// 会话键的命名空间前缀
pub const NAMESPACE: &str = "tracings";

/// 宿主框架提供的会话接口
///
/// 键为完整的带命名空间的键（例如 `tracings.correlation_id`）。
pub trait Session: Send + Sync {
    /// 当前执行上下文中会话是否已经启动
    fn is_started(&self) -> bool;

    /// 读取会话值
    fn get(&self, key: &str) -> Option<String>;

    /// 写入会话值
    fn put(&self, key: &str, value: String);

    /// 判断会话中是否存在该键
    fn has(&self, key: &str) -> bool;

    /// 删除该键，以及所有以 `key.` 开头的嵌套键
    fn forget(&self, key: &str);
}

/// 共享的会话句柄
pub type SessionHandle = Arc<dyn Session>;

/// 会话级追踪存储
///
/// 会话的查找顺序：
/// 1. 通过 [`SessionStorage::bound`] 显式绑定的会话
/// 2. 当前任务通过 [`context::with_session`] 设置的会话
///
/// 克隆开销很小，同一进程内所有会话粘性的来源共享同一个实例。
#[derive(Clone, Default)]
pub struct SessionStorage {
    bound: Option<SessionHandle>,
}

impl SessionStorage {
    /// 创建从当前任务上下文中查找会话的存储
    pub fn new() -> Self {
        Self { bound: None }
    }

    /// 创建固定绑定到某个会话的存储
    pub fn bound(session: SessionHandle) -> Self {
        Self {
            bound: Some(session),
        }
    }

    /// 当前是否有可用（已启动）的会话
    pub fn is_available(&self) -> bool {
        self.active_session().is_some()
    }

    fn active_session(&self) -> Option<SessionHandle> {
        let session = match &self.bound {
            Some(session) => Some(Arc::clone(session)),
            None => context::current_session(),
        };
        session.filter(|s| s.is_started())
    }

    fn namespaced(key: &str) -> String {
        format!("{NAMESPACE}.{key}")
    }
}

impl fmt::Debug for SessionStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStorage")
            .field("bound", &self.bound.is_some())
            .finish()
    }
}

impl TracingStorage for SessionStorage {
    fn set(&self, key: &str, value: String) {
        match self.active_session() {
            Some(session) => session.put(&Self::namespaced(key), value),
            None => tracing::debug!(key, "session not started, tracing value not persisted"),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.active_session()?.get(&Self::namespaced(key))
    }

    fn has(&self, key: &str) -> bool {
        self.active_session()
            .is_some_and(|session| session.has(&Self::namespaced(key)))
    }

    fn flush(&self) {
        if let Some(session) = self.active_session() {
            session.forget(NAMESPACE);
        }
    }
}

/// 进程内的内存会话实现
///
/// 适用于测试、示例以及单进程部署。新建时处于未启动状态，
/// 需要调用 [`MemorySession::start`] 后才会接受读写。
#[derive(Debug, Default)]
pub struct MemorySession {
    started: AtomicBool,
    values: Mutex<HashMap<String, String>>,
}

impl MemorySession {
    /// 创建未启动的会话
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建已启动的会话
    pub fn started() -> Self {
        let session = Self::new();
        session.start();
        session
    }

    /// 启动会话
    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// 会话中所有键值的快照，包括命名空间之外的应用键
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Session for MemorySession {
    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) {
        self.lock().insert(key.to_string(), value);
    }

    fn has(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn forget(&self, key: &str) {
        let nested = format!("{key}.");
        self.lock()
            .retain(|k, _| k != key && !k.starts_with(&nested));
    }
}
