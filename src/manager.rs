//! 追踪管理器
//!
//! 协调者：持有已注册的来源、启用矩阵以及请求级存储，负责解析、读取、
//! 运行时扩展和任务恢复。每个工作单元（入站请求或任务执行）一个实例，
//! 通常由 [`TracingRegistry::manager`](crate::TracingRegistry::manager) 创建。

use crate::source::{TracingRequest, TracingSource};
use crate::storage::{RequestStorage, TracingStorage};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 关联ID的追踪键
pub const CORRELATION_ID: &str = "correlation_id";
/// 请求ID的追踪键
pub const REQUEST_ID: &str = "request_id";

type Sources = IndexMap<String, Arc<dyn TracingSource>>;

/// 追踪管理器
pub struct TracingManager {
    sources: RwLock<Sources>,
    enabled_map: HashMap<String, bool>,
    enabled: bool,
    storage: Box<dyn TracingStorage>,
}

impl TracingManager {
    /// 创建没有任何来源的管理器
    ///
    /// # 参数
    /// * `storage` - 请求级存储
    /// * `enabled` - 全局开关，关闭时解析、恢复均为空操作
    pub fn new(storage: Box<dyn TracingStorage>, enabled: bool) -> Self {
        Self::from_parts(IndexMap::new(), storage, enabled, HashMap::new())
    }

    /// 使用完整状态创建管理器
    ///
    /// `enabled_map` 中未出现的 key 视为启用。
    pub fn from_parts(
        sources: IndexMap<String, Arc<dyn TracingSource>>,
        storage: Box<dyn TracingStorage>,
        enabled: bool,
        enabled_map: HashMap<String, bool>,
    ) -> Self {
        Self {
            sources: RwLock::new(sources),
            enabled_map,
            enabled,
            storage,
        }
    }

    /// 使用新的 [`RequestStorage`] 创建已启用的空管理器
    pub fn in_memory() -> Self {
        Self::new(Box::new(RequestStorage::new()), true)
    }

    /// 设置单个 key 的启用状态
    pub fn with_source_enabled(mut self, key: impl Into<String>, enabled: bool) -> Self {
        self.enabled_map.insert(key.into(), enabled);
        self
    }

    /// 从请求中解析所有已启用来源的追踪值
    ///
    /// 全局关闭时直接返回，不调用任何来源。按注册顺序解析，
    /// 每个来源最多调用一次 `resolve`。
    pub fn resolve_all(&self, request: &dyn TracingRequest) {
        if !self.enabled {
            return;
        }

        // 先复制出来源列表，避免来源解析期间持有读锁
        let sources: Vec<(String, Arc<dyn TracingSource>)> = self
            .read_sources()
            .iter()
            .filter(|(key, _)| self.is_source_enabled(key))
            .map(|(key, source)| (key.clone(), Arc::clone(source)))
            .collect();

        for (key, source) in sources {
            let value = source.resolve(request);
            tracing::trace!(key = %key, value = %value, "tracing resolved");
            self.storage.set(&key, value);
        }
    }

    /// 所有已启用来源的当前值，按注册顺序排列
    ///
    /// 被单独禁用的 key 不会出现，即使存储中存在该 key 的值。
    /// 尚未解析的 key 对应 `None`。
    pub fn all(&self) -> Vec<(String, Option<String>)> {
        self.read_sources()
            .keys()
            .filter(|key| self.is_source_enabled(key))
            .map(|key| (key.clone(), self.storage.get(key)))
            .collect()
    }

    /// 按 key 读取追踪值
    ///
    /// 直接读取存储，不经过启用矩阵过滤；只有 [`all`](Self::all) 会过滤被禁用的 key。
    pub fn get(&self, key: &str) -> Option<String> {
        self.storage.get(key)
    }

    /// 判断 key 是否有值，与 [`get`](Self::get) 一样不经过启用矩阵过滤
    pub fn has(&self, key: &str) -> bool {
        self.storage.has(key)
    }

    /// 关联ID
    pub fn correlation_id(&self) -> Option<String> {
        self.get(CORRELATION_ID)
    }

    /// 请求ID
    pub fn request_id(&self) -> Option<String> {
        self.get(REQUEST_ID)
    }

    /// 在运行时注册或覆盖来源
    ///
    /// 覆盖已有 key 时保留其原有位置。不会对当前请求重新解析。
    ///
    /// # 示例
    /// ```
    /// use request_tracing::{RequestIdSource, TracingManager};
    /// use std::sync::Arc;
    ///
    /// let manager = TracingManager::in_memory();
    /// manager
    ///     .extend("request_id", Arc::new(RequestIdSource::default()))
    ///     .extend("upstream_id", Arc::new(RequestIdSource::new(true, "X-Upstream-Id")));
    /// assert!(manager.source("upstream_id").is_some());
    /// ```
    pub fn extend(&self, key: impl Into<String>, source: Arc<dyn TracingSource>) -> &Self {
        self.write_sources().insert(key.into(), source);
        self
    }

    /// 按 key 获取来源
    pub fn source(&self, key: &str) -> Option<Arc<dyn TracingSource>> {
        self.read_sources().get(key).cloned()
    }

    /// 已注册的所有 key，按注册顺序排列
    pub fn keys(&self) -> Vec<String> {
        self.read_sources().keys().cloned().collect()
    }

    /// 全局是否启用
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 单个 key 是否启用，未配置时默认启用
    pub fn is_source_enabled(&self, key: &str) -> bool {
        self.enabled_map.get(key).copied().unwrap_or(true)
    }

    /// 从任务载荷恢复追踪值
    ///
    /// 已知 key 经过对应来源的 `restore_from_job` 处理后写入存储；
    /// 未知 key 原样写入，以兼容由更新版本投递的任务。全局关闭时为空操作。
    pub fn restore<I>(&self, values: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if !self.enabled {
            return;
        }

        for (key, value) in values {
            let restored = match self.source(&key) {
                Some(source) => source.restore_from_job(&value),
                None => {
                    tracing::trace!(key = %key, "restoring tracing without registered source");
                    value
                }
            };
            self.storage.set(&key, restored);
        }
    }

    /// 清空请求级存储
    pub fn flush(&self) {
        self.storage.flush();
    }

    fn read_sources(&self) -> RwLockReadGuard<'_, Sources> {
        self.sources.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_sources(&self) -> RwLockWriteGuard<'_, Sources> {
        self.sources.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TracingManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for TracingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingManager")
            .field("keys", &self.keys())
            .field("enabled_map", &self.enabled_map)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
