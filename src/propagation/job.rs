//! 任务载荷中的追踪传播
//!
//! 入队时把当前追踪值写入 JSON 载荷的 `tracings` 字段（扁平的字符串映射），
//! 执行前读取该字段并恢复到执行上下文的管理器中。载荷是单向的值拷贝，
//! 入队方和执行方之间不共享任何引用。

use crate::context;
use crate::manager::TracingManager;
use crate::registry::TracingRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// 载荷中保存追踪值的字段名
pub const JOB_PAYLOAD_FIELD: &str = "tracings";

/// 任务生命周期钩子
#[derive(Debug, Clone)]
pub struct TracingJobDispatcher {
    manager: Arc<TracingManager>,
}

impl TracingJobDispatcher {
    pub fn new(manager: Arc<TracingManager>) -> Self {
        Self { manager }
    }

    /// 已解析的追踪值快照，未解析的 key 不包含在内
    pub fn snapshot(&self) -> Map<String, Value> {
        snapshot(&self.manager)
    }

    /// 入队钩子：把追踪值写入载荷
    ///
    /// 全局关闭时不修改载荷。载荷不是 JSON 对象时记录调试日志后跳过。
    pub fn on_enqueue(&self, payload: &mut Value) {
        if !self.manager.is_enabled() {
            return;
        }

        match payload.as_object_mut() {
            Some(object) => {
                object.insert(JOB_PAYLOAD_FIELD.to_string(), Value::Object(self.snapshot()));
            }
            None => tracing::debug!("job payload is not an object, tracings not attached"),
        }
    }

    /// 执行前钩子：从载荷恢复追踪值
    ///
    /// 字段缺失、为空或不是对象时不做任何事；非字符串的条目会被忽略。
    pub fn on_process(&self, payload: &Value) {
        if !self.manager.is_enabled() {
            return;
        }

        let values = extract(payload);
        if values.is_empty() {
            return;
        }
        self.manager.restore(values);
    }

    /// 执行后钩子：清空执行上下文的请求级存储
    pub fn on_complete(&self) {
        self.manager.flush();
    }
}

/// 已解析追踪值的 JSON 快照
pub fn snapshot(manager: &TracingManager) -> Map<String, Value> {
    manager
        .all()
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, Value::String(v))))
        .collect()
}

/// 从载荷中读取追踪值
pub fn extract(payload: &Value) -> Vec<(String, String)> {
    let Some(field) = payload.get(JOB_PAYLOAD_FIELD) else {
        return Vec::new();
    };
    let Some(object) = field.as_object() else {
        tracing::debug!("job payload tracings field is not an object, ignoring");
        return Vec::new();
    };

    object
        .iter()
        .filter_map(|(key, value)| match value.as_str() {
            Some(value) => Some((key.clone(), value.to_string())),
            None => {
                tracing::debug!(key = %key, "ignoring non-string tracing value in job payload");
                None
            }
        })
        .collect()
}

/// 在当前请求上下文中入队时调用，把当前追踪值写入载荷
///
/// 不在追踪上下文中时返回 `false`，载荷保持不变。
pub fn enqueue_current(payload: &mut Value) -> bool {
    match context::current_manager() {
        Some(manager) => {
            TracingJobDispatcher::new(manager).on_enqueue(payload);
            true
        }
        None => false,
    }
}

/// 在新的追踪上下文中执行任务
///
/// 为本次执行创建新的管理器，从载荷恢复追踪值，并在执行期间将其设置为当前管理器，
/// 执行结束后清空其存储。
///
/// # 示例
/// ```
/// use request_tracing::{context, job, TracingRegistry};
/// use serde_json::json;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let registry = TracingRegistry::default();
/// let payload = json!({ "job": "send_mail", "tracings": { "request_id": "req-1" } });
///
/// let seen = job::run_job(&registry, &payload, async {
///     context::tracings().request_id().map(str::to_string)
/// })
/// .await;
/// assert_eq!(seen.as_deref(), Some("req-1"));
/// # });
/// ```
pub async fn run_job<F, T>(registry: &TracingRegistry, payload: &Value, job: F) -> T
where
    F: Future<Output = T>,
{
    let manager = Arc::new(registry.manager());
    let dispatcher = TracingJobDispatcher::new(Arc::clone(&manager));

    dispatcher.on_process(payload);
    let output = context::with_manager(manager, job).await;
    dispatcher.on_complete();

    output
}

/// 带追踪值的类型化任务信封
///
/// 任务本身的字段被展开到同一层，追踪值位于 `tracings` 字段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracedJob<T> {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub tracings: IndexMap<String, String>,
    #[serde(flatten)]
    pub job: T,
}

impl<T> TracedJob<T> {
    /// 捕获管理器中已解析的追踪值，全局关闭时不捕获
    pub fn capture(manager: &TracingManager, job: T) -> Self {
        let tracings = if manager.is_enabled() {
            manager
                .all()
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v)))
                .collect()
        } else {
            IndexMap::new()
        };
        Self { tracings, job }
    }

    /// 把追踪值恢复到执行上下文的管理器
    pub fn restore_into(&self, manager: &TracingManager) {
        manager.restore(
            self.tracings
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
    }

    /// 拆出任务本身
    pub fn into_inner(self) -> T {
        self.job
    }
}
