//! 请求级存储

use super::TracingStorage;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// 单次请求生命周期内的内存存储
///
/// 每个请求（或每次任务执行）创建一个新实例，请求结束时随管理器一起丢弃。
#[derive(Debug, Default)]
pub struct RequestStorage {
    values: Mutex<HashMap<String, String>>,
}

impl RequestStorage {
    /// 创建空的请求级存储
    pub fn new() -> Self {
        Self::default()
    }

    // 锁中毒时取回内部数据继续使用
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TracingStorage for RequestStorage {
    fn set(&self, key: &str, value: String) {
        self.lock().insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn has(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn flush(&self) {
        self.lock().clear();
    }
}
