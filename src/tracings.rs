//! 追踪值快照

use crate::manager::{TracingManager, CORRELATION_ID, REQUEST_ID};
use std::collections::HashMap;

/// 某一时刻所有已启用追踪值的只读快照
///
/// 由 [`context::tracings`](crate::tracings) 或 axum 提取器获得，
/// 顺序与来源的注册顺序一致。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tracings {
    entries: Vec<(String, Option<String>)>,
}

impl Tracings {
    /// 从管理器的 `all()` 结果构造快照
    pub fn from_manager(manager: &TracingManager) -> Self {
        Self {
            entries: manager.all(),
        }
    }

    /// 按 key 读取追踪值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// 判断 key 是否有值
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.get(CORRELATION_ID)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get(REQUEST_ID)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 只包含已解析值的映射
    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

impl From<Vec<(String, Option<String>)>> for Tracings {
    fn from(entries: Vec<(String, Option<String>)>) -> Self {
        Self { entries }
    }
}
