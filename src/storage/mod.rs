//! 追踪值的存储后端
//!
//! - [`RequestStorage`]：请求级内存存储，随请求创建、随请求丢弃
//! - [`SessionStorage`]：会话级存储，委托给外部会话机制，在命名空间下保存值

mod request;
mod session;

pub use request::RequestStorage;
pub use session::{MemorySession, Session, SessionHandle, SessionStorage, NAMESPACE};

/// 追踪值存储接口
///
/// 方法均接收 `&self`：同一个存储会在中间件和处理函数之间通过 `Arc` 共享，
/// 实现需要自行提供内部可变性。
pub trait TracingStorage: Send + Sync {
    /// 按 key 保存追踪值
    fn set(&self, key: &str, value: String);

    /// 按 key 读取追踪值，不存在时返回 `None`
    fn get(&self, key: &str) -> Option<String>;

    /// 判断 key 是否存在
    fn has(&self, key: &str) -> bool;

    /// 清空本存储管理的所有值
    fn flush(&self);
}
