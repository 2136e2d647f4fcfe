//! 入站请求的头部读取接口

use http::HeaderMap;
use std::collections::HashMap;

/// 宿主框架的入站请求接口，只需要按名称读取请求头
///
/// 非 UTF-8（或非可见 ASCII）的头部值视为不存在。
pub trait TracingRequest {
    /// 按名称读取请求头，名称大小写不敏感
    fn header(&self, name: &str) -> Option<&str>;
}

impl TracingRequest for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

impl<B> TracingRequest for http::Request<B> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers().header(name)
    }
}

impl TracingRequest for http::request::Parts {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.header(name)
    }
}

impl TracingRequest for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
