//! 外部请求头取值的清洗
//!
//! 采用严格的白名单：只允许 `[A-Za-z0-9_-]`，用于防止头部注入和日志注入，
//! 并限制标识符长度。这里不校验 UUID 结构，上游传入的任意合法标识符都会被接受。

/// 清洗后标识符的最大长度
pub const MAX_LENGTH: usize = 255;

/// 清洗外部传入的追踪标识符
///
/// 去除首尾空白后，若结果为空、超过 [`MAX_LENGTH`] 或包含白名单之外的字符，
/// 返回 `None`；否则返回去除空白后的值。
///
/// # 示例
/// ```
/// use request_tracing::sanitize;
///
/// assert_eq!(sanitize(Some("  abc-123_X ")), Some("abc-123_X".to_string()));
/// assert_eq!(sanitize(Some("abc\r\nSet-Cookie: x")), None);
/// assert_eq!(sanitize(None), None);
/// ```
#[inline]
pub fn sanitize(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();

    if value.is_empty() || value.len() > MAX_LENGTH {
        return None;
    }

    // 字节级校验：白名单字符均为 ASCII，多字节字符自然会被拒绝
    if !value.bytes().all(is_allowed_byte) {
        return None;
    }

    Some(value.to_string())
}

#[inline]
fn is_allowed_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_')
}
