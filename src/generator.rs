//! 追踪标识符生成器

use uuid::Uuid;

/// 生成新的追踪标识符
///
/// 返回小写、带连字符的 UUID v4 文本形式，
/// 格式：`xxxxxxxx-xxxx-4xxx-[89ab]xxx-xxxxxxxxxxxx`。
/// 随机源为操作系统的 CSPRNG（通过 `uuid` 的 `v4` 特性）。
///
/// # 示例
/// ```
/// use request_tracing::{generate, is_uuid_v4};
///
/// let id = generate();
/// assert!(is_uuid_v4(&id));
/// ```
#[inline]
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// 判断字符串是否为小写 UUID v4 文本形式
///
/// 字节级校验，避免 Unicode 处理开销
///
/// # 校验规则
/// - 长度必须是 36 个字符，连字符位于第 8、13、18、23 位
/// - 其余位置只能是小写十六进制字符（0-9, a-f）
/// - 版本位必须是 `4`，变体位必须是 `8`、`9`、`a` 或 `b`
pub fn is_uuid_v4(id: &str) -> bool {
    let bytes = id.as_bytes();
    if bytes.len() != 36 {
        return false;
    }

    for (i, &b) in bytes.iter().enumerate() {
        let ok = match i {
            8 | 13 | 18 | 23 => b == b'-',
            14 => b == b'4',
            19 => matches!(b, b'8' | b'9' | b'a' | b'b'),
            _ => matches!(b, b'0'..=b'9' | b'a'..=b'f'),
        };
        if !ok {
            return false;
        }
    }

    true
}
