//! 字节数的人类可读格式化。

const UNIT: u64 = 1024;
const UNIT_PREFIXES: [char; 6] = ['k', 'M', 'G', 'T', 'P', 'E'];

/// 格式化响应头中的字节数（如 `Content-Length`）。
///
/// 缺失或为空时返回 `-`，无法解析为整数时原样返回。
pub fn human_readable_bytes(value: Option<&str>) -> String {
    let Some(raw) = value.filter(|raw| !raw.is_empty()) else {
        return "-".to_string();
    };
    match raw.parse::<u64>() {
        Ok(bytes) => format_bytes(bytes),
        Err(_) => raw.to_string(),
    }
}

/// 将字节数格式化为 `512B`、`1.5kB`、`1.0MB` 等形式。
pub fn format_bytes(bytes: u64) -> String {
    if bytes < UNIT {
        return format!("{bytes}B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1}{}B", bytes as f64 / div as f64, UNIT_PREFIXES[exp])
}
