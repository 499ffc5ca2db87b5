//! 宽松的数值解析与定点格式化。
//!
//! 解析失败返回 `None`，由调用方统计并决定是否记为字段警告。

/// 解析数值，接受 `,` 或 `.` 作为小数点。非有限值视为无效。
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace(',', ".");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// 解析直径，先去掉末尾（大小写不敏感的）`d` 单位后缀。
pub fn parse_diameter(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_suffix('d')
        .or_else(|| trimmed.strip_suffix('D'))
        .unwrap_or(trimmed);
    parse_number(stripped)
}

/// 按浮点解析后四舍五入（半数向上）到整数。
pub fn parse_integer(text: &str) -> Option<i64> {
    let value = round_half_up(parse_number(text)?, 0);
    if value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// 半数向上舍入到 `decimals` 位小数，与 [`format_fixed`] 的舍入一致。
pub fn round_half_up(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor + 0.5).floor() / factor;
    // -0.0 归一为 0.0
    rounded + 0.0
}

/// 定点格式化：半数向上舍入到 `decimals` 位，始终保留全部小数位。
///
/// 非有限值按 0 处理，保证输出可被重新解析。
pub fn format_fixed(value: f64, decimals: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{:.*}", decimals, round_half_up(value, decimals))
}

/// 与 [`format_fixed`] 相同的舍入，但去掉末尾多余的 0 与小数点，用于展示。
pub fn format_trimmed(value: f64, decimals: usize) -> String {
    let mut text = format_fixed(value, decimals);
    if text.contains('.') {
        let kept = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(kept);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_accept_both_decimal_separators() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number(" 12,5 "), Some(12.5));
        assert_eq!(parse_number("-90"), Some(-90.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn diameter_strips_unit_suffix() {
        assert_eq!(parse_diameter("12d"), Some(12.0));
        assert_eq!(parse_diameter("12D"), Some(12.0));
        assert_eq!(parse_diameter("8,5d"), Some(8.5));
        assert_eq!(parse_diameter("d"), None);
        assert_eq!(parse_diameter("14"), Some(14.0));
    }

    #[test]
    fn integers_round_half_up() {
        assert_eq!(parse_integer("4"), Some(4));
        assert_eq!(parse_integer("2.5"), Some(3));
        assert_eq!(parse_integer("2,4"), Some(2));
        assert_eq!(parse_integer("-2.5"), Some(-2));
        assert_eq!(parse_integer("x"), None);
    }

    #[test]
    fn fixed_formatting_rounds_half_up() {
        assert_eq!(format_fixed(75.398, 1), "75.4");
        assert_eq!(format_fixed(1800.0, 1), "1800.0");
        assert_eq!(format_fixed(0.25, 1), "0.3");
        assert_eq!(format_fixed(-0.04, 1), "0.0");
        assert_eq!(format_fixed(-90.0, 1), "-90.0");
        assert_eq!(format_fixed(1.23456, 3), "1.235");
        assert_eq!(format_fixed(f64::NAN, 1), "0.0");
    }

    #[test]
    fn trimmed_formatting_drops_trailing_zeros() {
        assert_eq!(format_trimmed(800.0, 1), "800");
        assert_eq!(format_trimmed(75.398, 2), "75.4");
        assert_eq!(format_trimmed(12.5, 1), "12.5");
        assert_eq!(format_trimmed(100.0, 0), "100");
        assert_eq!(format_trimmed(-0.01, 1), "0");
    }
}
