//! 两种相互独立的校验和算法。
//!
//! 字符码按 UTF-16 码元求和，与交换伙伴的实现保持一致；纯 ASCII 内容下等同于字节和。

use serde::{Deserialize, Serialize};

/// 校验方案。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumScheme {
    /// 字符码和对 256 取模，两位大写十六进制。
    Modulo256,
    /// `96 - (sum mod 32)`，十进制。
    Legacy,
}

fn char_code_sum(text: &str) -> u64 {
    text.encode_utf16().map(u64::from).sum()
}

/// 字符码和对 256 取模，输出两位补零的大写十六进制。
pub fn checksum_modulo256(text: &str) -> String {
    format!("{:02X}", char_code_sum(text) % 256)
}

/// 旧格式校验值 `96 - (sum mod 32)`，结果恒在 65..=96。
pub fn checksum_legacy(text: &str) -> i64 {
    96 - (char_code_sum(text) % 32) as i64
}

/// 嵌入的校验值与重新计算结果的比对。只做检测，不做纠正。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ChecksumStatus {
    Missing,
    Valid {
        scheme: ChecksumScheme,
    },
    Mismatch {
        found: String,
        expected_modulo256: String,
        expected_legacy: i64,
    },
}

impl ChecksumStatus {
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, ChecksumStatus::Valid { .. })
    }
}

/// 比对校验块内容。
///
/// `modern_scope` 为校验块标记之前的全部文本，`legacy_scope` 额外包含标记字符本身。
pub fn verify(payload: &str, modern_scope: &str, legacy_scope: &str) -> ChecksumStatus {
    let found = payload.trim();
    let expected_modulo256 = checksum_modulo256(modern_scope);
    if found.eq_ignore_ascii_case(&expected_modulo256) {
        return ChecksumStatus::Valid {
            scheme: ChecksumScheme::Modulo256,
        };
    }
    let expected_legacy = checksum_legacy(legacy_scope);
    if found.parse::<i64>().ok() == Some(expected_legacy) {
        return ChecksumStatus::Valid {
            scheme: ChecksumScheme::Legacy,
        };
    }
    ChecksumStatus::Mismatch {
        found: found.to_string(),
        expected_modulo256,
        expected_legacy,
    }
}
