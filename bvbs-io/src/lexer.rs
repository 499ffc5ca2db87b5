//! 单遍词法扫描：行 → 块区间 → 字段。
//!
//! 块标记只在行首或紧随分隔符 `@` 时生效；字段键为单个小写字母。

use serde::{Deserialize, Serialize};

use crate::errors::{ParseWarning, StructuralError};

/// 块与字段的终止符。
pub const SEPARATOR: char = '@';
/// 字段值内的列表分隔符。
pub const LIST_SEPARATOR: char = ';';

/// 块标记字母表。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockMarker {
    Header,
    Geometry,
    Mesh,
    Attribute,
    /// 私有块，编码器在此写入长度汇总。
    Private,
    Checksum,
    AxisX,
    AxisY,
    End,
}

impl BlockMarker {
    pub fn from_char(ch: char) -> Option<Self> {
        Some(match ch {
            'H' => BlockMarker::Header,
            'G' => BlockMarker::Geometry,
            'M' => BlockMarker::Mesh,
            'A' => BlockMarker::Attribute,
            'P' => BlockMarker::Private,
            'C' => BlockMarker::Checksum,
            'X' => BlockMarker::AxisX,
            'Y' => BlockMarker::AxisY,
            'E' => BlockMarker::End,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            BlockMarker::Header => 'H',
            BlockMarker::Geometry => 'G',
            BlockMarker::Mesh => 'M',
            BlockMarker::Attribute => 'A',
            BlockMarker::Private => 'P',
            BlockMarker::Checksum => 'C',
            BlockMarker::AxisX => 'X',
            BlockMarker::AxisY => 'Y',
            BlockMarker::End => 'E',
        }
    }

    /// 携带腿长与弯折角的块。
    #[inline]
    pub fn carries_geometry(self) -> bool {
        matches!(self, BlockMarker::Geometry)
    }
}

/// 行首的四字母格式代码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    Bf2d,
    Bf3d,
    Bfwe,
    Bfma,
    Bfgt,
    Bfau,
}

impl TypeCode {
    pub const ALL: [TypeCode; 6] = [
        TypeCode::Bf2d,
        TypeCode::Bf3d,
        TypeCode::Bfwe,
        TypeCode::Bfma,
        TypeCode::Bfgt,
        TypeCode::Bfau,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TypeCode::Bf2d => "BF2D",
            TypeCode::Bf3d => "BF3D",
            TypeCode::Bfwe => "BFWE",
            TypeCode::Bfma => "BFMA",
            TypeCode::Bfgt => "BFGT",
            TypeCode::Bfau => "BFAU",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == code)
    }

    /// 列表展示用的简称：弯曲钢筋为 `BWS`，钢筋网为 `BWM`。
    pub fn display_label(self) -> Option<&'static str> {
        match self {
            TypeCode::Bf2d | TypeCode::Bf3d => Some("BWS"),
            TypeCode::Bfma => Some("BWM"),
            _ => None,
        }
    }
}

/// 行内的一个块区间，`offset` 为其在行内的字节偏移。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan<'a> {
    pub marker: BlockMarker,
    pub offset: usize,
    pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedLine<'a> {
    /// 识别出的格式代码；起始标记无效时为分隔符前的原样前缀。
    pub type_code: &'a str,
    pub start_valid: bool,
    pub spans: Vec<BlockSpan<'a>>,
}

/// 去掉首尾空白，并删除分隔符与块标记之间的空白（`@ G` → `@G`）。
pub fn normalize_line(line: &str) -> String {
    let trimmed = line.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    let mut chars = trimmed.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        normalized.push(ch);
        if ch != SEPARATOR {
            continue;
        }
        let rest = &trimmed[index + ch.len_utf8()..];
        let after_ws = rest.trim_start();
        let skipped = rest.len() - after_ws.len();
        if skipped > 0
            && after_ws
                .chars()
                .next()
                .is_some_and(|next| BlockMarker::from_char(next).is_some())
        {
            while chars
                .peek()
                .is_some_and(|(next_index, _)| *next_index < index + 1 + skipped)
            {
                chars.next();
            }
        }
    }
    normalized
}

/// 把一行切分为有序的块区间。行首须为已知格式代码加分隔符，否则标记为无效但继续切分。
pub fn tokenize(line: &str) -> TokenizedLine<'_> {
    let prefix = line.split(SEPARATOR).next().unwrap_or("");
    let start_valid =
        TypeCode::parse(prefix).is_some() && line[prefix.len()..].starts_with(SEPARATOR);

    let mut starts: Vec<(usize, BlockMarker)> = Vec::new();
    let mut previous: Option<char> = None;
    for (index, ch) in line.char_indices() {
        if previous.is_none() || previous == Some(SEPARATOR) {
            if let Some(marker) = BlockMarker::from_char(ch) {
                starts.push((index, marker));
            }
        }
        previous = Some(ch);
    }

    let spans = starts
        .iter()
        .enumerate()
        .map(|(position, &(offset, marker))| {
            let end = starts
                .get(position + 1)
                .map(|(next, _)| *next)
                .unwrap_or(line.len());
            BlockSpan {
                marker,
                offset,
                text: &line[offset..end],
            }
        })
        .collect();

    TokenizedLine {
        type_code: prefix,
        start_valid,
        spans,
    }
}

/// 字段值：单值或以 `;` 分隔的列表。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.contains(LIST_SEPARATOR) {
            FieldValue::List(
                trimmed
                    .split(LIST_SEPARATOR)
                    .map(|part| part.trim().to_string())
                    .collect(),
            )
        } else {
            FieldValue::Scalar(trimmed.to_string())
        }
    }

    /// 首个值；列表取第一项，空列表返回 `None`。
    pub fn first(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(value) => Some(value.as_str()),
            FieldValue::List(items) => items.first().map(String::as_str),
        }
    }

    /// 展开为逐项迭代。
    pub fn items(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            FieldValue::Scalar(value) => Box::new(std::iter::once(value.as_str())),
            FieldValue::List(items) => Box::new(items.iter().map(String::as_str)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub key: char,
    pub values: Vec<FieldValue>,
}

/// 解析后的块。字段按首次出现的顺序保存，同一键的重复出现追加到值列表。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub marker: BlockMarker,
    pub offset: usize,
    pub raw: String,
    pub fields: Vec<Field>,
    /// 校验块的原始内容；其他块为 `None`。
    pub checksum: Option<String>,
    pub errors: Vec<StructuralError>,
    pub warnings: Vec<ParseWarning>,
}

impl Block {
    pub fn field(&self, key: char) -> Option<&Field> {
        self.fields.iter().find(|field| field.key == key)
    }

    pub fn first_value(&self, key: char) -> Option<&str> {
        self.field(key)?.values.first()?.first()
    }

    /// 某键全部值的逐项展开（列表值被拆开）。
    pub fn items(&self, key: char) -> impl Iterator<Item = &str> + '_ {
        self.field(key)
            .into_iter()
            .flat_map(|field| field.values.iter().flat_map(FieldValue::items))
    }

    fn push_value(&mut self, key: char, value: FieldValue) {
        match self.fields.iter_mut().find(|field| field.key == key) {
            Some(field) => field.values.push(value),
            None => self.fields.push(Field {
                key,
                values: vec![value],
            }),
        }
    }
}

/// 解析单个块区间。
///
/// 校验块不拆字段，块体即校验内容。其余块反复读取“小写键 + 值”，值以分隔符或区间末尾结束；
/// 无法识别的剩余部分记为“块不完整”，已识别字段仍保留。
pub fn parse_block(span: &BlockSpan<'_>) -> Block {
    let mut block = Block {
        marker: span.marker,
        offset: span.offset,
        raw: span.text.to_string(),
        fields: Vec::new(),
        checksum: None,
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    let marker_len = span.marker.as_char().len_utf8();
    let body = span.text[marker_len..].trim();

    if span.marker == BlockMarker::Checksum {
        let payload = body.strip_suffix(SEPARATOR).unwrap_or(body);
        block.checksum = Some(payload.trim().to_string());
        return block;
    }

    let mut rest = body;
    loop {
        rest = rest.trim_start();
        let mut chars = rest.chars();
        let Some(key) = chars.next() else {
            break;
        };
        // 遇到非小写键即停止，其后的内容整体进入剩余部分，不再向后找字段。
        if !key.is_ascii_lowercase() {
            break;
        }
        let value_part = chars.as_str();
        match value_part.find(SEPARATOR) {
            Some(end) => {
                block.push_value(key, FieldValue::from_raw(&value_part[..end]));
                rest = &value_part[end + SEPARATOR.len_utf8()..];
            }
            None => {
                block.push_value(key, FieldValue::from_raw(value_part));
                block.warnings.push(ParseWarning::UnterminatedBlock {
                    marker: span.marker.as_char(),
                });
                rest = "";
            }
        }
    }

    let remainder = rest.trim();
    if !remainder.is_empty() {
        block.errors.push(StructuralError::IncompleteBlock {
            marker: span.marker.as_char(),
            remainder: remainder.to_string(),
        });
    }
    block
}
