use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 结构错误：起始标记无效或块内有无法解析的剩余内容。只记录，不中断解析。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StructuralError {
    #[error("empty record")]
    EmptyRecord,
    #[error("invalid start marker {prefix:?}")]
    InvalidStartMarker { prefix: String },
    #[error("no blocks found")]
    NoBlocks,
    #[error("block {marker}: incomplete block (unparsed remainder {remainder:?})")]
    IncompleteBlock { marker: char, remainder: String },
}

/// 字段数值转换失败，按受影响的值个数汇总。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("block {marker}: {count} invalid value(s) in field {key} ignored")]
pub struct FieldError {
    pub marker: char,
    pub key: char,
    pub count: usize,
}

/// 非致命的解析警告。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ParseWarning {
    #[error("header block missing")]
    MissingHeader,
    #[error("block {marker}: missing terminating separator")]
    UnterminatedBlock { marker: char },
    #[error("block G: no valid lengths found")]
    NoValidLengths,
    #[error("no geometry found")]
    NoGeometry,
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("checksum mismatch: found {found:?}, expected {expected_modulo256} or {expected_legacy}")]
    ChecksumMismatch {
        found: String,
        expected_modulo256: String,
        expected_legacy: i64,
    },
}

/// 编码前的业务规则校验失败。段号从 1 开始。
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ValidationError {
    #[error("at least two segments are required (got {count})")]
    TooFewSegments { count: usize },
    #[error("segment {index}: length must be greater than 0")]
    NonPositiveLength { index: usize },
    #[error("segment {index}: bend angle {angle} must be between 0° and 180°")]
    AngleOutOfRange { index: usize, angle: f64 },
    #[error("quantity must be greater than 0")]
    NonPositiveQuantity,
    #[error("diameter must be greater than 0")]
    NonPositiveDiameter,
    #[error("roll diameter must be greater than 0 when the shape has bends")]
    MissingRollDiameter,
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shape {index} is invalid: {}", join_errors(.errors))]
    InvalidShape {
        index: usize,
        errors: Vec<ValidationError>,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
