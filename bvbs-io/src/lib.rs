use std::fs;
use std::path::Path;

use tracing::{info, warn};

pub mod checksum;
pub mod coercion;
pub mod encoder;
pub mod entry;
pub mod errors;
pub mod lexer;

pub use checksum::{ChecksumScheme, ChecksumStatus, checksum_legacy, checksum_modulo256};
pub use encoder::{
    FormatVariant, Shape, ShapeMetadata, ShapeReport, encode_line, encode_line_with, validate,
};
pub use entry::{Entry, EntryMetadata, parse_content, parse_line};
pub use errors::{FieldError, IoError, ParseWarning, StructuralError, ValidationError};
pub use lexer::{Block, BlockMarker, Field, FieldValue, TypeCode};

pub trait EntryLoader {
    fn load(&self, path: &Path) -> Result<Vec<Entry>, IoError>;
}

pub trait ShapeSaver {
    fn save(&self, shapes: &[Shape], path: &Path) -> Result<(), IoError>;
}

/// 读写 BVBS 文本文件。
#[derive(Debug, Clone, Copy, Default)]
pub struct BvbsFacade {
    variant: FormatVariant,
}

impl BvbsFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variant(variant: FormatVariant) -> Self {
        Self { variant }
    }

    /// 把多个形状编码为行，任一形状校验失败即返回错误（序号从 1 开始）。
    pub fn encode_all(&self, shapes: &[Shape]) -> Result<String, IoError> {
        let mut output = String::new();
        for (index, shape) in shapes.iter().enumerate() {
            let line = shape
                .encode(self.variant)
                .map_err(|errors| IoError::InvalidShape {
                    index: index + 1,
                    errors,
                })?;
            output.push_str(&line);
            output.push_str("\r\n");
        }
        Ok(output)
    }
}

impl EntryLoader for BvbsFacade {
    fn load(&self, path: &Path) -> Result<Vec<Entry>, IoError> {
        let bytes = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), "文件不是有效的 UTF-8，已按替换字符读取");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        let entries = parse_content(&text);
        info!(
            path = %path.display(),
            entries = entries.len(),
            "已加载 BVBS 文件"
        );
        Ok(entries)
    }
}

impl ShapeSaver for BvbsFacade {
    fn save(&self, shapes: &[Shape], path: &Path) -> Result<(), IoError> {
        let output = self.encode_all(shapes)?;
        fs::write(path, output).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), shapes = shapes.len(), "已写出 BVBS 文件");
        Ok(())
    }
}
