//! 结构化形状 → 带校验和的单行记录。

use bvbs_core::shape::{Segment, enforce_last_segment, enforce_minimum_radius, roll_radius};
use bvbs_core::summary::{ShapeSummary, summarize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checksum::{checksum_legacy, checksum_modulo256};
use crate::coercion::{format_fixed, round_half_up};
use crate::errors::ValidationError;
use crate::lexer::{BlockMarker, LIST_SEPARATOR, SEPARATOR, TypeCode};

/// 输出格式：现行格式使用模 256 校验，旧格式使用 `96 - sum mod 32`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatVariant {
    #[default]
    Abs,
    Legacy,
}

/// 编码所需的头部信息。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeMetadata {
    pub project: String,
    pub plan: String,
    pub order: String,
    pub position: String,
    pub remark: String,
    pub steel_grade: String,
    pub diameter: f64,
    pub roll_diameter: f64,
    pub quantity: i64,
}

impl Default for ShapeMetadata {
    fn default() -> Self {
        Self {
            project: String::new(),
            plan: String::new(),
            order: String::new(),
            position: String::new(),
            remark: String::new(),
            steel_grade: String::new(),
            diameter: 0.0,
            roll_diameter: 0.0,
            quantity: 1,
        }
    }
}

/// 编辑中的形状。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub metadata: ShapeMetadata,
    pub segments: Vec<Segment>,
}

/// 汇总与校验结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeReport {
    pub summary: ShapeSummary,
    pub errors: Vec<ValidationError>,
}

impl ShapeReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Shape {
    pub fn new(metadata: ShapeMetadata, segments: Vec<Segment>) -> Self {
        Self { metadata, segments }
    }

    pub fn summary(&self) -> ShapeSummary {
        summarize(
            &self.segments,
            self.metadata.diameter,
            self.metadata.roll_diameter,
            self.metadata.quantity as f64,
        )
    }

    pub fn report(&self) -> ShapeReport {
        ShapeReport {
            summary: self.summary(),
            errors: validate(&self.metadata, &self.segments).err().unwrap_or_default(),
        }
    }

    pub fn encode(&self, variant: FormatVariant) -> Result<String, Vec<ValidationError>> {
        encode_line_with(&self.metadata, &self.segments, variant)
    }
}

/// 长度类数值写出时保留的小数位数。
const LENGTH_DECIMALS: usize = 1;

/// 按写出精度舍入后仍为正数。
fn positive_when_written(value: f64) -> bool {
    value.is_finite() && round_half_up(value, LENGTH_DECIMALS) > 0.0
}

/// 业务规则校验，一次返回全部错误。长度、直径与辊直径按写出精度判断。
pub fn validate(metadata: &ShapeMetadata, segments: &[Segment]) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if segments.len() < 2 {
        errors.push(ValidationError::TooFewSegments {
            count: segments.len(),
        });
    }
    for (index, segment) in segments.iter().enumerate() {
        if !positive_when_written(segment.length) {
            errors.push(ValidationError::NonPositiveLength { index: index + 1 });
        }
        if !(0.0..=180.0).contains(&segment.bend_angle) {
            errors.push(ValidationError::AngleOutOfRange {
                index: index + 1,
                angle: segment.bend_angle,
            });
        }
    }
    if metadata.quantity <= 0 {
        errors.push(ValidationError::NonPositiveQuantity);
    }
    if !positive_when_written(metadata.diameter) {
        errors.push(ValidationError::NonPositiveDiameter);
    }
    let has_bend = segments
        .iter()
        .take(segments.len().saturating_sub(1))
        .any(Segment::has_bend);
    if has_bend && !positive_when_written(metadata.roll_diameter) {
        errors.push(ValidationError::MissingRollDiameter);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// 以现行格式编码。
pub fn encode_line(
    metadata: &ShapeMetadata,
    segments: &[Segment],
) -> Result<String, Vec<ValidationError>> {
    encode_line_with(metadata, segments, FormatVariant::Abs)
}

pub fn encode_line_with(
    metadata: &ShapeMetadata,
    segments: &[Segment],
    variant: FormatVariant,
) -> Result<String, Vec<ValidationError>> {
    validate(metadata, segments)?;

    let mut segments = segments.to_vec();
    enforce_last_segment(&mut segments);
    let roll = roll_radius(metadata.roll_diameter);
    let summary = summarize(
        &segments,
        metadata.diameter,
        metadata.roll_diameter,
        metadata.quantity as f64,
    );

    let mut writer = LineWriter::new(TypeCode::Bf2d);

    writer.open(BlockMarker::Header);
    writer.field('j', &sanitize_text(&metadata.project));
    writer.field('r', &sanitize_text(&metadata.plan));
    writer.field('i', &sanitize_text(&metadata.order));
    writer.field('p', &sanitize_text(&metadata.position));
    writer.field('l', &format_fixed(summary.total_length, 1));
    writer.field('n', &metadata.quantity.to_string());
    writer.field('e', &format_fixed(summary.weight_per_bar, 3));
    writer.field('d', &format_fixed(metadata.diameter, LENGTH_DECIMALS));
    writer.field('g', &sanitize_text(&metadata.steel_grade));
    writer.field('s', &format_fixed(metadata.roll_diameter, LENGTH_DECIMALS));
    writer.field('v', &sanitize_text(&metadata.remark));

    writer.open(BlockMarker::Private);
    writer.field('s', &format_fixed(summary.straight_length, 1));
    writer.field('a', &format_fixed(summary.arc_length, 1));
    writer.field('t', &format_fixed(summary.total_length, 1));

    let last_index = segments.len() - 1;
    for (index, segment) in segments.iter().enumerate() {
        writer.open(BlockMarker::Geometry);
        writer.field('l', &format_fixed(segment.length, LENGTH_DECIMALS));
        if index == last_index {
            continue;
        }
        let radius = if !segment.has_bend() {
            0.0
        } else if segment.radius > 0.0 {
            enforce_minimum_radius(segment.radius, roll)
        } else {
            roll
        };
        writer.open(BlockMarker::Geometry);
        writer.field('w', &format_fixed(segment.signed_angle(), 1));
        writer.field('r', &format_fixed(radius, 1));
        writer.field('o', &segment.bend_direction.as_char().to_string());
    }

    writer.open(BlockMarker::End);
    writer.field('l', &format_fixed(summary.total_length, 1));

    let line = writer.finish(variant);
    debug!(
        segments = segments.len(),
        ?variant,
        total_length = summary.total_length,
        "已编码 BVBS 行"
    );
    Ok(line)
}

/// 把分隔符、列表分隔符与换行替换为单个空格。
pub fn sanitize_text(text: &str) -> String {
    let mut sanitized = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch == SEPARATOR || ch == LIST_SEPARATOR || ch == '\r' || ch == '\n' {
            pending_space = true;
            continue;
        }
        if pending_space {
            sanitized.push(' ');
            pending_space = false;
        }
        sanitized.push(ch);
    }
    sanitized.trim().to_string()
}

struct LineWriter {
    body: String,
}

impl LineWriter {
    fn new(type_code: TypeCode) -> Self {
        let mut body = String::with_capacity(256);
        body.push_str(type_code.as_str());
        body.push(SEPARATOR);
        Self { body }
    }

    fn open(&mut self, marker: BlockMarker) {
        self.body.push(marker.as_char());
    }

    fn field(&mut self, key: char, value: &str) {
        self.body.push(key);
        self.body.push_str(value);
        self.body.push(SEPARATOR);
    }

    fn finish(self, variant: FormatVariant) -> String {
        let mut line = self.body;
        match variant {
            FormatVariant::Abs => {
                let checksum = checksum_modulo256(&line);
                line.push(BlockMarker::Checksum.as_char());
                line.push_str(&checksum);
            }
            FormatVariant::Legacy => {
                line.push(BlockMarker::Checksum.as_char());
                let checksum = checksum_legacy(&line);
                line.push_str(&checksum.to_string());
            }
        }
        line.push(SEPARATOR);
        line
    }
}
