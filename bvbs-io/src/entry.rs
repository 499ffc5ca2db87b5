//! 把一行的全部块组装成结构化记录。
//!
//! `parse_line` 是全函数：任何格式问题都记录在 `errors` / `warnings` 中，
//! 调用方据此决定是否显示“无预览”等占位。

use bvbs_core::shape::{
    BendDirection, Segment, enforce_minimum_radius, roll_radius as roll_radius_of,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::checksum::{self, ChecksumStatus};
use crate::coercion::{parse_diameter, parse_integer, parse_number};
use crate::errors::{FieldError, ParseWarning, StructuralError};
use crate::lexer::{Block, BlockMarker, TypeCode, normalize_line, parse_block, tokenize};

/// 未给出弯曲辊直径时，按 4 倍钢筋直径估算。
const DEFAULT_ROLL_FACTOR: f64 = 4.0;

/// 头块中的元数据。未知的文本为空串，未知的数值为 `None`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub project: String,
    pub plan: String,
    pub order: String,
    pub position: String,
    pub remark: String,
    /// 头块 `t` 字段中的类型说明。
    pub shape_type: String,
    pub steel_grade: String,
    pub diameter: Option<f64>,
    pub total_length: Option<f64>,
    pub quantity: i64,
    pub roll_diameter: Option<f64>,
    /// 单根重量（kg）。
    pub weight: Option<f64>,
    pub total_weight: Option<f64>,
    pub total_length_meters: Option<f64>,
    /// 列表展示用的类型简称。
    pub type_label: String,
    /// `project-plan-TYPE-position`，缺项省略。
    pub item_id: String,
    pub max_segment_length: Option<f64>,
    pub bend_count: usize,
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self {
            project: String::new(),
            plan: String::new(),
            order: String::new(),
            position: String::new(),
            remark: String::new(),
            shape_type: String::new(),
            steel_grade: String::new(),
            diameter: None,
            total_length: None,
            quantity: 1,
            roll_diameter: None,
            weight: None,
            total_weight: None,
            total_length_meters: None,
            type_label: String::new(),
            item_id: String::new(),
            max_segment_length: None,
            bend_count: 0,
        }
    }
}

impl EntryMetadata {
    /// 弯折使用的辊半径：优先头块中的辊直径，否则按钢筋直径估算。
    pub fn effective_roll_radius(&self) -> f64 {
        let roll_diameter = self
            .roll_diameter
            .filter(|value| *value > 0.0)
            .or_else(|| self.diameter.map(|d| d * DEFAULT_ROLL_FACTOR))
            .unwrap_or(0.0);
        roll_radius_of(roll_diameter)
    }
}

/// 一行解析结果。创建后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// 在源文件中的行号（从 0 开始）。
    pub source_index: usize,
    /// 规范化后的行文本。
    pub raw_line: String,
    pub type_code: String,
    pub start_valid: bool,
    pub blocks: Vec<Block>,
    pub metadata: EntryMetadata,
    pub segments: Option<Vec<Segment>>,
    pub has_geometry: bool,
    pub checksum: ChecksumStatus,
    pub errors: Vec<StructuralError>,
    pub warnings: Vec<ParseWarning>,
}

impl Entry {
    fn new(source_index: usize, raw_line: String) -> Self {
        Self {
            source_index,
            raw_line,
            type_code: String::new(),
            start_valid: true,
            blocks: Vec::new(),
            metadata: EntryMetadata::default(),
            segments: None,
            has_geometry: false,
            checksum: ChecksumStatus::Missing,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// 识别出的格式代码。
    pub fn type_code(&self) -> Option<TypeCode> {
        TypeCode::parse(&self.type_code)
    }

    pub fn blocks_with(&self, marker: BlockMarker) -> impl Iterator<Item = &Block> + '_ {
        self.blocks.iter().filter(move |block| block.marker == marker)
    }

    pub fn header(&self) -> Option<&Block> {
        self.blocks_with(BlockMarker::Header).next()
    }

    /// 可直接预览：有几何且无结构错误。
    #[inline]
    pub fn is_previewable(&self) -> bool {
        self.has_geometry && self.errors.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        self.segments.as_deref().unwrap_or(&[])
    }
}

/// 解析单行。
pub fn parse_line(raw: &str) -> Entry {
    parse_line_at(raw, 0)
}

/// 解析整段文本：统一换行符，跳过空行，保留原始行号。
pub fn parse_content(text: &str) -> Vec<Entry> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let entries: Vec<Entry> = normalized
        .split('\n')
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_line_at(line, index))
        .collect();
    debug!(entries = entries.len(), "BVBS 内容解析完成");
    entries
}

/// 解析单行并记录其源行号。
pub fn parse_line_at(raw: &str, source_index: usize) -> Entry {
    let line = normalize_line(raw);
    let mut entry = Entry::new(source_index, line);

    if entry.raw_line.is_empty() {
        entry.start_valid = false;
        entry.errors.push(StructuralError::EmptyRecord);
        return entry;
    }

    let line = entry.raw_line.clone();
    let tokens = tokenize(&line);
    entry.type_code = tokens.type_code.to_string();
    entry.start_valid = tokens.start_valid;
    if !tokens.start_valid {
        entry.errors.push(StructuralError::InvalidStartMarker {
            prefix: tokens.type_code.to_string(),
        });
    }

    if tokens.spans.is_empty() {
        entry.errors.push(StructuralError::NoBlocks);
        return entry;
    }

    for span in &tokens.spans {
        let block = parse_block(span);
        entry.errors.extend(block.errors.iter().cloned());
        entry.warnings.extend(block.warnings.iter().cloned());
        entry.blocks.push(block);
    }

    assemble_metadata(&mut entry);
    assemble_segments(&mut entry);
    verify_checksum(&mut entry, &line);

    trace!(
        source_index,
        blocks = entry.blocks.len(),
        has_geometry = entry.has_geometry,
        errors = entry.errors.len(),
        "已解析 BVBS 行"
    );
    entry
}

fn header_number(
    header: &Block,
    key: char,
    warnings: &mut Vec<ParseWarning>,
    parse: fn(&str) -> Option<f64>,
) -> Option<f64> {
    let raw = header.first_value(key)?;
    let value = parse(raw);
    if value.is_none() && !raw.trim().is_empty() {
        warnings.push(ParseWarning::Field(FieldError {
            marker: BlockMarker::Header.as_char(),
            key,
            count: 1,
        }));
    }
    value
}

fn assemble_metadata(entry: &mut Entry) {
    let mut metadata = EntryMetadata::default();
    let mut warnings = Vec::new();

    match entry.header() {
        Some(header) => {
            let text = |key: char| header.first_value(key).unwrap_or_default().to_string();
            metadata.project = text('j');
            metadata.plan = text('r');
            metadata.order = text('i');
            metadata.position = text('p');
            metadata.remark = text('v');
            metadata.shape_type = text('t');
            metadata.steel_grade = text('g');

            metadata.diameter = header_number(header, 'd', &mut warnings, parse_diameter);
            metadata.total_length = header_number(header, 'l', &mut warnings, parse_number);
            metadata.weight = header_number(header, 'e', &mut warnings, parse_number);
            // `f` 为 0 或缺失时退回 `s`。
            metadata.roll_diameter = header_number(header, 'f', &mut warnings, parse_number)
                .filter(|value| *value != 0.0)
                .or_else(|| header_number(header, 's', &mut warnings, parse_number));

            if let Some(raw) = header.first_value('n') {
                match parse_integer(raw) {
                    Some(quantity) if quantity > 0 => metadata.quantity = quantity,
                    Some(_) => {}
                    None if raw.trim().is_empty() => {}
                    None => warnings.push(ParseWarning::Field(FieldError {
                        marker: BlockMarker::Header.as_char(),
                        key: 'n',
                        count: 1,
                    })),
                }
            }

            let quantity = metadata.quantity as f64;
            metadata.total_weight = metadata.weight.map(|weight| weight * quantity);
            metadata.total_length_meters =
                metadata.total_length.map(|length| length * quantity / 1000.0);
        }
        None => warnings.push(ParseWarning::MissingHeader),
    }

    metadata.type_label = entry
        .type_code()
        .and_then(TypeCode::display_label)
        .map(str::to_string)
        .or_else(|| (!metadata.shape_type.is_empty()).then(|| metadata.shape_type.clone()))
        .unwrap_or_else(|| entry.type_code.clone());

    let type_part = metadata.type_label.to_uppercase();
    metadata.item_id = [
        metadata.project.as_str(),
        metadata.plan.as_str(),
        type_part.as_str(),
        metadata.position.as_str(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("-");

    entry.metadata = metadata;
    entry.warnings.extend(warnings);
}

/// 读取某键在全部几何块中的数值，按块顺序拼接；无效值计数。
fn collect_numbers(blocks: &[&Block], key: char) -> (Vec<f64>, usize) {
    let mut values = Vec::new();
    let mut invalid = 0;
    for block in blocks {
        for item in block.items(key) {
            match parse_number(item) {
                Some(value) => values.push(value),
                None => invalid += 1,
            }
        }
    }
    (values, invalid)
}

fn assemble_segments(entry: &mut Entry) {
    let geometry_blocks: Vec<&Block> = entry
        .blocks
        .iter()
        .filter(|block| block.marker.carries_geometry())
        .collect();

    let mut warnings = Vec::new();
    let mut segments = None;

    if !geometry_blocks.is_empty() {
        let (lengths, invalid_lengths) = collect_numbers(&geometry_blocks, 'l');
        let (angles, invalid_angles) = collect_numbers(&geometry_blocks, 'w');
        let (radii, _) = collect_numbers(&geometry_blocks, 'r');

        if lengths.is_empty() {
            warnings.push(ParseWarning::NoValidLengths);
        } else {
            for (key, count) in [('l', invalid_lengths), ('w', invalid_angles)] {
                if count > 0 {
                    warnings.push(ParseWarning::Field(FieldError {
                        marker: BlockMarker::Geometry.as_char(),
                        key,
                        count,
                    }));
                }
            }
            segments = Some(build_segments(
                &lengths,
                &angles,
                &radii,
                entry.metadata.effective_roll_radius(),
            ));
        }
    }

    match segments {
        Some(segments) => {
            let metadata = &mut entry.metadata;
            metadata.max_segment_length = segments
                .iter()
                .map(|segment| segment.length)
                .reduce(f64::max)
                .or(metadata.total_length);
            metadata.bend_count = segments
                .iter()
                .take(segments.len().saturating_sub(1))
                .filter(|segment| segment.has_bend())
                .count();
            entry.segments = Some(segments);
            entry.has_geometry = true;
        }
        None => {
            entry.metadata.max_segment_length = entry.metadata.total_length;
            warnings.push(ParseWarning::NoGeometry);
        }
    }

    entry.warnings.extend(warnings);
}

/// 由并列的长度、角度、半径列表构造腿段。角度符号决定方向，末段角度为 0。
fn build_segments(lengths: &[f64], angles: &[f64], radii: &[f64], roll_radius: f64) -> Vec<Segment> {
    let last_index = lengths.len() - 1;
    lengths
        .iter()
        .enumerate()
        .map(|(index, &length)| {
            let raw_angle = if index < last_index {
                angles.get(index).copied().unwrap_or(0.0)
            } else {
                0.0
            };
            let bend_angle = raw_angle.abs();
            let radius = if bend_angle > 0.0 {
                match radii.get(index) {
                    Some(&explicit) => enforce_minimum_radius(explicit, roll_radius),
                    None => roll_radius,
                }
            } else {
                0.0
            };
            Segment {
                length: if length > 0.0 { length } else { 0.0 },
                bend_angle,
                bend_direction: BendDirection::from_signed_angle(raw_angle),
                radius,
            }
        })
        .collect()
}

fn verify_checksum(entry: &mut Entry, line: &str) {
    let Some(block) = entry
        .blocks
        .iter()
        .rev()
        .find(|block| block.marker == BlockMarker::Checksum)
    else {
        return;
    };
    let payload = block.checksum.as_deref().unwrap_or_default();
    let marker_end = block.offset + BlockMarker::Checksum.as_char().len_utf8();
    let status = checksum::verify(payload, &line[..block.offset], &line[..marker_end]);

    if let ChecksumStatus::Mismatch {
        found,
        expected_modulo256,
        expected_legacy,
    } = &status
    {
        debug!(
            source_index = entry.source_index,
            found = %found,
            "BVBS 校验和不匹配"
        );
        entry.warnings.push(ParseWarning::ChecksumMismatch {
            found: found.clone(),
            expected_modulo256: expected_modulo256.clone(),
            expected_legacy: *expected_legacy,
        });
    }
    entry.checksum = status;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumScheme;

    const LEGACY_LINE: &str =
        "BF2D@Hj1@r2@p7@l1800@n10@e1.6@d12@gB500B@s48@v@Gl800@w90@l400@w90@l600@w0@C";

    fn with_legacy_checksum(pre: &str) -> String {
        format!("{pre}{}@", checksum::checksum_legacy(pre))
    }

    #[test]
    fn parses_header_and_geometry() {
        let entry = parse_line(&with_legacy_checksum(LEGACY_LINE));
        assert!(entry.start_valid);
        assert!(entry.errors.is_empty(), "errors: {:?}", entry.errors);
        assert!(entry.warnings.is_empty(), "warnings: {:?}", entry.warnings);
        assert_eq!(entry.type_code, "BF2D");
        assert_eq!(entry.metadata.position, "7");
        assert_eq!(entry.metadata.steel_grade, "B500B");
        assert_eq!(entry.metadata.diameter, Some(12.0));
        assert_eq!(entry.metadata.roll_diameter, Some(48.0));
        assert_eq!(entry.metadata.quantity, 10);
        assert_eq!(entry.metadata.type_label, "BWS");
        assert_eq!(entry.metadata.item_id, "1-2-BWS-7");
        assert_eq!(entry.metadata.bend_count, 2);
        assert_eq!(entry.metadata.max_segment_length, Some(800.0));
        assert_eq!(entry.metadata.total_length_meters, Some(18.0));

        let segments = entry.segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].bend_angle, 90.0);
        assert_eq!(segments[0].radius, 24.0);
        assert_eq!(segments[2].bend_angle, 0.0);
        assert_eq!(segments[2].radius, 0.0);
        assert_eq!(
            entry.checksum,
            ChecksumStatus::Valid {
                scheme: ChecksumScheme::Legacy
            }
        );
        assert!(entry.is_previewable());
    }

    #[test]
    fn negative_angles_bend_right() {
        let entry = parse_line("BF2D@Hd10@Gl100@w-45@l50@w30@");
        let segments = entry.segments();
        assert_eq!(segments[0].bend_direction, BendDirection::Right);
        assert_eq!(segments[0].bend_angle, 45.0);
        // 末段角度被强制为 0。
        assert_eq!(segments[1].bend_angle, 0.0);
        // 无辊直径时按 4d 估算：半径 20。
        assert_eq!(segments[0].radius, 20.0);
    }

    #[test]
    fn missing_header_is_a_warning() {
        let entry = parse_line("BF2D@Gl100@w90@l100@");
        assert!(entry.errors.is_empty());
        assert!(entry.warnings.contains(&ParseWarning::MissingHeader));
        assert_eq!(entry.metadata.diameter, None);
        assert_eq!(entry.metadata.quantity, 1);
        assert!(entry.has_geometry);
        // 没有任何直径信息时弯折为尖角。
        assert_eq!(entry.segments()[0].radius, 0.0);
    }

    #[test]
    fn missing_geometry_is_not_fatal() {
        let entry = parse_line("BF2D@Hp1@d12@");
        assert!(!entry.has_geometry);
        assert!(entry.segments.is_none());
        assert!(entry.warnings.contains(&ParseWarning::NoGeometry));
        assert!(entry.errors.is_empty());

        let entry = parse_line("BF2D@Hp1@Gw90@");
        assert!(entry.warnings.contains(&ParseWarning::NoValidLengths));
        assert!(entry.warnings.contains(&ParseWarning::NoGeometry));
    }

    #[test]
    fn multiple_geometry_blocks_are_concatenated() {
        let entry = parse_line("BF2D@Hd8@f32@Gl100@w90@Gl200@w-90@Gl300@");
        let segments = entry.segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].length, 200.0);
        assert_eq!(segments[1].bend_direction, BendDirection::Right);
        assert_eq!(segments[0].radius, 16.0);
    }

    #[test]
    fn invalid_values_are_counted() {
        let entry = parse_line("BF2D@Hd12@nabc@Gl100@wx@lfoo@l200@");
        assert!(entry.warnings.contains(&ParseWarning::Field(FieldError {
            marker: 'G',
            key: 'l',
            count: 1,
        })));
        assert!(entry.warnings.contains(&ParseWarning::Field(FieldError {
            marker: 'G',
            key: 'w',
            count: 1,
        })));
        assert!(entry.warnings.contains(&ParseWarning::Field(FieldError {
            marker: 'H',
            key: 'n',
            count: 1,
        })));
        assert_eq!(entry.segments().len(), 2);
        assert_eq!(entry.segments()[0].bend_angle, 0.0);
    }

    #[test]
    fn explicit_radius_is_raised_to_roll_radius() {
        let entry = parse_line("BF2D@Hd12@s48@Gl100@w90@r10@Gl100@w90@r40@Gl100@");
        let segments = entry.segments();
        assert_eq!(segments[0].radius, 24.0);
        assert_eq!(segments[1].radius, 40.0);
    }

    #[test]
    fn invalid_start_is_flagged_but_parsed() {
        let entry = parse_line("QQ12@Hp1@Gl100@w90@l100@");
        assert!(!entry.start_valid);
        assert_eq!(entry.type_code, "QQ12");
        assert!(matches!(
            entry.errors[0],
            StructuralError::InvalidStartMarker { .. }
        ));
        assert!(entry.has_geometry);
        assert!(!entry.is_previewable());
    }

    #[test]
    fn empty_and_blockless_lines() {
        let entry = parse_line("   ");
        assert!(!entry.start_valid);
        assert_eq!(entry.errors, vec![StructuralError::EmptyRecord]);

        let entry = parse_line("BF2D@");
        assert!(entry.start_valid);
        assert_eq!(entry.errors, vec![StructuralError::NoBlocks]);
    }

    #[test]
    fn incomplete_block_is_propagated() {
        let entry = parse_line("BF2D@Hp1@ 12 @Gl100@l50@");
        assert_eq!(entry.errors.len(), 1);
        assert!(matches!(
            entry.errors[0],
            StructuralError::IncompleteBlock { marker: 'H', .. }
        ));
        assert!(entry.has_geometry);
    }

    #[test]
    fn checksum_mismatch_is_reported_not_rejected() {
        let line = format!("{LEGACY_LINE}ZZ@");
        let entry = parse_line(&line);
        assert!(matches!(entry.checksum, ChecksumStatus::Mismatch { .. }));
        assert!(
            entry
                .warnings
                .iter()
                .any(|warning| matches!(warning, ParseWarning::ChecksumMismatch { .. }))
        );
        assert!(entry.has_geometry);
    }

    #[test]
    fn content_skips_blank_lines_and_keeps_indices() {
        let text = "BF2D@Hp1@Gl1@l2@\r\n\r\n  \nBF2D@Hp2@Gl3@l4@\rBF2D@Hp3@";
        let entries = parse_content(text);
        let indices: Vec<usize> = entries.iter().map(|entry| entry.source_index).collect();
        assert_eq!(indices, vec![0, 3, 4]);
        assert_eq!(entries[1].metadata.position, "2");
    }

    #[test]
    fn roll_diameter_falls_back_to_s_field() {
        let entry = parse_line("BF2D@Hf0@s40@d10@Gl1@l1@");
        assert_eq!(entry.metadata.roll_diameter, Some(40.0));
        let entry = parse_line("BF2D@Hf50@s40@d10@Gl1@l1@");
        assert_eq!(entry.metadata.roll_diameter, Some(50.0));
    }
}
