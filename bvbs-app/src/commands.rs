use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use bvbs_config::{AppConfig, EncoderVariant, TessellationConfig};
use bvbs_core::{
    Geometry, TessellationSettings, reconstruct_geometry_with,
    shape::{BendDirection, Segment},
};
use bvbs_io::{
    BvbsFacade, ChecksumScheme, ChecksumStatus, Entry, EntryLoader, FormatVariant, Shape,
    ShapeMetadata, ShapeSaver, ValidationError,
    coercion::{format_trimmed, parse_number},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// 未指定弯曲辊直径时使用的倍数。
const DEFAULT_ROLL_FACTOR: f64 = 4.0;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid segment {spec:?}: {reason}")]
    InvalidSegment { spec: String, reason: &'static str },
    #[error("shape rejected: {}", describe_errors(.errors))]
    Rejected { errors: Vec<ValidationError> },
    #[error("{count} record(s) failed checksum verification")]
    ChecksumFailures { count: usize },
}

fn describe_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 命令行中的一条腿：`LEN[:ANGLE[:L|R[:RADIUS]]]`。
///
/// 未给出方向时由角度符号决定，角度取绝对值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentArg(pub Segment);

impl FromStr for SegmentArg {
    type Err = AppError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| AppError::InvalidSegment {
            spec: spec.to_string(),
            reason,
        };
        let mut parts = spec.split(':').map(str::trim);

        let length = parts
            .next()
            .and_then(parse_number)
            .ok_or_else(|| invalid("length is not a number"))?;
        let angle = match parts.next() {
            Some(raw) => parse_number(raw).ok_or_else(|| invalid("angle is not a number"))?,
            None => 0.0,
        };
        let (bend_angle, bend_direction) = match parts.next().filter(|raw| !raw.is_empty()) {
            Some(raw) => {
                let mut chars = raw.chars();
                let direction = chars
                    .next()
                    .and_then(BendDirection::from_char)
                    .filter(|_| chars.next().is_none())
                    .ok_or_else(|| invalid("direction must be L or R"))?;
                (angle, direction)
            }
            None => (angle.abs(), BendDirection::from_signed_angle(angle)),
        };
        let radius = match parts.next() {
            Some(raw) => parse_number(raw).ok_or_else(|| invalid("radius is not a number"))?,
            None => 0.0,
        };
        if parts.next().is_some() {
            return Err(invalid("too many components"));
        }

        Ok(SegmentArg(Segment::new(
            length,
            bend_angle,
            bend_direction,
            radius,
        )))
    }
}

pub struct EncodeArgs {
    pub diameter: f64,
    pub roll_diameter: Option<f64>,
    pub quantity: i64,
    pub project: String,
    pub plan: String,
    pub order: String,
    pub position: String,
    pub grade: String,
    pub remark: String,
    pub segments: Vec<SegmentArg>,
    pub variant: Option<FormatVariant>,
    pub output: Option<PathBuf>,
}

fn configured_variant(config: &AppConfig) -> FormatVariant {
    match config.encoder.variant {
        EncoderVariant::Abs => FormatVariant::Abs,
        EncoderVariant::Legacy => FormatVariant::Legacy,
    }
}

fn tessellation_settings(config: &TessellationConfig) -> TessellationSettings {
    TessellationSettings {
        degrees_per_step: config.degrees_per_step,
        min_steps: config.min_steps,
        max_steps: config.max_steps,
        padding_fraction: config.padding_fraction,
        min_padding: config.min_padding,
    }
}

fn load_entries(path: &Path) -> Result<Vec<Entry>> {
    BvbsFacade::new()
        .load(path)
        .with_context(|| format!("无法读取 {}", path.display()))
}

fn optional(value: Option<f64>) -> String {
    value
        .map(|value| format_trimmed(value, 3))
        .unwrap_or_else(|| "-".to_string())
}

fn describe_checksum(status: &ChecksumStatus) -> String {
    match status {
        ChecksumStatus::Missing => "missing".to_string(),
        ChecksumStatus::Valid { scheme } => match scheme {
            ChecksumScheme::Modulo256 => "valid (modulo-256)".to_string(),
            ChecksumScheme::Legacy => "valid (legacy)".to_string(),
        },
        ChecksumStatus::Mismatch {
            found,
            expected_modulo256,
            expected_legacy,
        } => format!("mismatch (found {found}, expected {expected_modulo256} or {expected_legacy})"),
    }
}

pub fn parse(path: &Path, json: bool) -> Result<()> {
    let entries = load_entries(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let mut report = String::new();
    for entry in &entries {
        let metadata = &entry.metadata;
        let id = if metadata.item_id.is_empty() {
            "(unnamed)"
        } else {
            metadata.item_id.as_str()
        };
        writeln!(
            report,
            "#{} {id} type={} d={} n={} length={} segments={} checksum={}",
            entry.source_index + 1,
            metadata.type_label,
            optional(metadata.diameter),
            metadata.quantity,
            optional(metadata.total_length),
            entry.segments().len(),
            describe_checksum(&entry.checksum),
        )?;
        for error in &entry.errors {
            writeln!(report, "  error: {error}")?;
        }
        for warning in &entry.warnings {
            writeln!(report, "  warning: {warning}")?;
        }
    }
    let failing = entries.iter().filter(|entry| !entry.errors.is_empty()).count();
    writeln!(
        report,
        "{} record(s), {failing} with errors",
        entries.len()
    )?;
    print!("{report}");
    Ok(())
}

pub fn verify(path: &Path) -> Result<()> {
    let entries = load_entries(path)?;
    let mut failures = 0;
    for entry in &entries {
        if matches!(entry.checksum, ChecksumStatus::Mismatch { .. }) {
            failures += 1;
        }
        println!(
            "#{} {}",
            entry.source_index + 1,
            describe_checksum(&entry.checksum)
        );
    }
    info!(records = entries.len(), failures, "校验完成");
    if failures > 0 {
        bail!(AppError::ChecksumFailures { count: failures });
    }
    Ok(())
}

pub fn encode(config: &AppConfig, args: EncodeArgs) -> Result<()> {
    let roll_diameter = args
        .roll_diameter
        .unwrap_or(args.diameter * DEFAULT_ROLL_FACTOR);
    let metadata = ShapeMetadata {
        project: args.project,
        plan: args.plan,
        order: args.order,
        position: args.position,
        remark: args.remark,
        steel_grade: args.grade,
        diameter: args.diameter,
        roll_diameter,
        quantity: args.quantity,
    };
    let segments = args.segments.into_iter().map(|arg| arg.0).collect();
    let shape = Shape::new(metadata, segments);
    let variant = args.variant.unwrap_or_else(|| configured_variant(config));

    let report = shape.report();
    debug!(
        total_length = report.summary.total_length,
        weight = report.summary.weight_per_bar,
        "形状汇总"
    );
    if !report.is_valid() {
        bail!(AppError::Rejected {
            errors: report.errors
        });
    }

    match args.output {
        Some(path) => {
            BvbsFacade::with_variant(variant)
                .save(std::slice::from_ref(&shape), &path)
                .with_context(|| format!("无法写出 {}", path.display()))?;
        }
        None => {
            let line = shape
                .encode(variant)
                .map_err(|errors| AppError::Rejected { errors })?;
            println!("{line}");
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct GeometryRecord<'a> {
    source_index: usize,
    item_id: &'a str,
    geometry: Option<Geometry>,
}

pub fn geometry(config: &AppConfig, path: &Path, json: bool) -> Result<()> {
    let entries = load_entries(path)?;
    let settings = tessellation_settings(&config.tessellation);
    let records: Vec<GeometryRecord<'_>> = entries
        .iter()
        .map(|entry| GeometryRecord {
            source_index: entry.source_index,
            item_id: &entry.metadata.item_id,
            geometry: entry
                .is_previewable()
                .then(|| reconstruct_geometry_with(entry.segments(), &settings))
                .filter(|geometry| !geometry.is_empty()),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for record in &records {
        match &record.geometry {
            Some(geometry) => {
                let view = geometry.view_box;
                println!(
                    "#{} {} viewBox=\"{} {} {} {}\"",
                    record.source_index + 1,
                    record.item_id,
                    format_trimmed(view.x, 2),
                    format_trimmed(view.y, 2),
                    format_trimmed(view.width, 2),
                    format_trimmed(view.height, 2),
                );
                println!("  {}", geometry.svg_path_data());
            }
            None => println!("#{} {} no preview", record.source_index + 1, record.item_id),
        }
    }
    Ok(())
}
