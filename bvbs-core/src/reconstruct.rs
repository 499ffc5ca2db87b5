//! 由腿段列表重建二维路径：直线段 + 细分后的圆弧。
//!
//! 路径在数学坐标系（y 向上）中构建，同时给出 y 翻转后的屏幕坐标，
//! 供预览层直接放置长度与角度标注。

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds2D, Point2, Vector2};
use crate::shape::{BendDirection, Segment};

const MIN_PADDING_FRACTION: f64 = 0.1;
const MAX_PADDING_FRACTION: f64 = 0.15;
/// 单个弯折最多细分的步数。
pub const MAX_ARC_STEPS: usize = 360;

/// 圆弧细分与视图留白参数。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TessellationSettings {
    /// 每个细分步覆盖的角度（度）。
    pub degrees_per_step: f64,
    pub min_steps: usize,
    pub max_steps: usize,
    /// 留白占路径最大边长的比例，限制在 [0.1, 0.15]。
    pub padding_fraction: f64,
    pub min_padding: f64,
}

impl Default for TessellationSettings {
    fn default() -> Self {
        Self {
            degrees_per_step: 15.0,
            min_steps: 4,
            max_steps: 16,
            padding_fraction: MIN_PADDING_FRACTION,
            min_padding: 10.0,
        }
    }
}

impl TessellationSettings {
    /// 规范化参数：步长须为正，步数上下限有序且不超过 [`MAX_ARC_STEPS`]，留白比例落在允许区间。
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let degrees_per_step = if self.degrees_per_step.is_finite() && self.degrees_per_step > 0.0
        {
            self.degrees_per_step
        } else {
            defaults.degrees_per_step
        };
        let min_steps = self.min_steps.clamp(1, MAX_ARC_STEPS);
        let max_steps = self.max_steps.clamp(min_steps, MAX_ARC_STEPS);
        let padding_fraction = if self.padding_fraction.is_finite() {
            self.padding_fraction
                .clamp(MIN_PADDING_FRACTION, MAX_PADDING_FRACTION)
        } else {
            defaults.padding_fraction
        };
        let min_padding = if self.min_padding.is_finite() && self.min_padding >= 0.0 {
            self.min_padding
        } else {
            defaults.min_padding
        };
        Self {
            degrees_per_step,
            min_steps,
            max_steps,
            padding_fraction,
            min_padding,
        }
    }

    /// 给定弯折角（度）所需的细分步数。
    pub fn arc_steps(&self, angle_deg: f64) -> usize {
        let raw = (angle_deg.abs() / self.degrees_per_step).ceil();
        let raw = if raw.is_finite() { raw as usize } else { 0 };
        raw.clamp(self.min_steps, self.max_steps)
    }
}

/// 单条直线腿的端点，分别给出数学坐标与屏幕坐标。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegGeometry {
    pub index: usize,
    pub length: f64,
    pub start: Point2,
    pub end: Point2,
    pub screen_start: Point2,
    pub screen_end: Point2,
    /// 数学坐标中的行进方向（弧度）。
    pub orientation: f64,
    /// 屏幕坐标中的方向；零长度腿为 0。
    pub screen_orientation: f64,
}

/// 单个弯折的标注锚点与圆弧信息（屏幕坐标）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BendGeometry {
    /// 弯折所属腿段的索引。
    pub index: usize,
    pub angle_deg: f64,
    pub direction: BendDirection,
    pub radius: f64,
    /// 前一直线段的末端。
    pub anchor: Point2,
    pub start_direction: Vector2,
    pub end_direction: Vector2,
    /// 圆心；尖角为 `None`。
    pub center: Option<Point2>,
    /// 圆弧细分产生的点数；尖角为 0。
    pub arc_points: usize,
}

/// 视图框（屏幕坐标），已含留白。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 重建结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// 数学坐标中的路径点，首点为原点。
    pub points: Vec<Point2>,
    pub legs: Vec<LegGeometry>,
    pub bends: Vec<BendGeometry>,
    pub bounds: Bounds2D,
    pub screen_bounds: Bounds2D,
    pub padding: f64,
    pub view_box: ViewBox,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::empty()
    }
}

impl Geometry {
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            legs: Vec::new(),
            bends: Vec::new(),
            bounds: Bounds2D::empty(),
            screen_bounds: Bounds2D::empty(),
            padding: 0.0,
            view_box: ViewBox::default(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.bounds.height()
    }

    /// 屏幕坐标下的路径点。
    pub fn screen_points(&self) -> impl Iterator<Item = Point2> + '_ {
        self.points.iter().map(|point| point.flip_y())
    }

    /// 以 `M x y L x y …` 形式输出屏幕路径，坐标保留两位小数。
    pub fn svg_path_data(&self) -> String {
        let mut data = String::new();
        for (index, point) in self.screen_points().enumerate() {
            if index > 0 {
                data.push(' ');
            }
            let command = if index == 0 { 'M' } else { 'L' };
            // 加 0.0 消除 -0.0，避免输出 "-0.00"。
            let _ = write!(data, "{command}{:.2} {:.2}", point.x() + 0.0, point.y() + 0.0);
        }
        data
    }
}

/// 使用默认细分参数重建几何。
pub fn reconstruct_geometry(segments: &[Segment]) -> Geometry {
    reconstruct_geometry_with(segments, &TessellationSettings::default())
}

/// 重建几何。少于两段时返回空几何；末段的角度与半径一律视为 0。
pub fn reconstruct_geometry_with(segments: &[Segment], settings: &TessellationSettings) -> Geometry {
    if segments.len() < 2 {
        return Geometry::empty();
    }
    let settings = settings.normalized();
    let last_index = segments.len() - 1;

    let mut orientation = 0.0_f64;
    let mut current = Point2::ORIGIN;
    let mut points = vec![current];
    let mut legs = Vec::with_capacity(segments.len());
    let mut bends = Vec::with_capacity(last_index);

    for (index, segment) in segments.iter().enumerate() {
        let length = if segment.length.is_finite() {
            segment.length.max(0.0)
        } else {
            0.0
        };
        let direction = Vector2::from_angle(orientation);
        let start = current;
        current = current.translate(direction.scale(length));
        points.push(current);

        let screen_start = start.flip_y();
        let screen_end = current.flip_y();
        let screen_vector = screen_start.vector_to(screen_end);
        let screen_orientation = if screen_vector.length() > 0.0 {
            screen_vector.angle()
        } else {
            0.0
        };
        legs.push(LegGeometry {
            index,
            length,
            start,
            end: current,
            screen_start,
            screen_end,
            orientation,
            screen_orientation,
        });

        if index == last_index || !segment.has_bend() {
            continue;
        }

        let sign = segment.bend_direction.sign();
        let signed_angle = segment.bend_angle.to_radians() * sign;
        let next_orientation = orientation + signed_angle;

        let mut bend = BendGeometry {
            index,
            angle_deg: segment.bend_angle,
            direction: segment.bend_direction,
            radius: 0.0,
            anchor: screen_end,
            start_direction: direction.flip_y(),
            end_direction: Vector2::from_angle(next_orientation).flip_y(),
            center: None,
            arc_points: 0,
        };

        if segment.radius.is_finite() && segment.radius > 0.0 {
            let radius = segment.radius;
            let center = current.translate(direction.left_normal().scale(radius * sign));
            let start_angle = center.vector_to(current).angle();
            let steps = settings.arc_steps(segment.bend_angle);
            for step in 1..=steps {
                let theta = start_angle + signed_angle * (step as f64 / steps as f64);
                points.push(center.translate(Vector2::from_angle(theta).scale(radius)));
            }
            current = points[points.len() - 1];
            bend.radius = radius;
            bend.center = Some(center.flip_y());
            bend.arc_points = steps;
        }

        bends.push(bend);
        orientation = next_orientation;
    }

    let bounds = Bounds2D::from_points(points.iter().copied());
    let screen_bounds = Bounds2D::from_points(points.iter().map(|point| point.flip_y()));
    let padding = settings
        .min_padding
        .max(bounds.width().max(bounds.height()) * settings.padding_fraction);

    let mut view_width = screen_bounds.width();
    let mut view_height = screen_bounds.height();
    if view_width <= 0.0 {
        view_width = padding * 2.0;
    }
    if view_height <= 0.0 {
        view_height = padding * 2.0;
    }
    let view_box = ViewBox {
        x: screen_bounds.min().x() - padding,
        y: screen_bounds.min().y() - padding,
        width: view_width + padding * 2.0,
        height: view_height + padding * 2.0,
    };

    Geometry {
        points,
        legs,
        bends,
        bounds,
        screen_bounds,
        padding,
        view_box,
    }
}
