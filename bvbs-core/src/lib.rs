pub mod inverse;
pub mod reconstruct;

pub use inverse::build_segments_from_points;
pub use reconstruct::{
    BendGeometry, Geometry, LegGeometry, TessellationSettings, ViewBox, reconstruct_geometry,
    reconstruct_geometry_with,
};

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        pub const ORIGIN: Point2 = Point2(DVec2::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        /// 数学坐标（y 向上）与屏幕坐标（y 向下）之间的互换。
        #[inline]
        pub fn flip_y(self) -> Self {
            Self::new(self.0.x, -self.0.y)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        /// 指定角度（弧度，从 +x 轴逆时针）方向上的单位向量。
        #[inline]
        pub fn from_angle(radians: f64) -> Self {
            Self(DVec2::new(radians.cos(), radians.sin()))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        /// 左手法向量（逆时针旋转 90°）。
        #[inline]
        pub fn left_normal(self) -> Self {
            Self(self.0.perp())
        }

        /// 相对 +x 轴的方位角，范围 (-π, π]。
        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn flip_y(self) -> Self {
            Self::new(self.0.x, -self.0.y)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    /// 轴对齐边界框，用于估算路径范围与视图框。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        /// 收集一组点的范围；空迭代器返回空边界框。
        pub fn from_points<I>(points: I) -> Self
        where
            I: IntoIterator<Item = Point2>,
        {
            let mut bounds = Self::empty();
            for point in points {
                bounds.include_point(point);
            }
            bounds
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.x() - self.min.x()
            }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.y() - self.min.y()
            }
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }
    }
}

pub mod shape {
    use serde::{Deserialize, Serialize};

    /// 弯折方向。`Left` 为数学意义上的逆时针。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub enum BendDirection {
        #[default]
        Left,
        Right,
    }

    impl BendDirection {
        /// 带符号角度的符号位：非负为左弯，负为右弯。
        #[inline]
        pub fn from_signed_angle(angle: f64) -> Self {
            if angle < 0.0 {
                BendDirection::Right
            } else {
                BendDirection::Left
            }
        }

        #[inline]
        pub fn sign(self) -> f64 {
            match self {
                BendDirection::Left => 1.0,
                BendDirection::Right => -1.0,
            }
        }

        #[inline]
        pub fn as_char(self) -> char {
            match self {
                BendDirection::Left => 'L',
                BendDirection::Right => 'R',
            }
        }

        pub fn from_char(ch: char) -> Option<Self> {
            match ch.to_ascii_uppercase() {
                'L' => Some(BendDirection::Left),
                'R' => Some(BendDirection::Right),
                _ => None,
            }
        }
    }

    /// 一段直线腿及其末端的弯折。
    ///
    /// 最后一段没有弯折：`bend_angle` 与 `radius` 恒为 0，见 [`enforce_last_segment`]。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Segment {
        /// 直线长度（mm）。
        pub length: f64,
        /// 弯折角度（度），范围 [0, 180]。
        pub bend_angle: f64,
        pub bend_direction: BendDirection,
        /// 弯折半径（mm）。0 表示尖角。
        pub radius: f64,
    }

    impl Segment {
        #[inline]
        pub fn new(length: f64, bend_angle: f64, bend_direction: BendDirection, radius: f64) -> Self {
            Self {
                length,
                bend_angle,
                bend_direction,
                radius,
            }
        }

        /// 无弯折的直线段。
        #[inline]
        pub fn straight(length: f64) -> Self {
            Self::new(length, 0.0, BendDirection::Left, 0.0)
        }

        /// 带方向的弯折角（度）：左弯为正，右弯为负。
        #[inline]
        pub fn signed_angle(&self) -> f64 {
            self.bend_angle * self.bend_direction.sign()
        }

        #[inline]
        pub fn has_bend(&self) -> bool {
            self.bend_angle > 0.0
        }
    }

    /// 弯曲辊直径换算为半径；非正值或非有限值视为无辊。
    #[inline]
    pub fn roll_radius(roll_diameter: f64) -> f64 {
        if roll_diameter.is_finite() && roll_diameter > 0.0 {
            roll_diameter / 2.0
        } else {
            0.0
        }
    }

    /// 半径不得小于弯曲辊半径；非正半径表示尖角，保持为 0。
    pub fn enforce_minimum_radius(radius: f64, roll_radius: f64) -> f64 {
        if !radius.is_finite() || radius <= 0.0 {
            return 0.0;
        }
        if roll_radius > 0.0 && radius < roll_radius {
            roll_radius
        } else {
            radius
        }
    }

    /// 重新施加末段约束：最后一段的角度与半径归零。
    pub fn enforce_last_segment(segments: &mut [Segment]) {
        if let Some(last) = segments.last_mut() {
            last.bend_angle = 0.0;
            last.radius = 0.0;
        }
    }

    /// 按弯曲辊直径重设每个弯折的半径。末段与零角度弯折的半径为 0。
    pub fn apply_roll_diameter(segments: &mut [Segment], roll_diameter: f64) {
        let radius = roll_radius(roll_diameter);
        let last_index = segments.len().saturating_sub(1);
        for (index, segment) in segments.iter_mut().enumerate() {
            segment.radius = if index == last_index || segment.bend_angle <= 0.0 {
                0.0
            } else {
                radius
            };
        }
    }
}

pub mod summary {
    use serde::{Deserialize, Serialize};

    use crate::shape::{Segment, roll_radius};

    /// 每米重量的经验系数：`d² / 162` kg/m（d 以 mm 计）。
    pub const WEIGHT_DIVISOR: f64 = 162.0;

    /// 长度与重量汇总。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct ShapeSummary {
        pub straight_length: f64,
        pub arc_length: f64,
        pub total_length: f64,
        pub bend_count: usize,
        pub weight_per_meter: f64,
        pub weight_per_bar: f64,
        pub total_weight: f64,
    }

    /// 计算直线长度、按弯曲辊半径展开的弧长以及重量。
    ///
    /// 末段的角度不参与计算；非正长度不计入直线长度。
    pub fn summarize(
        segments: &[Segment],
        diameter: f64,
        roll_diameter: f64,
        quantity: f64,
    ) -> ShapeSummary {
        let radius = roll_radius(roll_diameter);
        let last_index = segments.len().saturating_sub(1);
        let mut summary = ShapeSummary::default();

        for (index, segment) in segments.iter().enumerate() {
            if segment.length.is_finite() && segment.length > 0.0 {
                summary.straight_length += segment.length;
            }
            if index == last_index || !segment.has_bend() {
                continue;
            }
            summary.bend_count += 1;
            if radius > 0.0 {
                summary.arc_length += segment.bend_angle.abs().to_radians() * radius;
            }
        }

        summary.total_length = summary.straight_length + summary.arc_length;
        summary.weight_per_meter = if diameter.is_finite() {
            diameter * diameter / WEIGHT_DIVISOR
        } else {
            0.0
        };
        summary.weight_per_bar = summary.weight_per_meter * summary.total_length / 1000.0;
        summary.total_weight = summary.weight_per_bar * quantity.max(0.0);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::geometry::{Bounds2D, Point2, Vector2};
    use super::shape::{
        BendDirection, Segment, apply_roll_diameter, enforce_last_segment, enforce_minimum_radius,
    };
    use super::summary::summarize;

    fn stirrup() -> Vec<Segment> {
        vec![
            Segment::new(800.0, 90.0, BendDirection::Left, 24.0),
            Segment::new(400.0, 90.0, BendDirection::Left, 24.0),
            Segment::new(600.0, 0.0, BendDirection::Left, 0.0),
        ]
    }

    #[test]
    fn bounds_track_extremes() {
        let bounds = Bounds2D::from_points([
            Point2::new(1.0, -2.0),
            Point2::new(-3.0, 4.0),
            Point2::new(0.5, 0.5),
        ]);
        assert!((bounds.min().x() + 3.0).abs() < 1e-12);
        assert!((bounds.min().y() + 2.0).abs() < 1e-12);
        assert!((bounds.width() - 4.0).abs() < 1e-12);
        assert!((bounds.height() - 6.0).abs() < 1e-12);
        assert!(Bounds2D::from_points(std::iter::empty()).is_empty());
    }

    #[test]
    fn left_normal_rotates_counter_clockwise() {
        let normal = Vector2::new(1.0, 0.0).left_normal();
        assert!(normal.x().abs() < 1e-12);
        assert!((normal.y() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn direction_follows_angle_sign() {
        assert_eq!(BendDirection::from_signed_angle(0.0), BendDirection::Left);
        assert_eq!(BendDirection::from_signed_angle(45.0), BendDirection::Left);
        assert_eq!(BendDirection::from_signed_angle(-45.0), BendDirection::Right);
        assert_eq!(BendDirection::from_char('r'), Some(BendDirection::Right));
        assert_eq!(BendDirection::from_char('x'), None);
    }

    #[test]
    fn last_segment_is_reset() {
        let mut segments = vec![
            Segment::new(100.0, 90.0, BendDirection::Right, 20.0),
            Segment::new(100.0, 45.0, BendDirection::Right, 20.0),
        ];
        enforce_last_segment(&mut segments);
        assert_eq!(segments[1].bend_angle, 0.0);
        assert_eq!(segments[1].radius, 0.0);
        assert_eq!(segments[0].bend_angle, 90.0);
    }

    #[test]
    fn roll_diameter_sets_bend_radius() {
        let mut segments = stirrup();
        segments[1].bend_angle = 0.0;
        apply_roll_diameter(&mut segments, 64.0);
        assert_eq!(segments[0].radius, 32.0);
        assert_eq!(segments[1].radius, 0.0);
        assert_eq!(segments[2].radius, 0.0);
    }

    #[test]
    fn minimum_radius_follows_roll() {
        assert_eq!(enforce_minimum_radius(10.0, 24.0), 24.0);
        assert_eq!(enforce_minimum_radius(30.0, 24.0), 30.0);
        assert_eq!(enforce_minimum_radius(0.0, 24.0), 0.0);
        assert_eq!(enforce_minimum_radius(f64::NAN, 24.0), 0.0);
    }

    #[test]
    fn summary_matches_reference_stirrup() {
        let summary = summarize(&stirrup(), 12.0, 48.0, 10.0);
        let arc = std::f64::consts::FRAC_PI_2 * 24.0 * 2.0;
        assert!((summary.straight_length - 1800.0).abs() < 1e-9);
        assert!((summary.arc_length - arc).abs() < 1e-9);
        assert!((summary.total_length - 1875.398).abs() < 1e-3);
        assert_eq!(summary.bend_count, 2);
        let per_meter = 144.0 / 162.0;
        assert!((summary.weight_per_meter - per_meter).abs() < 1e-12);
        assert!((summary.total_weight - summary.weight_per_bar * 10.0).abs() < 1e-12);
    }

    #[test]
    fn segment_json_uses_field_names() {
        let segment = Segment::new(800.0, 90.0, BendDirection::Right, 24.0);
        let value = serde_json::to_value(segment).expect("序列化腿段失败");
        assert_eq!(value["length"], 800.0);
        assert_eq!(value["bend_direction"], "Right");
        let restored: Segment = serde_json::from_value(value).expect("反序列化腿段失败");
        assert_eq!(restored, segment);
    }

    #[test]
    fn point_serializes_as_coordinate_pair() {
        let json = serde_json::to_string(&Point2::new(1.5, -2.0)).expect("序列化点失败");
        assert_eq!(json, "[1.5,-2.0]");
    }

    #[test]
    fn summary_ignores_terminal_angle() {
        let mut segments = stirrup();
        segments[2].bend_angle = 90.0;
        let summary = summarize(&segments, 12.0, 48.0, 1.0);
        assert_eq!(summary.bend_count, 2);
    }
}
