//! 由坐标点列反推腿段与弯折角。

use std::f64::consts::{PI, TAU};

use crate::geometry::Point2;
use crate::shape::{BendDirection, Segment};

/// 小于该值（度）的方向变化视为直线延续。
const ANGLE_EPSILON_DEG: f64 = 1e-6;

/// 将弧度差规整到 (-π, π]。
fn normalize_delta(mut delta: f64) -> f64 {
    while delta <= -PI {
        delta += TAU;
    }
    while delta > PI {
        delta -= TAU;
    }
    delta
}

/// 相邻点之间生成一段腿；内部顶点的转角成为前一段的弯折。
///
/// 少于两个点时返回空列表。生成的半径均为 0（尖角），末段角度强制为 0。
pub fn build_segments_from_points(points: &[Point2]) -> Vec<Segment> {
    if points.len() < 2 {
        return Vec::new();
    }

    let mut segments = Vec::with_capacity(points.len() - 1);
    let mut orientations = Vec::with_capacity(points.len() - 1);
    for pair in points.windows(2) {
        orientations.push(pair[0].vector_to(pair[1]).angle());
        segments.push(Segment::straight(pair[0].distance(pair[1])));
    }

    for index in 0..segments.len() - 1 {
        let delta = normalize_delta(orientations[index + 1] - orientations[index]);
        let mut angle_deg = delta.to_degrees().abs();
        if angle_deg < ANGLE_EPSILON_DEG {
            angle_deg = 0.0;
        }
        let segment = &mut segments[index];
        segment.bend_angle = angle_deg.min(180.0);
        segment.bend_direction = if delta < 0.0 {
            BendDirection::Right
        } else {
            BendDirection::Left
        };
    }

    if let Some(last) = segments.last_mut() {
        last.bend_angle = 0.0;
    }
    segments
}
