pub mod entities;
pub mod snap;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    pub enum GeometryError {
        #[error("圆弧输入至少需要 {required} 个顶点（当前 {actual} 个）")]
        NotEnoughVertices { required: usize, actual: usize },
    }
}

pub mod geometry {
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点/多段线顶点。`bulge` 描述以该点为起点的线段：
    /// 0 表示直线，非 0 表示圆弧，数值为 `tan(包角 / 4)`，正值为逆时针。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Point {
        pub x: f64,
        pub y: f64,
        #[serde(default)]
        pub z: f64,
        #[serde(default)]
        pub bulge: f64,
    }

    impl Point {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self {
                x,
                y,
                z: 0.0,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(x: f64, y: f64, bulge: f64) -> Self {
            Self {
                x,
                y,
                z: 0.0,
                bulge,
            }
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self::new(vec.x, vec.y)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            DVec2::new(self.x, self.y)
        }

        /// 去掉 bulge 的纯坐标副本，用于捕捉点等不属于线段的场合。
        #[inline]
        pub fn position(self) -> Self {
            Self { bulge: 0.0, ..self }
        }

        /// 以该点为起点的线段是否为圆弧。
        #[inline]
        pub fn is_arc_start(self) -> bool {
            self.bulge != 0.0
        }

        #[inline]
        pub fn distance(self, other: Point) -> f64 {
            self.as_vec2().distance(other.as_vec2())
        }

        /// 从当前点指向 `other` 的方位角（弧度，`atan2` 取值范围）。
        #[inline]
        pub fn angle(self, other: Point) -> f64 {
            let delta = other.as_vec2() - self.as_vec2();
            delta.y.atan2(delta.x)
        }

        pub fn mid_point(self, other: Point) -> Point {
            let mid = (self.as_vec2() + other.as_vec2()) * 0.5;
            Point {
                z: (self.z + other.z) * 0.5,
                ..Point::from_vec(mid)
            }
        }

        /// 由当前点的 bulge 推导到 `next` 的圆弧半径。
        ///
        /// bulge 为 0 时线段是直线，调用即违反前置条件，会直接 panic。
        pub fn bulge_radius(self, next: Point) -> f64 {
            assert!(
                self.bulge != 0.0,
                "bulge 为 0 的线段是直线，不能计算圆弧半径"
            );
            let b = self.bulge;
            self.distance(next) * (1.0 + b * b) / (4.0 * b.abs())
        }

        /// 由当前点的 bulge 推导到 `next` 的圆弧圆心：
        /// 沿弦的左法线方向偏移 `d·(1−b²)/(4b)`，bulge 的符号决定圆心位于弦的哪一侧。
        ///
        /// bulge 为 0 时会 panic，与 [`Point::bulge_radius`] 相同。
        pub fn bulge_centre_point(self, next: Point) -> Point {
            assert!(
                self.bulge != 0.0,
                "bulge 为 0 的线段是直线，不能计算圆弧圆心"
            );
            let b = self.bulge;
            let start = self.as_vec2();
            let chord = next.as_vec2() - start;
            let length = chord.length();
            let mid = start + chord * 0.5;
            let normal = chord.perp() / length;
            let offset = length * (1.0 - b * b) / (4.0 * b);
            Point::from_vec(mid + normal * offset)
        }

        /// 以当前点为起点、`next` 为终点的圆弧描述。直线段或零长度线段返回 `None`。
        pub fn arc_to(self, next: Point) -> Option<ArcSegment> {
            if !self.is_arc_start() || self.distance(next) <= f64::EPSILON {
                return None;
            }
            let center = self.bulge_centre_point(next);
            Some(ArcSegment {
                center,
                radius: self.bulge_radius(next),
                start_angle: center.angle(self),
                end_angle: center.angle(next),
                direction: ArcDirection::from_bulge(self.bulge),
            })
        }

        /// 线段 `start`-`end` 上距离当前点最近的点；投影落在线段外时取较近的端点。
        pub fn closest_point_on_line(self, start: Point, end: Point) -> Point {
            let a = start.as_vec2();
            let ab = end.as_vec2() - a;
            let length_squared = ab.length_squared();
            if length_squared <= f64::EPSILON {
                return start.position();
            }
            let t = ((self.as_vec2() - a).dot(ab) / length_squared).clamp(0.0, 1.0);
            Point::from_vec(a + ab * t)
        }
    }

    impl From<DVec2> for Point {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ArcDirection {
        CounterClockwise,
        Clockwise,
    }

    impl ArcDirection {
        #[inline]
        pub fn from_bulge(bulge: f64) -> Self {
            if bulge < 0.0 {
                ArcDirection::Clockwise
            } else {
                ArcDirection::CounterClockwise
            }
        }

        /// +1 表示逆时针，-1 表示顺时针。
        #[inline]
        pub fn sign(self) -> f64 {
            match self {
                ArcDirection::CounterClockwise => 1.0,
                ArcDirection::Clockwise => -1.0,
            }
        }
    }

    /// 由相邻两个顶点推导出的圆弧段，不单独存储。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct ArcSegment {
        pub center: Point,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub direction: ArcDirection,
    }

    impl ArcSegment {
        /// 沿圆弧方向从起始角扫到终止角的角度，取值 `[0, 2π)`。
        pub fn included_angle(&self) -> f64 {
            match self.direction {
                ArcDirection::CounterClockwise => (self.end_angle - self.start_angle).rem_euclid(TAU),
                ArcDirection::Clockwise => (self.start_angle - self.end_angle).rem_euclid(TAU),
            }
        }

        /// 带符号的扫角，逆时针为正。
        #[inline]
        pub fn sweep(&self) -> f64 {
            self.included_angle() * self.direction.sign()
        }

        pub fn contains_angle(&self, angle: f64) -> bool {
            let offset = match self.direction {
                ArcDirection::CounterClockwise => (angle - self.start_angle).rem_euclid(TAU),
                ArcDirection::Clockwise => (self.start_angle - angle).rem_euclid(TAU),
            };
            offset <= self.included_angle() + ANGLE_TOLERANCE
        }

        pub fn point_at_angle(&self, angle: f64) -> Point {
            let offset = DVec2::from_angle(angle) * self.radius;
            Point::from_vec(self.center.as_vec2() + offset)
        }

        #[inline]
        pub fn start_point(&self) -> Point {
            self.point_at_angle(self.start_angle)
        }

        #[inline]
        pub fn end_point(&self) -> Point {
            self.point_at_angle(self.end_angle)
        }

        /// 圆弧上距离 `point` 最近的点。
        ///
        /// 先沿圆心射线投影到圆上；投影不在扫角范围内时取较近的端点（相等时取起点）。
        /// `point` 与圆心重合时所有点等距，返回起点。
        pub fn closest_point(&self, point: Point) -> Point {
            let start = self.start_point();
            let ray = point.as_vec2() - self.center.as_vec2();
            if ray.length_squared() <= f64::EPSILON {
                return start;
            }
            let angle = ray.y.atan2(ray.x);
            if self.contains_angle(angle) {
                return self.point_at_angle(angle);
            }
            let end = self.end_point();
            if point.distance(start) <= point.distance(end) {
                start
            } else {
                end
            }
        }
    }

    const ANGLE_TOLERANCE: f64 = 1e-12;

    /// 将角度归一化到 `(−π, π]`。
    pub fn wrap_angle(angle: f64) -> f64 {
        let wrapped = (angle + PI).rem_euclid(TAU) - PI;
        if wrapped <= -PI { wrapped + TAU } else { wrapped }
    }

    /// 交互绘制圆弧时使用：已知上一段 `previous`→`last`，求让圆弧从 `last`
    /// 平滑延续到 `candidate` 的 bulge。
    ///
    /// `last` 处的切线方向：上一段为圆弧时取圆心射线加上 `π/2·sign(bulge)`，
    /// 直线时取直线方位角。`candidate` 方位角与切线之差即包角的一半。
    pub fn get_bulge_from_segment(last: Point, previous: Point, candidate: Point) -> f64 {
        let tangent = match previous.arc_to(last) {
            Some(arc) => arc.center.angle(last) + FRAC_PI_2 * previous.bulge.signum(),
            None => previous.angle(last),
        };
        let half_included = wrap_angle(last.angle(candidate) - tangent);
        (half_included / 2.0).tan()
    }

    /// 轴对齐边界框，用于估算实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: DVec2,
        max: DVec2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point, max: Point) -> Self {
            Self {
                min: min.as_vec2(),
                max: max.as_vec2(),
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: DVec2::splat(f64::INFINITY),
                max: DVec2::splat(f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x > self.max.x || self.min.y > self.max.y
        }

        #[inline]
        pub fn min(&self) -> Point {
            Point::from_vec(self.min)
        }

        #[inline]
        pub fn max(&self) -> Point {
            Point::from_vec(self.max)
        }

        pub fn include_point(&mut self, point: Point) {
            let vec = point.as_vec2();
            if self.is_empty() {
                self.min = vec;
                self.max = vec;
                return;
            }
            self.min = self.min.min(vec);
            self.max = self.max.max(vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min());
            self.include_point(other.max());
        }

        /// 以 `[xmin, xmax, ymin, ymax]` 形式返回范围。
        #[inline]
        pub fn extents(&self) -> [f64; 4] {
            [self.min.x, self.max.x, self.min.y, self.max.y]
        }

        #[inline]
        pub fn center(&self) -> Point {
            debug_assert!(!self.is_empty());
            Point::from_vec((self.min + self.max) * 0.5)
        }
    }

}
