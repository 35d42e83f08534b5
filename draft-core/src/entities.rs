use serde::{Deserialize, Serialize};

use crate::errors::GeometryError;
use crate::geometry::{ArcSegment, Bounds2D, Point, get_bulge_from_segment};
use crate::snap::{SnapKind, SnapPoint, SnapSettings, within_nearest_threshold};

pub const DEFAULT_LAYER: &str = "0";
pub const DEFAULT_LINE_WIDTH: f64 = 2.0;

/// 组码 70 的第 0 位：闭合多段线。
pub const CLOSED_FLAG: i32 = 0x01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Line(Line),
    Polyline(Polyline),
}

impl Entity {
    pub fn layer_name(&self) -> &str {
        match self {
            Entity::Line(line) => &line.layer,
            Entity::Polyline(polyline) => &polyline.layer,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Line(_) => "LINE",
            Entity::Polyline(_) => "POLYLINE",
        }
    }

    pub fn bounding_box(&self) -> Bounds2D {
        match self {
            Entity::Line(line) => line.bounding_box(),
            Entity::Polyline(polyline) => polyline.bounding_box(),
        }
    }

    pub fn closest_point(&self, point: Point) -> (Point, f64) {
        match self {
            Entity::Line(line) => line.closest_point(point),
            Entity::Polyline(polyline) => polyline.closest_point(point),
        }
    }

    pub fn snaps(&self, mouse: Point, delta: f64, settings: &SnapSettings) -> Vec<SnapPoint> {
        match self {
            Entity::Line(line) => line.snaps(mouse, delta, settings),
            Entity::Polyline(polyline) => polyline.snaps(mouse, delta, settings),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point,
    pub end: Point,
    pub layer: String,
    pub line_width: f64,
}

impl Line {
    pub fn new(start: Point, end: Point, layer: impl Into<String>) -> Self {
        Self {
            start: start.position(),
            end: end.position(),
            layer: layer.into(),
            line_width: DEFAULT_LINE_WIDTH,
        }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    #[inline]
    pub fn mid_point(&self) -> Point {
        self.start.mid_point(self.end)
    }

    pub fn closest_point(&self, point: Point) -> (Point, f64) {
        let closest = point.closest_point_on_line(self.start, self.end);
        (closest, point.distance(closest))
    }

    pub fn bounding_box(&self) -> Bounds2D {
        let mut bounds = Bounds2D::empty();
        bounds.include_point(self.start);
        bounds.include_point(self.end);
        bounds
    }

    pub fn snaps(&self, mouse: Point, delta: f64, settings: &SnapSettings) -> Vec<SnapPoint> {
        let mut snaps = Vec::new();
        if settings.end {
            snaps.push(SnapPoint::new(self.start, SnapKind::End));
            snaps.push(SnapPoint::new(self.end, SnapKind::End));
        }
        if settings.mid {
            snaps.push(SnapPoint::new(self.mid_point(), SnapKind::Mid));
        }
        if settings.nearest {
            let (closest, distance) = self.closest_point(mouse);
            if within_nearest_threshold(distance, delta) {
                snaps.push(SnapPoint::new(closest, SnapKind::Nearest));
            }
        }
        snaps
    }

    /// 供其他实体修剪/延伸时使用的候选点：两个端点。
    pub fn intersect_points(&self) -> [Point; 2] {
        [self.start, self.end]
    }

    /// 把靠近 `pick` 的端点沿直线方向延伸到最近的候选点。
    ///
    /// 只接受位于该端点外侧延长线上的候选点；没有可用候选点时返回 `false`，直线不变。
    pub fn extend(&mut self, candidates: &[Point], pick: Point) -> bool {
        let from_start = self.start.distance(pick) < self.end.distance(pick);
        let (origin, other) = if from_start {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        };
        let Some(direction) = (origin.as_vec2() - other.as_vec2()).try_normalize() else {
            return false;
        };
        let tolerance = self.tolerance();

        let target = candidates
            .iter()
            .filter_map(|candidate| {
                let offset = candidate.as_vec2() - origin.as_vec2();
                let along = offset.dot(direction);
                let across = offset.perp_dot(direction).abs();
                (along > tolerance && across <= tolerance).then_some((along, *candidate))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));

        let Some((_, target)) = target else {
            return false;
        };
        let target = Point {
            z: origin.z,
            ..target.position()
        };
        if from_start {
            self.start = target;
        } else {
            self.end = target;
        }
        true
    }

    /// 以候选点为边界，删除 `pick` 所在的那一段。
    ///
    /// `pick` 两侧都有候选点时直线被截断为两段：自身保留起点一侧，返回终点一侧的新直线。
    /// 只有一侧有候选点时移动对应端点并返回 `None`；两侧都没有时直线不变。
    pub fn trim(&mut self, candidates: &[Point], pick: Point) -> Option<Line> {
        let origin = self.start.as_vec2();
        let chord = self.end.as_vec2() - origin;
        let length = chord.length();
        if length == 0.0 {
            return None;
        }
        let direction = chord / length;
        let tolerance = self.tolerance();
        let picked = (pick.as_vec2() - origin).dot(direction);

        let mut before: Option<(f64, Point)> = None;
        let mut after: Option<(f64, Point)> = None;
        for candidate in candidates {
            let offset = candidate.as_vec2() - origin;
            let along = offset.dot(direction);
            if offset.perp_dot(direction).abs() > tolerance
                || along <= tolerance
                || along >= length - tolerance
            {
                continue;
            }
            let point = Point::from_vec(origin + direction * along);
            if along < picked {
                if before.is_none_or(|(best, _)| along > best) {
                    before = Some((along, point));
                }
            } else if after.is_none_or(|(best, _)| along < best) {
                after = Some((along, point));
            }
        }

        match (before, after) {
            (Some((_, cut_start)), Some((_, cut_end))) => {
                let tail = Line {
                    start: cut_end,
                    end: self.end,
                    layer: self.layer.clone(),
                    line_width: self.line_width,
                };
                self.end = cut_start;
                Some(tail)
            }
            (Some((_, cut)), None) => {
                self.end = cut;
                None
            }
            (None, Some((_, cut))) => {
                self.start = cut;
                None
            }
            (None, None) => None,
        }
    }

    fn tolerance(&self) -> f64 {
        EDIT_TOLERANCE * self.length().max(1.0)
    }
}

/// 修剪/延伸判断候选点是否落在直线上的相对容差。
const EDIT_TOLERANCE: f64 = 1e-9;

/// 多段线的一段。圆弧当且仅当起点 bulge 非 0（零长度线段按直线处理）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line { start: Point, end: Point },
    Arc { start: Point, end: Point, arc: ArcSegment },
}

impl Segment {
    pub fn between(start: Point, end: Point) -> Self {
        match start.arc_to(end) {
            Some(arc) => Segment::Arc { start, end, arc },
            None => Segment::Line { start, end },
        }
    }

    #[inline]
    pub fn start(&self) -> Point {
        match self {
            Segment::Line { start, .. } | Segment::Arc { start, .. } => *start,
        }
    }

    #[inline]
    pub fn end(&self) -> Point {
        match self {
            Segment::Line { end, .. } | Segment::Arc { end, .. } => *end,
        }
    }

    pub fn closest_point(&self, point: Point) -> Point {
        match self {
            Segment::Line { start, end } => point.closest_point_on_line(*start, *end),
            Segment::Arc { arc, .. } => arc.closest_point(point),
        }
    }
}

/// 与绘图后端无关的路径指令，由外部渲染层翻译成具体 API 调用。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    /// 从当前点沿 `direction` 扫到 `end_angle`。
    Arc(ArcSegment),
    Close,
}

/// 交互输入模式：下一顶点以直线或圆弧连接。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmentMode {
    #[default]
    Line,
    Arc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<Point>,
    pub closed: bool,
    /// 组码 70 中除闭合位以外的其余位，几何计算不使用，仅为导出保真。
    #[serde(default)]
    pub reserved_flags: i32,
    pub layer: String,
    pub line_width: f64,
}

impl Polyline {
    pub fn new<I>(vertices: I, closed: bool, layer: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = Point>,
    {
        Self {
            vertices: vertices.into_iter().collect(),
            closed,
            reserved_flags: 0,
            layer: layer.into(),
            line_width: DEFAULT_LINE_WIDTH,
        }
    }

    /// 按 DXF 组码 70 的位标记构造。
    pub fn from_flags<I>(vertices: I, flags: i32, layer: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = Point>,
    {
        let mut polyline = Self::new(vertices, flags & CLOSED_FLAG == CLOSED_FLAG, layer);
        polyline.reserved_flags = flags & !CLOSED_FLAG;
        polyline
    }

    #[inline]
    pub fn with_line_width(mut self, line_width: f64) -> Self {
        self.line_width = line_width;
        self
    }

    /// 还原组码 70 的原始位标记。
    #[inline]
    pub fn flags(&self) -> i32 {
        let closed = if self.closed { CLOSED_FLAG } else { 0 };
        (self.reserved_flags & !CLOSED_FLAG) | closed
    }

    pub fn segment_count(&self) -> usize {
        match self.vertices.len() {
            0 | 1 => 0,
            n if self.closed => n,
            n => n - 1,
        }
    }

    /// 按顶点顺序遍历各段；闭合时最后一段为 N−1 → 0。
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        let count = self.segment_count();
        let len = self.vertices.len();
        (0..count).map(move |i| Segment::between(self.vertices[i], self.vertices[(i + 1) % len]))
    }

    pub fn path(&self) -> Vec<PathCommand> {
        let Some(first) = self.vertices.first() else {
            return Vec::new();
        };
        let mut commands = vec![PathCommand::MoveTo(first.position())];
        for segment in self.segments() {
            commands.push(match segment {
                Segment::Line { end, .. } => PathCommand::LineTo(end.position()),
                Segment::Arc { arc, .. } => PathCommand::Arc(arc),
            });
        }
        if self.closed && self.vertices.len() > 1 {
            commands.push(PathCommand::Close);
        }
        commands
    }

    /// 全部线段中距离 `point` 最近的点及距离；距离相同时取顶点顺序中较早的一段。
    /// 没有线段时返回 `(point, ∞)`。
    pub fn closest_point(&self, point: Point) -> (Point, f64) {
        let mut best = (point, f64::INFINITY);
        for segment in self.segments() {
            let candidate = segment.closest_point(point);
            let distance = point.distance(candidate);
            if distance < best.1 {
                best = (candidate, distance);
            }
        }
        best
    }

    /// 顶点坐标的范围。圆弧凸出弦外的部分不计入，属于已知的近似。
    pub fn bounding_box(&self) -> Bounds2D {
        let mut bounds = Bounds2D::empty();
        for vertex in &self.vertices {
            bounds.include_point(*vertex);
        }
        bounds
    }

    pub fn snaps(&self, mouse: Point, delta: f64, settings: &SnapSettings) -> Vec<SnapPoint> {
        let mut snaps = Vec::new();

        if settings.end {
            snaps.extend(
                self.vertices
                    .iter()
                    .map(|vertex| SnapPoint::new(*vertex, SnapKind::End)),
            );
        }

        if settings.mid {
            for segment in self.segments() {
                if let Segment::Line { start, end } = segment {
                    snaps.push(SnapPoint::new(start.mid_point(end), SnapKind::Mid));
                }
            }
        }

        if settings.centre {
            for segment in self.segments() {
                if let Segment::Arc { arc, .. } = segment {
                    snaps.push(SnapPoint::new(arc.center, SnapKind::Centre));
                }
            }
        }

        if settings.nearest {
            let (closest, distance) = self.closest_point(mouse);
            if within_nearest_threshold(distance, delta) {
                snaps.push(SnapPoint::new(closest, SnapKind::Nearest));
            }
        }

        snaps
    }

    /// 追加一个顶点。圆弧模式下根据上一段推算末顶点的 bulge，使圆弧与上一段相切。
    pub fn append_vertex(&mut self, point: Point, mode: SegmentMode) -> Result<(), GeometryError> {
        if mode == SegmentMode::Arc {
            let len = self.vertices.len();
            if len < 2 {
                return Err(GeometryError::NotEnoughVertices {
                    required: 2,
                    actual: len,
                });
            }
            let previous = self.vertices[len - 2];
            let last = self.vertices[len - 1];
            self.vertices[len - 1].bulge = get_bulge_from_segment(last, previous, point);
        }
        self.vertices.push(point.position());
        Ok(())
    }

    /// 预览：返回假设 `candidate` 被追加后的多段线，自身不变。
    pub fn preview(&self, candidate: Point, mode: SegmentMode) -> Result<Polyline, GeometryError> {
        let mut preview = self.clone();
        preview.append_vertex(candidate, mode)?;
        Ok(preview)
    }
}
