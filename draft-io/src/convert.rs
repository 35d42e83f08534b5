use draft_core::entities::{DEFAULT_LAYER, DEFAULT_LINE_WIDTH, Entity, Line, Polyline};

use crate::record::Record;
use crate::DxfError;

/// 把实体记录转换为几何实体；不支持的记录类型返回 `None`。
pub fn entity_from_record(record: &Record) -> Result<Option<Entity>, DxfError> {
    let entity = match record.kind() {
        Some("POLYLINE") => Entity::Polyline(polyline_from_record(record)?),
        Some("LWPOLYLINE") => Entity::Polyline(lwpolyline_from_record(record)?),
        Some("LINE") => Entity::Line(line_from_record(record)?),
        _ => return Ok(None),
    };
    Ok(Some(entity))
}

/// 图层名原样保留，仅全空白时回退到默认图层。
fn layer_of(record: &Record) -> String {
    record
        .str_field(8)
        .filter(|layer| !layer.trim().is_empty())
        .unwrap_or(DEFAULT_LAYER)
        .to_string()
}

fn line_width_of(record: &Record) -> f64 {
    record.f64_field(39).unwrap_or(DEFAULT_LINE_WIDTH)
}

/// 旧式 POLYLINE：顶点来自 VERTEX 子记录，bulge 缺省时回退到标量组码 42。
fn polyline_from_record(record: &Record) -> Result<Polyline, DxfError> {
    let mut vertices = Vec::with_capacity(record.children().len());
    for child in record.children() {
        let mut vertex = child.points().first().copied().ok_or_else(|| {
            DxfError::invalid_record("VERTEX", child.line(), "缺少坐标（组码 10/20）")
        })?;
        if vertex.bulge == 0.0 {
            vertex.bulge = child.f64_field(42).unwrap_or(0.0);
        }
        vertices.push(vertex);
    }
    if vertices.is_empty() {
        return Err(DxfError::invalid_record("POLYLINE", record.line(), "没有任何顶点"));
    }
    let flags = record.i32_field(70).unwrap_or(0);
    Ok(Polyline::from_flags(vertices, flags, layer_of(record))
        .with_line_width(line_width_of(record)))
}

fn lwpolyline_from_record(record: &Record) -> Result<Polyline, DxfError> {
    if record.points().is_empty() {
        return Err(DxfError::invalid_record("LWPOLYLINE", record.line(), "没有任何顶点"));
    }
    let flags = record.i32_field(70).unwrap_or(0);
    Ok(Polyline::from_flags(record.points().iter().copied(), flags, layer_of(record))
        .with_line_width(line_width_of(record)))
}

/// LINE 取最后两个点作为起点和终点。
fn line_from_record(record: &Record) -> Result<Line, DxfError> {
    let points = record.points();
    let [start, end] = match points {
        [.., start, end] => [*start, *end],
        _ => {
            return Err(DxfError::invalid_record(
                "LINE",
                record.line(),
                format!("需要起点和终点，实际只有 {} 个点", points.len()),
            ));
        }
    };
    let mut line = Line::new(start, end, layer_of(record));
    line.line_width = line_width_of(record);
    Ok(line)
}
