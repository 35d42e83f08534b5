use draft_core::entities::{Entity, Line, Polyline};
use draft_core::geometry::Point;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::value::GroupValue;

/// 导出版本。R12 为旧格式，不写句柄与子类标记。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DxfVersion {
    R12,
    #[default]
    R2000,
}

impl DxfVersion {
    /// `$ACADVER` 头变量的取值。
    pub fn acad_version(self) -> &'static str {
        match self {
            DxfVersion::R12 => "AC1009",
            DxfVersion::R2000 => "AC1015",
        }
    }
}

/// 组码文本写出器，持有自己的句柄计数器。
#[derive(Debug, Clone)]
pub struct DxfWriter {
    version: DxfVersion,
    next_handle: u64,
    buffer: String,
}

impl DxfWriter {
    pub fn new(version: DxfVersion) -> Self {
        Self::with_handle_seed(version, 1)
    }

    pub fn with_handle_seed(version: DxfVersion, seed: u64) -> Self {
        Self {
            version,
            next_handle: seed,
            buffer: String::new(),
        }
    }

    #[inline]
    pub fn version(&self) -> DxfVersion {
        self.version
    }

    /// 写出一个组码与值；`gate` 指定最低版本，低于该版本时整对跳过。
    pub fn write_group_code(
        &mut self,
        code: i32,
        value: impl Into<GroupValue>,
        gate: Option<DxfVersion>,
    ) {
        if gate.is_some_and(|minimum| self.version < minimum) {
            return;
        }
        let value = value.into();
        self.buffer.push_str(&code.to_string());
        self.buffer.push('\n');
        self.buffer.push_str(&value.to_string());
        self.buffer.push('\n');
    }

    /// 分配下一个句柄（大写十六进制）。
    pub fn next_handle(&mut self) -> String {
        let handle = self.next_handle;
        self.next_handle += 1;
        format!("{handle:X}")
    }

    /// 尚未分配的下一个句柄，即 `$HANDSEED`。
    pub fn handle_seed(&self) -> String {
        format!("{:X}", self.next_handle)
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn finish(self) -> String {
        self.buffer
    }

    fn write_handle(&mut self) {
        let handle = self.next_handle();
        self.write_group_code(5, handle, Some(DxfVersion::R2000));
    }

    fn write_point(&mut self, base: i32, point: Point) {
        self.write_group_code(base, point.x, None);
        self.write_group_code(base + 10, point.y, None);
        self.write_group_code(base + 20, point.z, None);
    }
}

pub trait WriteDxf {
    fn write_dxf(&self, writer: &mut DxfWriter);
}

impl WriteDxf for Polyline {
    /// 没有顶点的多段线无法被读回，直接跳过，也不占用句柄。
    fn write_dxf(&self, writer: &mut DxfWriter) {
        if self.vertices.is_empty() {
            warn!(layer = %self.layer, "跳过没有顶点的多段线");
            return;
        }
        let modern = Some(DxfVersion::R2000);
        writer.write_group_code(0, "POLYLINE", None);
        writer.write_handle();
        writer.write_group_code(100, "AcDbEntity", modern);
        writer.write_group_code(100, "AcDb2dPolyline", modern);
        writer.write_group_code(8, &self.layer, None);
        writer.write_point(10, Point::default());
        writer.write_group_code(39, self.line_width, None);
        writer.write_group_code(70, self.flags(), None);
        writer.write_group_code(66, 1_i32, None);

        for vertex in &self.vertices {
            writer.write_group_code(0, "VERTEX", None);
            writer.write_handle();
            writer.write_group_code(100, "AcDbEntity", modern);
            writer.write_group_code(100, "AcDbVertex", modern);
            writer.write_group_code(100, "AcDb2dVertex", modern);
            writer.write_group_code(8, &self.layer, None);
            writer.write_point(10, *vertex);
            writer.write_group_code(42, vertex.bulge, None);
        }

        writer.write_group_code(0, "SEQEND", None);
        writer.write_handle();
        writer.write_group_code(100, "AcDbEntity", modern);
        writer.write_group_code(8, &self.layer, None);
    }
}

impl WriteDxf for Line {
    fn write_dxf(&self, writer: &mut DxfWriter) {
        let modern = Some(DxfVersion::R2000);
        writer.write_group_code(0, "LINE", None);
        writer.write_handle();
        writer.write_group_code(100, "AcDbEntity", modern);
        writer.write_group_code(8, &self.layer, None);
        writer.write_group_code(100, "AcDbLine", modern);
        writer.write_point(10, self.start);
        writer.write_point(11, self.end);
        writer.write_group_code(39, self.line_width, None);
    }
}

impl WriteDxf for Entity {
    fn write_dxf(&self, writer: &mut DxfWriter) {
        match self {
            Entity::Line(line) => line.write_dxf(writer),
            Entity::Polyline(polyline) => polyline.write_dxf(writer),
        }
    }
}

/// 写出完整文档：HEADER（版本与句柄种子）、ENTITIES、EOF。
pub fn write_document(entities: &[Entity], version: DxfVersion) -> String {
    let mut body = DxfWriter::new(version);
    for entity in entities {
        entity.write_dxf(&mut body);
    }

    let modern = Some(DxfVersion::R2000);
    let mut document = DxfWriter::new(version);
    document.write_group_code(0, "SECTION", None);
    document.write_group_code(2, "HEADER", None);
    document.write_group_code(9, "$ACADVER", None);
    document.write_group_code(1, version.acad_version(), None);
    document.write_group_code(9, "$HANDSEED", modern);
    document.write_group_code(5, body.handle_seed(), modern);
    document.write_group_code(0, "ENDSEC", None);
    document.write_group_code(0, "SECTION", None);
    document.write_group_code(2, "ENTITIES", None);

    let mut text = document.finish();
    text.push_str(body.as_str());
    text.push_str("0\nENDSEC\n0\nEOF\n");
    text
}
