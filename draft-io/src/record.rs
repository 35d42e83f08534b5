use std::collections::BTreeMap;
use std::fmt;

use draft_core::geometry::Point;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cursor::GroupCodeCursor;
use crate::value::{GroupValue, coerce};
use crate::DxfError;

const SUBCLASS_MARKER: i32 = 100;

/// 解析后的记录：标量字段按组码存放，坐标组聚合为点，子类标记按出现顺序保留。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    line: usize,
    fields: BTreeMap<i32, GroupValue>,
    points: Vec<Point>,
    subclasses: Vec<String>,
    children: Vec<Record>,
}

impl Record {
    /// 记录类型（组码 0 的值）。
    pub fn kind(&self) -> Option<&str> {
        self.str_field(0).map(str::trim)
    }

    /// 记录起始行（从 1 开始，0 表示未知）。
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn get(&self, code: i32) -> Option<&GroupValue> {
        self.fields.get(&code)
    }

    pub fn str_field(&self, code: i32) -> Option<&str> {
        self.get(code).and_then(GroupValue::as_str)
    }

    pub fn f64_field(&self, code: i32) -> Option<f64> {
        self.get(code).and_then(GroupValue::as_f64)
    }

    pub fn i32_field(&self, code: i32) -> Option<i32> {
        self.get(code)
            .and_then(GroupValue::as_i64)
            .and_then(|value| i32::try_from(value).ok())
    }

    pub fn bool_field(&self, code: i32) -> Option<bool> {
        self.get(code).and_then(GroupValue::as_bool)
    }

    pub fn fields(&self) -> impl Iterator<Item = (i32, &GroupValue)> + '_ {
        self.fields.iter().map(|(code, value)| (*code, value))
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn subclasses(&self) -> &[String] {
        &self.subclasses
    }

    pub fn children(&self) -> &[Record] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.points.is_empty() && self.subclasses.is_empty()
    }
}

/// 非致命的解析异常，解析继续进行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Anomaly {
    DuplicateField { kind: String, code: i32, line: usize },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::DuplicateField { kind, code, line } => {
                write!(f, "第 {line} 行：{kind} 记录的组码 {code} 重复，保留首个值")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
    Z,
    Bulge,
}

impl Axis {
    fn of(code: i32) -> Option<Self> {
        match code {
            10..=13 => Some(Axis::X),
            20..=23 => Some(Axis::Y),
            30..=33 => Some(Axis::Z),
            42 => Some(Axis::Bulge),
            _ => None,
        }
    }

    fn slot(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::Bulge => 3,
        }
    }
}

/// 基于 [`GroupCodeCursor`] 的记录解析器，负责收集解析期间的异常。
#[derive(Debug)]
pub struct RecordParser<'a> {
    cursor: GroupCodeCursor<'a>,
    anomalies: Vec<Anomaly>,
}

impl<'a> RecordParser<'a> {
    pub fn new(cursor: GroupCodeCursor<'a>) -> Self {
        Self {
            cursor,
            anomalies: Vec::new(),
        }
    }

    pub fn cursor(&self) -> &GroupCodeCursor<'a> {
        &self.cursor
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn into_anomalies(self) -> Vec<Anomaly> {
        self.anomalies
    }

    /// 读取平铺记录：直到下一个组码 0（不消费）或输入结束。
    ///
    /// 尚未收集任何字段时组码 0 不构成边界，按子记录读取。
    pub fn parse_record(&mut self) -> Result<Record, DxfError> {
        if self.cursor.peek_code()? == Some(0) {
            return self.parse_child();
        }
        let mut record = Record {
            line: self.cursor.line_number(),
            ..Record::default()
        };
        self.collect_fields(&mut record, "")?;
        Ok(record)
    }

    /// 读取以组码 0 开头的子记录，组码 0 的值即记录类型。
    pub fn parse_child(&mut self) -> Result<Record, DxfError> {
        let line = self.cursor.line_number();
        match self.cursor.peek_code()? {
            Some(0) => {}
            found => {
                return Err(DxfError::ExpectedSentinel {
                    expected: "组码 0".to_string(),
                    found: describe_code(found),
                    line,
                });
            }
        }
        let (_, kind) = self.cursor.read_pair()?;
        let mut record = Record {
            line,
            ..Record::default()
        };
        record.fields.insert(0, GroupValue::Str(kind.clone()));
        self.collect_fields(&mut record, kind.trim())?;
        Ok(record)
    }

    /// 读取一个坐标点（10-13 / 20-23 / 30-33 / 42）。
    ///
    /// 第二次出现 X 组码或遇到非坐标组码时结束，该组码留给调用方。
    pub fn parse_point(&mut self) -> Result<Point, DxfError> {
        self.read_point("")
    }

    /// 读取一个实体；`POLYLINE` 会连同其后的 `VERTEX` 子记录一起读取，
    /// 直到必需的 `SEQEND`。
    pub fn parse_entity(&mut self) -> Result<Record, DxfError> {
        let mut record = self.parse_child()?;
        if record.kind() != Some("POLYLINE") {
            return Ok(record);
        }
        loop {
            let line = self.cursor.line_number();
            match self.cursor.peek_code()? {
                Some(0) => {}
                found => {
                    return Err(DxfError::ExpectedSentinel {
                        expected: "SEQEND".to_string(),
                        found: describe_code(found),
                        line,
                    });
                }
            }
            let (_, kind) = self.cursor.read_pair()?;
            self.cursor.unread_pair()?;
            match kind.trim() {
                "VERTEX" => {
                    let vertex = self.parse_child()?;
                    record.children.push(vertex);
                }
                "SEQEND" => {
                    self.parse_child()?;
                    break;
                }
                other => {
                    return Err(DxfError::ExpectedSentinel {
                        expected: "VERTEX 或 SEQEND".to_string(),
                        found: other.to_string(),
                        line,
                    });
                }
            }
        }
        Ok(record)
    }

    fn collect_fields(&mut self, record: &mut Record, kind: &str) -> Result<(), DxfError> {
        while let Some(code) = self.cursor.peek_code()? {
            if code == 0 {
                break;
            }
            if Axis::of(code) == Some(Axis::X) {
                let point = self.read_point(kind)?;
                record.points.push(point);
                continue;
            }

            let line = self.cursor.line_number();
            let (code, raw) = self.cursor.read_pair()?;
            let value = coerce(code, &raw).map_err(|err| err.with_line(line))?;
            if code == SUBCLASS_MARKER {
                record.subclasses.push(raw);
                continue;
            }
            if record.fields.contains_key(&code) {
                self.report_duplicate(kind, code, line);
                continue;
            }
            record.fields.insert(code, value);
        }
        Ok(())
    }

    fn read_point(&mut self, kind: &str) -> Result<Point, DxfError> {
        let start = self.cursor.line_number();
        let first = self.cursor.peek_code()?;
        if first.and_then(Axis::of) != Some(Axis::X) {
            return Err(DxfError::ExpectedSentinel {
                expected: "坐标组码 10-13".to_string(),
                found: describe_code(first),
                line: start,
            });
        }

        let mut coords = [0.0_f64; 4];
        let mut seen = [false; 4];
        while let Some(code) = self.cursor.peek_code()? {
            let Some(axis) = Axis::of(code) else {
                break;
            };
            if axis == Axis::X && seen[Axis::X.slot()] {
                break;
            }

            let line = self.cursor.line_number();
            let (code, raw) = self.cursor.read_pair()?;
            let value = coerce(code, &raw)
                .map_err(|err| err.with_line(line))?
                .as_f64()
                .ok_or_else(|| DxfError::InvalidValue {
                    code,
                    raw: raw.clone(),
                    line,
                })?;
            let slot = axis.slot();
            if seen[slot] {
                self.report_duplicate(kind, code, line);
                continue;
            }
            seen[slot] = true;
            coords[slot] = value;
        }

        Ok(Point {
            x: coords[0],
            y: coords[1],
            z: coords[2],
            bulge: coords[3],
        })
    }

    fn report_duplicate(&mut self, kind: &str, code: i32, line: usize) {
        let anomaly = Anomaly::DuplicateField {
            kind: kind.to_string(),
            code,
            line,
        };
        warn!("{anomaly}");
        self.anomalies.push(anomaly);
    }

    fn parse_entities(&mut self, entities: &mut Vec<Record>) -> Result<(), DxfError> {
        loop {
            let line = self.cursor.line_number();
            if self.cursor.is_exhausted() {
                return Err(DxfError::ExpectedSentinel {
                    expected: "ENDSEC".to_string(),
                    found: describe_code(None),
                    line,
                });
            }
            let (code, value) = self.cursor.read_pair()?;
            if code == 0 && value.trim() == "ENDSEC" {
                break;
            }
            self.cursor.unread_pair()?;
            let entity = self.parse_entity()?;
            debug!(kind = entity.kind().unwrap_or(""), line, "读取实体");
            entities.push(entity);
        }
        Ok(())
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            let (code, value) = self.cursor.read_pair()?;
            if code == 0 && value.trim() == "ENDSEC" {
                return Ok(());
            }
        }
    }
}

/// 整份文档的解析结果：ENTITIES 段中的实体记录与全部异常。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub entities: Vec<Record>,
    pub anomalies: Vec<Anomaly>,
}

/// 解析 `SECTION`/`ENDSEC`/`EOF` 框架；仅 ENTITIES 段被解析，其余段跳过。
pub fn parse_document(cursor: GroupCodeCursor<'_>) -> Result<ParsedDocument, DxfError> {
    let mut parser = RecordParser::new(cursor);
    let mut entities = Vec::new();
    while !parser.cursor.is_exhausted() {
        let line = parser.cursor.line_number();
        let (code, value) = parser.cursor.read_pair()?;
        if code != 0 {
            return Err(DxfError::ExpectedSentinel {
                expected: "组码 0".to_string(),
                found: code.to_string(),
                line,
            });
        }
        match value.trim() {
            "SECTION" => {
                let line = parser.cursor.line_number();
                let (code, name) = parser.cursor.read_pair()?;
                if code != 2 {
                    return Err(DxfError::ExpectedSentinel {
                        expected: "段名称（组码 2）".to_string(),
                        found: code.to_string(),
                        line,
                    });
                }
                debug!(section = name.trim(), line, "进入段");
                match name.trim() {
                    "ENTITIES" => parser.parse_entities(&mut entities)?,
                    _ => parser.skip_section()?,
                }
            }
            "EOF" => break,
            other => {
                return Err(DxfError::ExpectedSentinel {
                    expected: "SECTION 或 EOF".to_string(),
                    found: other.to_string(),
                    line,
                });
            }
        }
    }
    Ok(ParsedDocument {
        entities,
        anomalies: parser.into_anomalies(),
    })
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("组码 {code}"),
        None => "输入结束".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(pairs: &[(i32, &str)]) -> RecordParser<'static> {
        RecordParser::new(GroupCodeCursor::from_pairs(
            pairs.iter().map(|(code, value)| (*code, value.to_string())),
        ))
    }

    #[test]
    fn consecutive_x_codes_start_new_points() {
        let mut parser = parser(&[
            (10, "1"),
            (20, "2"),
            (30, "3"),
            (11, "4"),
            (21, "5"),
            (31, "6"),
        ]);
        let record = parser.parse_record().unwrap();
        assert_eq!(
            record.points(),
            &[
                Point {
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                    bulge: 0.0
                },
                Point {
                    x: 4.0,
                    y: 5.0,
                    z: 6.0,
                    bulge: 0.0
                },
            ]
        );
        assert!(parser.anomalies().is_empty());
    }

    #[test]
    fn point_stops_at_non_coordinate_code() {
        let mut parser = parser(&[(10, "1"), (42, "0.5"), (8, "WALLS"), (20, "9")]);
        let record = parser.parse_record().unwrap();
        assert_eq!(record.points().len(), 1);
        assert_eq!(record.points()[0], Point::with_bulge(1.0, 0.0, 0.5));
        assert_eq!(record.str_field(8), Some("WALLS"));
        assert_eq!(record.f64_field(20), Some(9.0));
    }

    #[test]
    fn duplicate_scalar_keeps_first_value() {
        let mut parser = parser(&[(0, "LINE"), (8, "A"), (8, "B")]);
        let record = parser.parse_child().unwrap();
        assert_eq!(record.str_field(8), Some("A"));
        assert_eq!(
            parser.anomalies(),
            &[Anomaly::DuplicateField {
                kind: "LINE".to_string(),
                code: 8,
                line: 5
            }]
        );
    }

    #[test]
    fn duplicate_coordinate_inside_point_is_reported() {
        let mut parser = parser(&[(0, "VERTEX"), (10, "1"), (20, "2"), (20, "3")]);
        let record = parser.parse_child().unwrap();
        assert_eq!(record.points(), &[Point::new(1.0, 2.0)]);
        assert_eq!(parser.anomalies().len(), 1);
    }

    #[test]
    fn subclass_markers_are_repeatable() {
        let mut parser = parser(&[
            (0, "VERTEX"),
            (100, "AcDbEntity"),
            (8, "0"),
            (100, "AcDbVertex"),
            (100, "AcDb2dVertex"),
        ]);
        let record = parser.parse_child().unwrap();
        assert_eq!(
            record.subclasses(),
            &["AcDbEntity", "AcDbVertex", "AcDb2dVertex"]
        );
        assert!(parser.anomalies().is_empty());
        assert!(record.get(100).is_none());
    }

    #[test]
    fn back_to_back_sentinels_make_progress() {
        let mut parser = parser(&[(0, "SEQEND"), (0, "SEQEND")]);
        let first = parser.parse_child().unwrap();
        let second = parser.parse_child().unwrap();
        assert_eq!(first.kind(), Some("SEQEND"));
        assert_eq!(second.kind(), Some("SEQEND"));
        assert!(parser.cursor().is_exhausted());
    }

    #[test]
    fn flat_record_stops_before_sentinel() {
        let mut parser = parser(&[(8, "0"), (0, "LINE")]);
        let record = parser.parse_record().unwrap();
        assert_eq!(record.str_field(8), Some("0"));
        assert_eq!(parser.cursor().peek_code().unwrap(), Some(0));

        let mut empty = parser_from_text("");
        assert!(empty.parse_record().unwrap().is_empty());
    }

    #[test]
    fn leading_sentinel_is_not_a_boundary_for_empty_record() {
        let mut parser = parser(&[(0, "SEQEND"), (8, "0"), (0, "EOF")]);
        let record = parser.parse_record().unwrap();
        assert_eq!(record.kind(), Some("SEQEND"));
        assert_eq!(record.str_field(8), Some("0"));
        assert_eq!(parser.cursor().line_number(), 5);
    }

    fn parser_from_text(text: &'static str) -> RecordParser<'static> {
        RecordParser::new(GroupCodeCursor::from_text(text))
    }

    #[test]
    fn child_requires_sentinel() {
        let mut parser = parser(&[(8, "0")]);
        assert_eq!(
            parser.parse_child().unwrap_err(),
            DxfError::ExpectedSentinel {
                expected: "组码 0".to_string(),
                found: "组码 8".to_string(),
                line: 1
            }
        );
    }

    #[test]
    fn unknown_code_reports_its_line() {
        let mut parser = parser(&[(0, "LINE"), (150, "1")]);
        assert_eq!(
            parser.parse_child().unwrap_err(),
            DxfError::UnknownCode { code: 150, line: 3 }
        );
    }

    #[test]
    fn polyline_collects_vertices_until_seqend() {
        let mut parser = parser(&[
            (0, "POLYLINE"),
            (8, "0"),
            (70, "1"),
            (0, "VERTEX"),
            (10, "0"),
            (20, "0"),
            (42, "1"),
            (0, "VERTEX"),
            (10, "10"),
            (20, "0"),
            (0, "SEQEND"),
            (0, "LINE"),
        ]);
        let record = parser.parse_entity().unwrap();
        assert_eq!(record.kind(), Some("POLYLINE"));
        assert_eq!(record.line(), 1);
        assert_eq!(record.children()[1].line(), 15);
        assert_eq!(record.i32_field(70), Some(1));
        assert_eq!(record.children().len(), 2);
        assert_eq!(record.children()[0].points()[0].bulge, 1.0);

        let next = parser.parse_entity().unwrap();
        assert_eq!(next.kind(), Some("LINE"));
    }

    #[test]
    fn polyline_without_seqend_is_fatal() {
        let mut parser = parser(&[(0, "POLYLINE"), (0, "VERTEX"), (10, "0"), (20, "0")]);
        assert!(matches!(
            parser.parse_entity().unwrap_err(),
            DxfError::ExpectedSentinel { ref expected, .. } if expected == "SEQEND"
        ));

        let mut parser = parser_from_text("0\nPOLYLINE\n0\nLINE\n");
        assert!(matches!(
            parser.parse_entity().unwrap_err(),
            DxfError::ExpectedSentinel { ref found, .. } if found == "LINE"
        ));
    }

    #[test]
    fn empty_document_has_no_entities() {
        let parsed = parse_document(GroupCodeCursor::from_text("")).unwrap();
        assert_eq!(parsed, ParsedDocument::default());
    }

    #[test]
    fn document_skips_sections_other_than_entities() {
        let text = "0\nSECTION\n2\nHEADER\n9\n$ACADVER\n1\nAC1015\n0\nENDSEC\n\
                    0\nSECTION\n2\nENTITIES\n0\nLINE\n8\n0\n10\n0\n20\n0\n11\n1\n21\n1\n0\nENDSEC\n\
                    0\nEOF\n";
        let parsed = parse_document(GroupCodeCursor::from_text(text)).unwrap();
        assert_eq!(parsed.entities.len(), 1);
        assert_eq!(parsed.entities[0].points().len(), 2);
    }
}
