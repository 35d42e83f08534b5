
use std::path::PathBuf;

use draft_core::entities::{Entity, Line, Polyline};
use draft_core::geometry::Point;
use golden::assert_golden;
use draft_io::{
    Anomaly, DocumentLoader, DocumentSaver, DxfError, DxfFacade, DxfVersion, IoError,
};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

fn mixed_entities() -> Vec<Entity> {
    let open = Polyline::new(
        [
            Point::with_bulge(0.0, 0.0, 0.5),
            Point::new(10.0, 0.0),
            Point::with_bulge(10.0, 10.0, -1.0),
            Point::new(0.0, 10.0),
        ],
        false,
        "A",
    )
    .with_line_width(0.25);
    let closed = Polyline::from_flags(
        [
            Point::new(-3.5, 1.0 / 3.0),
            Point::with_bulge(4.0, 1.0 / 3.0, 0.414_213_562_373_095_1),
            Point::new(4.0, 7.125),
        ],
        129,
        "B",
    );
    let line = Line::new(Point::new(1.5, 2.25), Point::new(3.125, -4.0), "C");
    vec![
        Entity::Polyline(open),
        Entity::Polyline(closed),
        Entity::Line(line),
    ]
}

fn assert_point_close(actual: Point, expected: Point) {
    assert!((actual.x - expected.x).abs() < 1e-9, "{actual:?} != {expected:?}");
    assert!((actual.y - expected.y).abs() < 1e-9, "{actual:?} != {expected:?}");
    assert!((actual.z - expected.z).abs() < 1e-9, "{actual:?} != {expected:?}");
    assert!(
        (actual.bulge - expected.bulge).abs() < 1e-9,
        "{actual:?} != {expected:?}"
    );
}

fn assert_entities_close(actual: &[Entity], expected: &[Entity]) {
    assert_eq!(actual.len(), expected.len());
    for (actual, expected) in actual.iter().zip(expected) {
        match (actual, expected) {
            (Entity::Polyline(actual), Entity::Polyline(expected)) => {
                assert_eq!(actual.closed, expected.closed);
                assert_eq!(actual.flags(), expected.flags());
                assert_eq!(actual.layer, expected.layer);
                assert!((actual.line_width - expected.line_width).abs() < 1e-9);
                assert_eq!(actual.vertices.len(), expected.vertices.len());
                for (a, e) in actual.vertices.iter().zip(&expected.vertices) {
                    assert_point_close(*a, *e);
                }
            }
            (Entity::Line(actual), Entity::Line(expected)) => {
                assert_eq!(actual.layer, expected.layer);
                assert_point_close(actual.start, expected.start);
                assert_point_close(actual.end, expected.end);
            }
            (actual, expected) => panic!("实体类型不一致: {actual:?} vs {expected:?}"),
        }
    }
}

#[test]
fn load_polyline_with_bulge_matches_golden() {
    let loader = DxfFacade::new();
    let drawing = loader
        .load(&fixture("bulge_polyline.dxf"))
        .expect("读取带 bulge 的 DXF 失败");
    assert_golden("bulge_polyline", &drawing.entities);
    assert!(drawing.anomalies.is_empty());

    let Entity::Polyline(polyline) = &drawing.entities[0] else {
        panic!("第一个实体应为多段线");
    };
    assert!(polyline.closed);
    assert_eq!(polyline.segment_count(), 3);
    assert_eq!(polyline.bounding_box().extents(), [0.0, 10.0, 0.0, 10.0]);
}

#[test]
fn round_trip_preserves_mixed_segments_in_both_versions() {
    let entities = mixed_entities();
    for version in [DxfVersion::R12, DxfVersion::R2000] {
        let facade = DxfFacade::with_version(version);
        let text = facade.write_string(&entities);
        let drawing = facade
            .read_str(&text)
            .unwrap_or_else(|err| panic!("{version:?} 回读失败: {err}"));
        assert_entities_close(&drawing.entities, &entities);
        assert!(drawing.anomalies.is_empty(), "{:?}", drawing.anomalies);
    }
}

#[test]
fn legacy_output_has_no_handles_or_subclasses() {
    let text = DxfFacade::with_version(DxfVersion::R12).write_string(&mixed_entities());
    assert!(text.contains("AC1009"));
    assert!(!text.contains("AcDb"));
    assert!(!text.contains("$HANDSEED"));
    assert!(!text.lines().step_by(2).any(|code| code == "5"));
}

#[test]
fn save_then_load_through_facade() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("drawing.dxf");
    let facade = DxfFacade::new();
    let entities = mixed_entities();

    facade.save(&entities, &path).expect("保存 DXF 失败");
    assert!(path.exists());
    assert!(!dir.path().join("drawing.dxf.tmp").exists());

    let drawing = facade.load(&path).expect("读取刚保存的 DXF 失败");
    assert_entities_close(&drawing.entities, &entities);
}

#[test]
fn failed_save_reports_write_error() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("missing").join("drawing.dxf");
    let err = DxfFacade::new()
        .save(&mixed_entities(), &path)
        .expect_err("目录不存在时应当失败");
    assert!(matches!(err, IoError::WriteError { .. }));
    assert!(!path.exists());
}

#[test]
fn missing_file_reports_read_error() {
    let err = DxfFacade::new()
        .load(&fixture("does_not_exist.dxf"))
        .expect_err("文件不存在时应当失败");
    assert!(matches!(err, IoError::ReadError { .. }));
}

#[test]
fn duplicate_fields_are_reported_as_anomalies() {
    let text = "0\nSECTION\n2\nENTITIES\n\
                0\nLINE\n8\nFIRST\n8\nSECOND\n10\n0\n20\n0\n11\n1\n21\n0\n\
                0\nENDSEC\n0\nEOF\n";
    let drawing = DxfFacade::new().read_str(text).expect("解析失败");
    assert_eq!(drawing.entities.len(), 1);
    assert_eq!(drawing.entities[0].layer_name(), "FIRST");
    assert_eq!(
        drawing.anomalies,
        vec![Anomaly::DuplicateField {
            kind: "LINE".to_string(),
            code: 8,
            line: 9
        }]
    );
}

#[test]
fn unknown_group_code_aborts_the_whole_import() {
    let text = "0\nSECTION\n2\nENTITIES\n\
                0\nLINE\n8\n0\n10\n0\n20\n0\n11\n1\n21\n0\n\
                0\nLINE\n8\n0\n150\n1\n\
                0\nENDSEC\n0\nEOF\n";
    let err = DxfFacade::new()
        .read_str(text)
        .expect_err("未知组码应当导致导入失败");
    assert_eq!(err, DxfError::UnknownCode { code: 150, line: 21 });
}

#[test]
fn unterminated_entities_section_is_fatal() {
    let text = "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\n0\n20\n0\n11\n1\n21\n1\n";
    let err = DxfFacade::new().read_str(text).expect_err("缺少 ENDSEC");
    assert!(matches!(
        err,
        DxfError::ExpectedSentinel { ref expected, .. } if expected == "ENDSEC"
    ));
}

#[test]
fn crlf_input_is_accepted() {
    let text = "0\r\nSECTION\r\n2\r\nENTITIES\r\n0\r\nLINE\r\n8\r\nL1\r\n10\r\n0\r\n20\r\n0\r\n\
                11\r\n2\r\n21\r\n0\r\n0\r\nENDSEC\r\n0\r\nEOF\r\n";
    let drawing = DxfFacade::new().read_str(text).expect("解析 CRLF 输入失败");
    let Entity::Line(line) = &drawing.entities[0] else {
        panic!("期望直线");
    };
    assert_eq!(line.layer, "L1");
    assert_eq!(line.length(), 2.0);
}

#[test]
fn oversized_flags_abort_the_import() {
    let text = "0\nSECTION\n2\nENTITIES\n\
                0\nPOLYLINE\n70\n4294967297\n\
                0\nVERTEX\n10\n0\n20\n0\n0\nSEQEND\n\
                0\nENDSEC\n0\nEOF\n";
    let err = DxfFacade::new()
        .read_str(text)
        .expect_err("超出 32 位的组码 70 应当导致导入失败");
    assert_eq!(
        err,
        DxfError::InvalidValue {
            code: 70,
            raw: "4294967297".to_string(),
            line: 7
        }
    );
}

#[test]
fn padded_layer_names_survive_round_trip() {
    let entities = vec![
        Entity::Line(Line::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0), " A ")),
        Entity::Polyline(Polyline::new([Point::new(2.0, 2.0)], false, "B ")),
    ];
    let facade = DxfFacade::new();
    let drawing = facade
        .read_str(&facade.write_string(&entities))
        .expect("回读失败");
    assert_eq!(drawing.entities[0].layer_name(), " A ");
    assert_eq!(drawing.entities[1].layer_name(), "B ");
}

#[test]
fn empty_polylines_do_not_break_round_trip() {
    let entities = vec![
        Entity::Polyline(Polyline::new(Vec::new(), false, "EMPTY")),
        Entity::Line(Line::new(Point::new(0.0, 0.0), Point::new(3.0, 4.0), "0")),
    ];
    for version in [DxfVersion::R12, DxfVersion::R2000] {
        let facade = DxfFacade::with_version(version);
        let drawing = facade
            .read_str(&facade.write_string(&entities))
            .unwrap_or_else(|err| panic!("{version:?} 回读失败: {err}"));
        assert_entities_close(&drawing.entities, &entities[1..]);
    }
}

#[test]
fn failed_staging_write_leaves_target_untouched() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("drawing.dxf");
    std::fs::create_dir(dir.path().join("drawing.dxf.tmp")).expect("创建占位目录失败");

    let err = DxfFacade::new()
        .save(&mixed_entities(), &path)
        .expect_err("临时文件无法写入时应当失败");
    assert!(matches!(err, IoError::WriteError { .. }));
    assert!(!path.exists());
}
