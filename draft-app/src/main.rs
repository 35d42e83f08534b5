use std::path::PathBuf;

use draft_config::{AppConfig, ConfigError};
use draft_core::entities::Entity;
use draft_core::geometry::Bounds2D;
use draft_io::{DocumentLoader, DocumentSaver, DxfFacade, DxfVersion};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut version_override: Option<DxfVersion> = None;
    let mut output: Option<PathBuf> = None;
    let mut input: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--legacy" => version_override = Some(DxfVersion::R12),
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--output" => {
                let Some(path) = args.next() else {
                    eprintln!("`--output` 需要提供导出文件路径");
                    std::process::exit(1);
                };
                output = Some(PathBuf::from(path));
            }
            other if other.starts_with("--") => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
            other => {
                if input.replace(PathBuf::from(other)).is_some() {
                    eprintln!("只能指定一个输入文件");
                    std::process::exit(1);
                }
            }
        }
    }

    let Some(input) = input else {
        eprintln!("用法：draft-app [--config <路径>] [--legacy] [--output <路径>] <输入.dxf>");
        std::process::exit(1);
    };

    let config = load_configuration(config_override);
    init_logging(&config);
    info!(input = %input.display(), "启动 draft 应用");

    let version = version_override.unwrap_or(config.export.version);
    let facade = DxfFacade::with_version(version);
    let drawing = match facade.load(&input) {
        Ok(drawing) => drawing,
        Err(err) => {
            error!(path = %input.display(), error = %err, "读取 DXF 失败");
            std::process::exit(1);
        }
    };

    for anomaly in &drawing.anomalies {
        warn!("{anomaly}");
    }
    let mut extents = Bounds2D::empty();
    for (index, entity) in drawing.entities.iter().enumerate() {
        report_entity(index, entity, &config);
        extents.include_bounds(&entity.bounding_box());
    }
    if !extents.is_empty() {
        let [xmin, xmax, ymin, ymax] = extents.extents();
        println!("图纸范围=[{xmin:.3}, {xmax:.3}, {ymin:.3}, {ymax:.3}]");
    }
    info!(
        entities = drawing.entities.len(),
        anomalies = drawing.anomalies.len(),
        "导入完成"
    );

    if let Some(output) = output {
        if let Err(err) = facade.save(&drawing.entities, &output) {
            error!(path = %output.display(), error = %err, "导出 DXF 失败");
            std::process::exit(1);
        }
        info!(path = %output.display(), version = ?version, "导出完成");
    }
}

/// 打印实体范围，并以范围中心为鼠标位置统计可用的捕捉点。
fn report_entity(index: usize, entity: &Entity, config: &AppConfig) {
    let bounds = entity.bounding_box();
    let [xmin, xmax, ymin, ymax] = bounds.extents();
    let delta = (xmax - xmin).max(ymax - ymin);
    let snaps = entity.snaps(bounds.center(), delta, &config.snap);
    println!(
        "#{index} {} 图层={} 范围=[{xmin:.3}, {xmax:.3}, {ymin:.3}, {ymax:.3}] 捕捉点={}",
        entity.kind(),
        entity.layer_name(),
        snaps.len()
    );
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
