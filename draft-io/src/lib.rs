use std::fs;
use std::path::{Path, PathBuf};

use draft_core::entities::Entity;
use thiserror::Error;
use tracing::debug;

pub mod convert;
pub mod cursor;
pub mod record;
pub mod value;
pub mod writer;

pub use cursor::GroupCodeCursor;
pub use record::{Anomaly, ParsedDocument, Record, RecordParser, parse_document};
pub use value::{GroupValue, ValueKind, coerce, value_kind};
pub use writer::{DxfVersion, DxfWriter, WriteDxf, write_document};

/// 组码流解析/写出阶段的致命错误。行号从 1 开始，0 表示未知。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DxfError {
    #[error("第 {line} 行：未知组码 {code}")]
    UnknownCode { code: i32, line: usize },
    #[error("第 {line} 行：组码 \"{raw}\" 无法解析为整数")]
    InvalidCode { raw: String, line: usize },
    #[error("第 {line} 行：组码 {code} 的值 \"{raw}\" 无法解析")]
    InvalidValue { code: i32, raw: String, line: usize },
    #[error("第 {line} 行：输入提前结束")]
    CursorExhausted { line: usize },
    #[error("游标已位于输入起点，无法回退")]
    CursorUnderflow,
    #[error("第 {line} 行：期望 {expected}，实际为 {found}")]
    ExpectedSentinel {
        expected: String,
        found: String,
        line: usize,
    },
    #[error("第 {line} 行：{kind} 记录无效：{message}")]
    InvalidRecord {
        kind: String,
        message: String,
        line: usize,
    },
}

impl DxfError {
    /// 为尚未定位的错误补上行号。
    pub fn with_line(self, line: usize) -> Self {
        match self {
            DxfError::UnknownCode { code, line: 0 } => DxfError::UnknownCode { code, line },
            DxfError::InvalidValue { code, raw, line: 0 } => {
                DxfError::InvalidValue { code, raw, line }
            }
            other => other,
        }
    }

    pub(crate) fn invalid_record(
        kind: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        DxfError::InvalidRecord {
            kind: kind.into(),
            message: message.into(),
            line,
        }
    }
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document: {0}")]
    Decode(#[from] DxfError),
}

/// 导入结果：全部实体与解析过程中记录的非致命异常。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drawing {
    pub entities: Vec<Entity>,
    pub anomalies: Vec<Anomaly>,
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Drawing, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, entities: &[Entity], path: &Path) -> Result<(), IoError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DxfFacade {
    version: DxfVersion,
}

impl DxfFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: DxfVersion) -> Self {
        Self { version }
    }

    #[inline]
    pub fn version(&self) -> DxfVersion {
        self.version
    }

    /// 解析整份文档。任何致命错误都会丢弃已经解析出的实体。
    pub fn read_str(&self, source: &str) -> Result<Drawing, DxfError> {
        let parsed = parse_document(GroupCodeCursor::from_text(source))?;
        let mut entities = Vec::with_capacity(parsed.entities.len());
        for record in &parsed.entities {
            match convert::entity_from_record(record)? {
                Some(entity) => entities.push(entity),
                None => debug!(kind = record.kind().unwrap_or(""), "跳过不支持的实体"),
            }
        }
        debug!(
            entities = entities.len(),
            anomalies = parsed.anomalies.len(),
            "DXF 解析完成"
        );
        Ok(Drawing {
            entities,
            anomalies: parsed.anomalies,
        })
    }

    pub fn write_string(&self, entities: &[Entity]) -> String {
        write_document(entities, self.version)
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.read_str(&data)?)
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, entities: &[Entity], path: &Path) -> Result<(), IoError> {
        let text = self.write_string(entities);
        let staging = staging_path(path);
        let write_error = |source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        };
        if let Err(source) = fs::write(&staging, text) {
            let _ = fs::remove_file(&staging);
            return Err(write_error(source));
        }
        if let Err(source) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(write_error(source));
        }
        debug!(path = %path.display(), version = ?self.version, "DXF 导出完成");
        Ok(())
    }
}

/// 导出先写入同目录下的临时文件，完整写完后再替换目标。
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
