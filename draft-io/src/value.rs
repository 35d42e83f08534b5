use std::fmt;

use serde::Serialize;

use crate::DxfError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Str,
    Float,
    Int,
    Bool,
}

/// 组码区间与值类型的对照表（闭区间）。不在表内的组码视为未知。
pub const CODE_RANGES: &[(i32, i32, ValueKind)] = &[
    (0, 9, ValueKind::Str),
    (10, 59, ValueKind::Float),
    (60, 99, ValueKind::Int),
    (100, 109, ValueKind::Str),
    (110, 149, ValueKind::Float),
    (160, 179, ValueKind::Int),
    (210, 239, ValueKind::Float),
    (270, 289, ValueKind::Int),
    (290, 299, ValueKind::Bool),
    (300, 369, ValueKind::Str),
    (370, 389, ValueKind::Int),
    (390, 399, ValueKind::Str),
    (400, 409, ValueKind::Int),
    (410, 419, ValueKind::Str),
    (420, 429, ValueKind::Int),
    (430, 439, ValueKind::Str),
    (440, 459, ValueKind::Int),
    (460, 469, ValueKind::Float),
    (470, 481, ValueKind::Str),
    (999, 999, ValueKind::Str),
    (1000, 1009, ValueKind::Str),
    (1010, 1059, ValueKind::Float),
    (1060, 1071, ValueKind::Int),
];

/// 64 位整数组码；其余整数组码必须落在 32 位范围内。
const INT64_CODES: (i32, i32) = (160, 169);

pub fn value_kind(code: i32) -> Option<ValueKind> {
    CODE_RANGES
        .iter()
        .find(|(start, end, _)| (*start..=*end).contains(&code))
        .map(|(_, _, kind)| *kind)
}

/// 按组码解析后的值。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupValue {
    Str(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl GroupValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            GroupValue::Str(_) => ValueKind::Str,
            GroupValue::Float(_) => ValueKind::Float,
            GroupValue::Int(_) => ValueKind::Int,
            GroupValue::Bool(_) => ValueKind::Bool,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GroupValue::Str(value) => Some(value),
            _ => None,
        }
    }

    /// 浮点读取，整数值也接受。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GroupValue::Float(value) => Some(*value),
            GroupValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GroupValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GroupValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Str(value) => f.write_str(value),
            GroupValue::Float(value) => write!(f, "{}", format_float(*value)),
            GroupValue::Int(value) => write!(f, "{value}"),
            GroupValue::Bool(value) => f.write_str(if *value { "1" } else { "" }),
        }
    }
}

/// 最短往返表示；整数值保留一位小数，便于与整数组码区分。
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

impl From<&str> for GroupValue {
    fn from(value: &str) -> Self {
        GroupValue::Str(value.to_string())
    }
}

impl From<String> for GroupValue {
    fn from(value: String) -> Self {
        GroupValue::Str(value)
    }
}

impl From<&String> for GroupValue {
    fn from(value: &String) -> Self {
        GroupValue::Str(value.clone())
    }
}

impl From<f64> for GroupValue {
    fn from(value: f64) -> Self {
        GroupValue::Float(value)
    }
}

impl From<i32> for GroupValue {
    fn from(value: i32) -> Self {
        GroupValue::Int(i64::from(value))
    }
}

impl From<i64> for GroupValue {
    fn from(value: i64) -> Self {
        GroupValue::Int(value)
    }
}

impl From<bool> for GroupValue {
    fn from(value: bool) -> Self {
        GroupValue::Bool(value)
    }
}

/// 按组码把原始文本转换为带类型的值。
///
/// 返回的错误不含行号（为 0），调用方通过 [`DxfError::with_line`] 补上。
pub fn coerce(code: i32, raw: &str) -> Result<GroupValue, DxfError> {
    let kind = value_kind(code).ok_or(DxfError::UnknownCode { code, line: 0 })?;
    let invalid = || DxfError::InvalidValue {
        code,
        raw: raw.to_string(),
        line: 0,
    };
    let value = match kind {
        ValueKind::Str => GroupValue::Str(raw.to_string()),
        ValueKind::Float => GroupValue::Float(raw.trim().parse::<f64>().map_err(|_| invalid())?),
        ValueKind::Int => {
            let value = raw.trim().parse::<i64>().map_err(|_| invalid())?;
            let (wide_start, wide_end) = INT64_CODES;
            if !(wide_start..=wide_end).contains(&code) && i32::try_from(value).is_err() {
                return Err(invalid());
            }
            GroupValue::Int(value)
        }
        ValueKind::Bool => GroupValue::Bool(!raw.trim().is_empty()),
    };
    Ok(value)
}
