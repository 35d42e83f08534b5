use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// 对象捕捉开关，与配置文件中的 `[snap]` 段一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapSettings {
    pub end: bool,
    pub mid: bool,
    pub centre: bool,
    pub nearest: bool,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            end: true,
            mid: true,
            centre: true,
            nearest: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapKind {
    End,
    Mid,
    Centre,
    Nearest,
}

/// 候选捕捉点，由实体生成、交给外部捕捉逻辑筛选。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapPoint {
    pub point: Point,
    pub kind: SnapKind,
}

impl SnapPoint {
    #[inline]
    pub fn new(point: Point, kind: SnapKind) -> Self {
        Self {
            point: point.position(),
            kind,
        }
    }
}

/// 最近点捕捉的阈值：距离需小于 `delta / 10`。
#[inline]
pub fn within_nearest_threshold(distance: f64, delta: f64) -> bool {
    distance < delta / 10.0
}
