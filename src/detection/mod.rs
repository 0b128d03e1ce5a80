// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// - ConfigTable:      检测器参数表
/// - DetectorVariant:  后端变体标签
/// - DetectorRegistry: 变体 → 构造函数 注册表
/// - MotionDetector:   内置运动分割后端
pub mod config_table;
pub mod detector;
pub mod motion;
pub mod types;
pub mod variant;

pub use config_table::ConfigTable;
pub use detector::{Detector, DetectorCtor, DetectorError, DetectorRegistry};
pub use motion::{MotionDetector, MotionParams};
pub use types::{BBox, Detection, ObjectType, Point2, Rect, RotatedRect, Size, Size2f, COCO_NAMES};
pub use variant::{DetectorVariant, MotionAlgorithm};
