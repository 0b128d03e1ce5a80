// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器接口与工厂 (Detector trait + registry)
//!
//! 变体 → 构造函数 的注册表, 新增后端无需修改流水线控制流。

use std::collections::HashMap;
use std::fmt;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use super::config_table::ConfigTable;
use super::types::{Detection, Size};
use super::variant::DetectorVariant;

/// 检测器构造/运行错误
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("missing required configuration key `{0}`")]
    MissingKey(String),

    #[error("invalid value `{value}` for configuration key `{key}`")]
    InvalidValue { key: String, value: String },

    #[error("model file not found: {0}")]
    ModelNotFound(String),

    #[error("unknown detector tag `{0}`")]
    UnknownTag(String),

    #[error("no backend registered for detector variant `{0}`")]
    UnsupportedVariant(DetectorVariant),

    #[error("reference frame has invalid size {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },

    #[error("backend error: {0}")]
    Backend(String),
}

/// 检测器统一接口
pub trait Detector: Send {
    /// 检测一帧
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectorError>;

    /// 设置最小目标尺寸 (小于该尺寸的检测被丢弃)
    fn set_min_object_size(&mut self, size: Size);

    fn min_object_size(&self) -> Size;

    /// 在帧上叠加运动图 (仅运动检测器实现)
    fn draw_motion_map(&self, _frame: &mut RgbImage) {}

    fn variant(&self) -> DetectorVariant;
}

/// 检测器构造函数
pub type DetectorCtor =
    Box<dyn Fn(&ConfigTable, &RgbImage) -> Result<Box<dyn Detector>, DetectorError> + Send + Sync>;

struct Registration {
    required_keys: Vec<&'static str>,
    ctor: DetectorCtor,
}

/// 检测器注册表
#[derive(Default)]
pub struct DetectorRegistry {
    entries: HashMap<DetectorVariant, Registration>,
}

impl fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut variants: Vec<_> = self.entries.keys().map(|v| v.tag()).collect();
        variants.sort_unstable();
        f.debug_struct("DetectorRegistry")
            .field("variants", &variants)
            .finish()
    }
}

impl DetectorRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置后端: 所有运动分割算法, 以及 (onnx 功能下) 神经网络变体
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        super::motion::register(&mut registry);
        #[cfg(feature = "onnx")]
        crate::models::onnx::register(&mut registry);
        registry
    }

    /// 注册 (或替换) 一个变体的构造函数
    pub fn register<F>(&mut self, variant: DetectorVariant, required_keys: &[&'static str], ctor: F)
    where
        F: Fn(&ConfigTable, &RgbImage) -> Result<Box<dyn Detector>, DetectorError>
            + Send
            + Sync
            + 'static,
    {
        debug!("register detector backend: {}", variant);
        self.entries.insert(
            variant,
            Registration {
                required_keys: required_keys.to_vec(),
                ctor: Box::new(ctor),
            },
        );
    }

    pub fn contains(&self, variant: DetectorVariant) -> bool {
        self.entries.contains_key(&variant)
    }

    pub fn required_keys(&self, variant: DetectorVariant) -> Option<&[&'static str]> {
        self.entries
            .get(&variant)
            .map(|r| r.required_keys.as_slice())
    }

    /// 创建检测器
    ///
    /// 顺序: 参考帧尺寸检查 → 查找注册项 → 必填键检查 → 调用构造函数
    pub fn create_detector(
        &self,
        variant: DetectorVariant,
        config: &ConfigTable,
        reference_frame: &RgbImage,
    ) -> Result<Box<dyn Detector>, DetectorError> {
        let (width, height) = reference_frame.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::InvalidFrame { width, height });
        }

        let registration = self
            .entries
            .get(&variant)
            .ok_or(DetectorError::UnsupportedVariant(variant))?;

        for key in &registration.required_keys {
            config.require(key)?;
        }

        let detector = (registration.ctor)(config, reference_frame)?;
        info!("✅ 检测器已创建: {} ({}x{})", variant, width, height);
        Ok(detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::{BBox, ObjectType};
    use crate::detection::variant::MotionAlgorithm;

    struct FixedDetector {
        min_size: Size,
    }

    impl Detector for FixedDetector {
        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
            Ok(vec![Detection::new(
                BBox::from_xywh(1.0, 1.0, 4.0, 4.0),
                ObjectType::PERSON,
                0.9,
            )])
        }

        fn set_min_object_size(&mut self, size: Size) {
            self.min_size = size;
        }

        fn min_object_size(&self) -> Size {
            self.min_size
        }

        fn variant(&self) -> DetectorVariant {
            DetectorVariant::YoloDarknet
        }
    }

    fn registry_with_mock() -> DetectorRegistry {
        let mut registry = DetectorRegistry::new();
        registry.register(DetectorVariant::YoloDarknet, &["modelBinary"], |_, _| {
            Ok(Box::new(FixedDetector {
                min_size: Size::default(),
            }) as Box<dyn Detector>)
        });
        registry
    }

    #[test]
    fn test_missing_required_key_fails() {
        let registry = registry_with_mock();
        let frame = RgbImage::new(64, 48);
        let result = registry.create_detector(DetectorVariant::YoloDarknet, &ConfigTable::new(), &frame);
        assert!(matches!(result, Err(DetectorError::MissingKey(ref k)) if k == "modelBinary"));
    }

    #[test]
    fn test_create_with_required_key() {
        let registry = registry_with_mock();
        let frame = RgbImage::new(64, 48);
        let config = ConfigTable::new().with("modelBinary", "yolov4.weights");
        let mut detector = registry
            .create_detector(DetectorVariant::YoloDarknet, &config, &frame)
            .unwrap();
        detector.set_min_object_size(Size::new(3, 2));
        assert_eq!(detector.min_object_size(), Size::new(3, 2));
        assert_eq!(detector.detect(&frame).unwrap().len(), 1);
    }

    #[test]
    fn test_unregistered_variant_and_empty_frame() {
        let registry = registry_with_mock();
        let frame = RgbImage::new(64, 48);
        assert!(matches!(
            registry.create_detector(DetectorVariant::FaceHaar, &ConfigTable::new(), &frame),
            Err(DetectorError::UnsupportedVariant(DetectorVariant::FaceHaar))
        ));

        let empty = RgbImage::new(0, 48);
        let config = ConfigTable::new().with("modelBinary", "x");
        assert!(matches!(
            registry.create_detector(DetectorVariant::YoloDarknet, &config, &empty),
            Err(DetectorError::InvalidFrame { width: 0, .. })
        ));
    }

    #[test]
    fn test_defaults_cover_motion_algorithms() {
        let registry = DetectorRegistry::with_defaults();
        for algo in MotionAlgorithm::ALL {
            assert!(registry.contains(DetectorVariant::Motion(algo)));
        }
        assert!(!registry.contains(DetectorVariant::PedestrianHog));
    }
}
