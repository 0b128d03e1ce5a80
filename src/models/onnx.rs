// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX Runtime 检测后端 (YOLOv8 输出格式)
//!
//! 预处理: 直接缩放到 inputSize × inputSize, 归一化到 [0,1], NCHW
//! 输出:   [1, 4 + nc, N], 每列为 cx, cy, w, h, 各类别得分

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::{Array, ArrayView, IxDyn};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use tracing::{debug, info};

use super::NeuralConfig;
use crate::detection::{
    BBox, ConfigTable, Detection, Detector, DetectorError, DetectorRegistry, DetectorVariant,
    ObjectType, Size,
};
use crate::non_max_suppression;

fn backend_err(e: impl std::fmt::Display) -> DetectorError {
    DetectorError::Backend(e.to_string())
}

pub struct OnnxDetector {
    variant: DetectorVariant,
    session: Session,
    config: NeuralConfig,
    class_types: Option<Vec<ObjectType>>,
    min_object_size: Size,
}

impl OnnxDetector {
    pub fn new(variant: DetectorVariant, config: NeuralConfig) -> Result<Self, DetectorError> {
        // ONNX 模型自带网络结构, 只需要权重文件
        config.check_model_binary()?;

        let session = Session::builder()
            .map_err(backend_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(backend_err)?
            .commit_from_file(&config.model_binary)
            .map_err(backend_err)?;

        let class_types = config
            .load_class_names()?
            .map(|names| names.iter().map(|n| ObjectType::from_name(n)).collect());

        info!(
            "✅ ONNX模型加载成功: {} (输入 {}x{})",
            config.model_binary.display(),
            config.input_size,
            config.input_size
        );

        Ok(Self {
            variant,
            session,
            config,
            class_types,
            min_object_size: Size::default(),
        })
    }

    fn preprocess(&self, frame: &RgbImage) -> Array<f32, IxDyn> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);
        let n = size as usize;
        let mut input = Array::zeros((1, 3, n, n));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
            }
        }
        input.into_dyn()
    }

    fn class_type(&self, class_id: usize) -> ObjectType {
        match &self.class_types {
            Some(types) => types.get(class_id).copied().unwrap_or(ObjectType::UNKNOWN),
            None => ObjectType(class_id as u32),
        }
    }

    fn postprocess(
        &self,
        output: ArrayView<f32, IxDyn>,
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, DetectorError> {
        let shape = output.shape();
        if shape.len() != 3 || shape[1] < 5 {
            return Err(DetectorError::Backend(format!(
                "unexpected output shape {:?}",
                shape
            )));
        }
        let (channels, anchors) = (shape[1], shape[2]);
        let sx = width as f32 / self.config.input_size as f32;
        let sy = height as f32 / self.config.input_size as f32;

        let mut detections = Vec::new();
        for i in 0..anchors {
            let (class_id, score) = (4..channels)
                .map(|c| (c - 4, output[[0, c, i]]))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
            if score < self.config.confidence_threshold {
                continue;
            }
            let object_type = self.class_type(class_id);
            if !self.config.allows(object_type) {
                continue;
            }

            let (cx, cy) = (output[[0, 0, i]] * sx, output[[0, 1, i]] * sy);
            let (w, h) = (output[[0, 2, i]] * sx, output[[0, 3, i]] * sy);
            if (w as i32) < self.min_object_size.width || (h as i32) < self.min_object_size.height {
                continue;
            }
            let bbox = BBox::new(
                (cx - w / 2.0).max(0.0),
                (cy - h / 2.0).max(0.0),
                (cx + w / 2.0).min(width as f32),
                (cy + h / 2.0).min(height as f32),
            );
            detections.push(Detection::new(bbox, object_type, score));
        }

        non_max_suppression(&mut detections, self.config.nms_threshold);
        Ok(detections)
    }
}

impl Detector for OnnxDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        let input = self.preprocess(frame);
        let tensor = TensorRef::from_array_view(&input).map_err(backend_err)?;
        let outputs = self.session.run(ort::inputs![tensor]).map_err(backend_err)?;
        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(backend_err)?
            .into_owned();
        drop(outputs);

        let detections = self.postprocess(output.view(), frame.width(), frame.height())?;
        debug!("onnx detections: {}", detections.len());
        Ok(detections)
    }

    fn set_min_object_size(&mut self, size: Size) {
        self.min_object_size = size;
    }

    fn min_object_size(&self) -> Size {
        self.min_object_size
    }

    fn variant(&self) -> DetectorVariant {
        self.variant
    }
}

/// 注册神经网络变体
pub fn register(registry: &mut DetectorRegistry) {
    for variant in [
        DetectorVariant::DnnOpenCv,
        DetectorVariant::YoloDarknet,
        DetectorVariant::YoloTensorRt,
    ] {
        let required: &[&'static str] = match variant {
            DetectorVariant::YoloTensorRt => &["modelBinary", "net_type"],
            _ => &["modelBinary"],
        };
        registry.register(variant, required, move |table: &ConfigTable, _frame| {
            let config = NeuralConfig::from_table(table)?;
            Ok(Box::new(OnnxDetector::new(variant, config)?) as Box<dyn Detector>)
        });
    }
}
