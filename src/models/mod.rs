// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 神经网络检测器配置与预设
///
/// # 架构说明
///
/// ## 配置解析 (NeuralConfig)
/// - 从 `ConfigTable` 解析所有神经网络变体共用的键
/// - `modelBinary` 必填, 其余键有默认值
/// - 模型文件不存在时返回 `ModelNotFound`
///
/// ## 模型预设 (NnModel)
/// - TinyYOLOv3 / YOLOv3 / YOLOv4 / TinyYOLOv4 / YOLOv5 / MobileNetSSD
/// - 文件名、置信度阈值、TensorRT 的 net_type / maxBatch / maxCropRatio
///
/// ## ONNX 后端 (可选功能 `onnx`)
/// - `onnx.rs`: ort 会话 + YOLOv8 输出解码, 注册到 DNN / Darknet / TensorRT 变体
use std::path::{Path, PathBuf};

use crate::detection::{ConfigTable, DetectorError, ObjectType};

#[cfg(feature = "onnx")]
pub mod onnx;

/// 神经网络检测器的通用配置
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralConfig {
    pub model_binary: PathBuf,
    pub model_configuration: Option<PathBuf>,
    pub class_names: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    /// 类别白名单 (为空表示不过滤)
    pub white_list: Vec<ObjectType>,
    pub max_batch: usize,
    /// 最大裁剪比例, < 0 表示不裁剪
    pub max_crop_ratio: f32,
    pub inference_precision: Option<String>,
    pub net_type: Option<String>,
    pub dnn_target: Option<String>,
    pub dnn_backend: Option<String>,
    /// 网络输入尺寸 (正方形)
    pub input_size: u32,
}

impl NeuralConfig {
    pub fn from_table(config: &ConfigTable) -> Result<Self, DetectorError> {
        let white_list = config
            .get_all("white_list")
            .iter()
            .map(|entry| match entry.trim().parse::<u32>() {
                Ok(id) => Ok(ObjectType(id)),
                Err(_) => match ObjectType::from_name(entry) {
                    ObjectType::UNKNOWN => Err(DetectorError::InvalidValue {
                        key: "white_list".to_string(),
                        value: entry.clone(),
                    }),
                    t => Ok(t),
                },
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            model_binary: PathBuf::from(config.require("modelBinary")?),
            model_configuration: config.get("modelConfiguration").map(PathBuf::from),
            class_names: config.get("classNames").map(PathBuf::from),
            confidence_threshold: config.parse_or("confidenceThreshold", 0.5)?,
            nms_threshold: config.parse_or("nmsThreshold", 0.4)?,
            white_list,
            max_batch: config.parse_or("maxBatch", 1usize)?.max(1),
            max_crop_ratio: config.parse_or("maxCropRatio", -1.0)?,
            inference_precision: config.get("inference_precison").map(str::to_string),
            net_type: config.get("net_type").map(str::to_string),
            dnn_target: config.get("dnnTarget").map(str::to_string),
            dnn_backend: config.get("dnnBackend").map(str::to_string),
            input_size: config.parse_or("inputSize", 640u32)?.max(32),
        })
    }

    /// 检查权重文件是否存在
    pub fn check_model_binary(&self) -> Result<(), DetectorError> {
        if !self.model_binary.is_file() {
            return Err(DetectorError::ModelNotFound(
                self.model_binary.display().to_string(),
            ));
        }
        Ok(())
    }

    /// 检查权重与网络结构文件是否存在
    pub fn check_files(&self) -> Result<(), DetectorError> {
        self.check_model_binary()?;
        if let Some(cfg) = &self.model_configuration {
            if !cfg.is_file() {
                return Err(DetectorError::ModelNotFound(cfg.display().to_string()));
            }
        }
        Ok(())
    }

    /// 是否通过白名单
    pub fn allows(&self, object_type: ObjectType) -> bool {
        self.white_list.is_empty() || self.white_list.contains(&object_type)
    }

    /// 读取类别名文件 (每行一个类别)
    pub fn load_class_names(&self) -> Result<Option<Vec<String>>, DetectorError> {
        let Some(path) = &self.class_names else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path)
            .map_err(|_| DetectorError::ModelNotFound(path.display().to_string()))?;
        Ok(Some(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }
}

/// 神经网络模型预设
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NnModel {
    TinyYoloV3,
    YoloV3,
    YoloV4,
    TinyYoloV4,
    YoloV5,
    MobileNetSsd,
}

/// TensorRT 专用参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorRtPreset {
    pub confidence_threshold: f32,
    pub net_type: &'static str,
    pub max_batch: usize,
    pub max_crop_ratio: i32,
}

impl NnModel {
    /// (网络结构文件, 权重文件)
    pub fn files(&self) -> (&'static str, &'static str) {
        match self {
            NnModel::TinyYoloV3 => ("yolov3-tiny.cfg", "yolov3-tiny.weights"),
            NnModel::YoloV3 => ("yolov3.cfg", "yolov3.weights"),
            NnModel::YoloV4 => ("yolov4.cfg", "yolov4.weights"),
            NnModel::TinyYoloV4 => ("yolov4-tiny.cfg", "yolov4-tiny.weights"),
            NnModel::YoloV5 => ("yolov5x.cfg", "yolov5x.weights"),
            NnModel::MobileNetSsd => ("MobileNetSSD_deploy.prototxt", "MobileNetSSD_deploy.caffemodel"),
        }
    }

    pub fn class_names_file(&self) -> &'static str {
        match self {
            NnModel::MobileNetSsd => "voc.names",
            _ => "coco.names",
        }
    }

    /// OpenCV DNN / Darknet 使用的置信度阈值
    pub fn confidence_threshold(&self) -> f32 {
        match self {
            NnModel::YoloV3 => 0.7,
            _ => 0.5,
        }
    }

    /// TensorRT 预设, 只有 YOLO 系列有; MobileNet-SSD 返回 None
    pub fn tensorrt(&self) -> Option<TensorRtPreset> {
        let (confidence_threshold, net_type, max_batch, max_crop_ratio) = match self {
            NnModel::TinyYoloV3 => (0.5, "YOLOV3_TINY", 4, 2),
            NnModel::YoloV3 => (0.7, "YOLOV3", 2, -1),
            NnModel::YoloV4 => (0.8, "YOLOV4", 1, -1),
            NnModel::TinyYoloV4 => (0.5, "YOLOV4_TINY", 4, 1),
            NnModel::YoloV5 => (0.5, "YOLOV5", 1, -1),
            NnModel::MobileNetSsd => return None,
        };
        Some(TensorRtPreset {
            confidence_threshold,
            net_type,
            max_batch,
            max_crop_ratio,
        })
    }

    /// 把模型文件写入配置表
    pub fn emplace_files(&self, config: &mut ConfigTable, data_dir: &Path) {
        let (cfg, weights) = self.files();
        config.emplace("modelConfiguration", data_path(data_dir, cfg));
        config.emplace("modelBinary", data_path(data_dir, weights));
    }
}

/// 数据目录下的文件路径
pub fn data_path(data_dir: &Path, file: &str) -> String {
    data_dir.join(file).to_string_lossy().into_owned()
}
