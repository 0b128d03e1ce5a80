// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器变体标签 (Detector variant tags)

use std::fmt;
use std::str::FromStr;

use phf::phf_map;

use super::detector::DetectorError;

/// 运动分割算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionAlgorithm {
    Vibe,
    Mog,
    Gmg,
    Cnt,
    SuBSENSE,
    Lobster,
    Mog2,
}

impl MotionAlgorithm {
    pub const ALL: [MotionAlgorithm; 7] = [
        MotionAlgorithm::Vibe,
        MotionAlgorithm::Mog,
        MotionAlgorithm::Gmg,
        MotionAlgorithm::Cnt,
        MotionAlgorithm::SuBSENSE,
        MotionAlgorithm::Lobster,
        MotionAlgorithm::Mog2,
    ];
}

/// 检测后端变体, 每条流水线只激活一个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorVariant {
    Motion(MotionAlgorithm),
    FaceHaar,
    PedestrianHog,
    PedestrianC4,
    DnnOpenCv,
    YoloDarknet,
    YoloTensorRt,
}

static VARIANT_TAGS: phf::Map<&'static str, DetectorVariant> = phf_map! {
    "motion-vibe" => DetectorVariant::Motion(MotionAlgorithm::Vibe),
    "motion-mog" => DetectorVariant::Motion(MotionAlgorithm::Mog),
    "motion-gmg" => DetectorVariant::Motion(MotionAlgorithm::Gmg),
    "motion-cnt" => DetectorVariant::Motion(MotionAlgorithm::Cnt),
    "motion-subsense" => DetectorVariant::Motion(MotionAlgorithm::SuBSENSE),
    "motion-lobster" => DetectorVariant::Motion(MotionAlgorithm::Lobster),
    "motion-mog2" => DetectorVariant::Motion(MotionAlgorithm::Mog2),
    "face-haar" => DetectorVariant::FaceHaar,
    "pedestrian-hog" => DetectorVariant::PedestrianHog,
    "pedestrian-c4" => DetectorVariant::PedestrianC4,
    "dnn-ocv" => DetectorVariant::DnnOpenCv,
    "yolo-darknet" => DetectorVariant::YoloDarknet,
    "yolo-tensorrt" => DetectorVariant::YoloTensorRt,
};

impl DetectorVariant {
    /// 字符串标签
    pub fn tag(&self) -> &'static str {
        match self {
            DetectorVariant::Motion(MotionAlgorithm::Vibe) => "motion-vibe",
            DetectorVariant::Motion(MotionAlgorithm::Mog) => "motion-mog",
            DetectorVariant::Motion(MotionAlgorithm::Gmg) => "motion-gmg",
            DetectorVariant::Motion(MotionAlgorithm::Cnt) => "motion-cnt",
            DetectorVariant::Motion(MotionAlgorithm::SuBSENSE) => "motion-subsense",
            DetectorVariant::Motion(MotionAlgorithm::Lobster) => "motion-lobster",
            DetectorVariant::Motion(MotionAlgorithm::Mog2) => "motion-mog2",
            DetectorVariant::FaceHaar => "face-haar",
            DetectorVariant::PedestrianHog => "pedestrian-hog",
            DetectorVariant::PedestrianC4 => "pedestrian-c4",
            DetectorVariant::DnnOpenCv => "dnn-ocv",
            DetectorVariant::YoloDarknet => "yolo-darknet",
            DetectorVariant::YoloTensorRt => "yolo-tensorrt",
        }
    }

    /// 所有已知标签
    pub fn tags() -> impl Iterator<Item = &'static str> {
        VARIANT_TAGS.keys().copied()
    }

    pub fn is_motion(&self) -> bool {
        matches!(self, DetectorVariant::Motion(_))
    }

    /// 神经网络检测器 (最小目标尺寸使用 帧/40)
    pub fn is_neural(&self) -> bool {
        matches!(
            self,
            DetectorVariant::DnnOpenCv | DetectorVariant::YoloDarknet | DetectorVariant::YoloTensorRt
        )
    }
}

impl FromStr for DetectorVariant {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VARIANT_TAGS
            .get(s.trim().to_lowercase().as_str())
            .copied()
            .ok_or_else(|| DetectorError::UnknownTag(s.to_string()))
    }
}

impl fmt::Display for DetectorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
