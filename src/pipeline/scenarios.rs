// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 演示场景 (检测器 + 跟踪器 + 渲染策略)
//!
//! | 场景           | 检测器         | 最小目标        | 距离度量 | 绘制                          |
//! |----------------|----------------|-----------------|----------|-------------------------------|
//! | motion         | motion-vibe    | (W/20, W/20)    | Rects    | 遗留物 + 轨迹 + 运动图        |
//! | face           | face-haar      | (W/20, H/20)    | Jaccard  | 轨迹 + 运动图                 |
//! | pedestrian     | pedestrian-c4  | (W/20, H/20)    | Rects    | 轨迹 + 运动图                 |
//! | dnn            | dnn-ocv        | (W/40, H/40)    | Centers  | 框 + "类型: 置信度"           |
//! | yolo-darknet   | yolo-darknet   | (W/40, H/40)    | Centers  | 框 + "类型: 置信度"           |
//! | yolo-tensorrt  | yolo-tensorrt  | (W/40, H/40)    | Centers  | 轨迹 + "类型 速度: 置信度"    |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use image::Rgb;
use phf::phf_map;

use crate::detection::{
    ConfigTable, DetectorError, DetectorVariant, MotionAlgorithm, ObjectType, Size,
};
use crate::models::{data_path, NnModel};
use crate::tracking::{
    DistanceMetric, FilterGoal, KalmanType, LostTrackType, MatchType, TimeConstantMode,
    TrackerSettings,
};

/// 可靠轨迹阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustThresholds {
    pub min_trace_size: usize,
    pub min_raw_ratio: f32,
    /// 宽高比范围 (宽/高)
    pub aspect: (f32, f32),
}

impl RobustThresholds {
    pub fn new(min_trace_size: usize, min_raw_ratio: f32) -> Self {
        Self {
            min_trace_size,
            min_raw_ratio,
            aspect: (0.1, 8.0),
        }
    }
}

/// 标签内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    None,
    /// "person: 0.87"
    TypeConf,
    /// "car [12, -3.4]: 0.91"
    TypeVelocityConf,
}

/// 渲染策略
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPolicy {
    pub robust: RobustThresholds,
    /// 静止轨迹走遗留物路径
    pub abandoned_path: bool,
    pub draw_trajectory: bool,
    pub label: LabelStyle,
    pub label_color: Rgb<u8>,
    pub abandoned_color: Rgb<u8>,
    pub label_alpha: u8,
    /// 叠加检测器的运动图
    pub draw_motion_map: bool,
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self {
            robust: RobustThresholds::new(3, 0.5),
            abandoned_path: false,
            draw_trajectory: true,
            label: LabelStyle::None,
            label_color: LABEL_GRAY,
            abandoned_color: ABANDONED_MAGENTA,
            label_alpha: 150,
            draw_motion_map: false,
        }
    }
}

pub const LABEL_GRAY: Rgb<u8> = Rgb([200, 200, 200]);
pub const ABANDONED_MAGENTA: Rgb<u8> = Rgb([255, 0, 255]);

/// 场景的运行时参数
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioContext {
    /// 模型文件目录
    pub data_dir: PathBuf,
    /// 最小静止时间 (秒)
    pub min_static_time: i32,
    /// 最大静止时间 (秒)
    pub max_static_time: i32,
}

impl Default for ScenarioContext {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("../data/"),
            min_static_time: 5,
            max_static_time: 10,
        }
    }
}

/// 场景: 决定检测器、跟踪器参数与渲染策略
pub trait Scenario: Send {
    fn name(&self) -> &str;

    fn variant(&self) -> DetectorVariant;

    /// 检测器配置表
    fn config_table(&self, ctx: &ScenarioContext, fps: f32) -> ConfigTable;

    /// 由帧尺寸推导的最小目标尺寸
    fn min_object_size(&self, frame: Size) -> Size;

    /// 跟踪器参数 (帧尺寸 + 实测帧率)
    fn tracker_settings(&self, ctx: &ScenarioContext, frame: Size, fps: f32) -> TrackerSettings;

    fn render_policy(&self, fps: f32) -> RenderPolicy;
}

/// 行人检测器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PedestrianKind {
    Hog,
    C4,
}

impl PedestrianKind {
    fn detector_type(self) -> &'static str {
        match self {
            PedestrianKind::Hog => "HOG",
            PedestrianKind::C4 => "C4",
        }
    }
}

/// 内置的六个演示场景
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Motion(MotionAlgorithm),
    Face,
    Pedestrian(PedestrianKind),
    OpenCvDnn(NnModel),
    YoloDarknet(NnModel),
    YoloTensorRt(NnModel),
}

static PROFILE_TAGS: phf::Map<&'static str, Profile> = phf_map! {
    "motion" => Profile::Motion(MotionAlgorithm::Vibe),
    "face" => Profile::Face,
    "pedestrian" => Profile::Pedestrian(PedestrianKind::C4),
    "dnn" => Profile::OpenCvDnn(NnModel::MobileNetSsd),
    "yolo-darknet" => Profile::YoloDarknet(NnModel::YoloV4),
    "yolo-tensorrt" => Profile::YoloTensorRt(NnModel::YoloV4),
};

fn round_frames(k: f32, fps: f32) -> usize {
    (k * fps).round_ties_even().max(0.0) as usize
}

impl Profile {
    pub fn tag(&self) -> &'static str {
        match self {
            Profile::Motion(_) => "motion",
            Profile::Face => "face",
            Profile::Pedestrian(_) => "pedestrian",
            Profile::OpenCvDnn(_) => "dnn",
            Profile::YoloDarknet(_) => "yolo-darknet",
            Profile::YoloTensorRt(_) => "yolo-tensorrt",
        }
    }

    pub fn tags() -> impl Iterator<Item = &'static str> {
        PROFILE_TAGS.keys().copied()
    }

    /// 用检测器标签替换场景默认的检测器
    ///
    /// 运动场景可切换背景建模算法, 行人场景可切换 HOG / C4; 其他场景只接受自身的变体。
    pub fn with_variant(self, variant: DetectorVariant) -> Result<Self, DetectorError> {
        match (self, variant) {
            (Profile::Motion(_), DetectorVariant::Motion(algo)) => Ok(Profile::Motion(algo)),
            (Profile::Pedestrian(_), DetectorVariant::PedestrianHog) => {
                Ok(Profile::Pedestrian(PedestrianKind::Hog))
            }
            (Profile::Pedestrian(_), DetectorVariant::PedestrianC4) => {
                Ok(Profile::Pedestrian(PedestrianKind::C4))
            }
            (p, v) if p.variant() == v => Ok(p),
            (_, v) => Err(DetectorError::UnsupportedVariant(v)),
        }
    }

    fn motion_config(algo: MotionAlgorithm, ctx: &ScenarioContext, fps: f32) -> ConfigTable {
        let min_static = ctx.min_static_time as f32;
        let mut config = ConfigTable::new();
        config.emplace("useRotatedRect", "0");
        match algo {
            MotionAlgorithm::Vibe => {
                config
                    .emplace("samples", "20")
                    .emplace("pixelNeighbor", "1")
                    .emplace("distanceThreshold", "20")
                    .emplace("matchingThreshold", "3")
                    .emplace("updateFactor", "16");
            }
            MotionAlgorithm::Mog => {
                config
                    .emplace("history", round_frames(50.0 * min_static, fps).to_string())
                    .emplace("nmixtures", "3")
                    .emplace("backgroundRatio", "0.7")
                    .emplace("noiseSigma", "0");
            }
            MotionAlgorithm::Gmg => {
                config
                    .emplace("initializationFrames", "50")
                    .emplace("decisionThreshold", "0.7");
            }
            MotionAlgorithm::Cnt => {
                config
                    .emplace("minPixelStability", "15")
                    .emplace(
                        "maxPixelStability",
                        round_frames(20.0 * min_static, fps).to_string(),
                    )
                    .emplace("useHistory", "1")
                    .emplace("isParallel", "1");
            }
            MotionAlgorithm::SuBSENSE | MotionAlgorithm::Lobster => {}
            MotionAlgorithm::Mog2 => {
                config
                    .emplace("history", round_frames(20.0 * min_static, fps).to_string())
                    .emplace("varThreshold", "10")
                    .emplace("detectShadows", "1");
            }
        }
        config
    }

    fn emplace_white_list(config: &mut ConfigTable) {
        for t in [
            ObjectType::PERSON,
            ObjectType::CAR,
            ObjectType::BICYCLE,
            ObjectType::MOTORBIKE,
            ObjectType::BUS,
            ObjectType::TRUCK,
        ] {
            config.emplace("white_list", t.0.to_string());
        }
    }
}

impl FromStr for Profile {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PROFILE_TAGS
            .get(s.trim().to_lowercase().as_str())
            .copied()
            .ok_or_else(|| DetectorError::UnknownTag(s.to_string()))
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Scenario for Profile {
    fn name(&self) -> &str {
        self.tag()
    }

    fn variant(&self) -> DetectorVariant {
        match self {
            Profile::Motion(algo) => DetectorVariant::Motion(*algo),
            Profile::Face => DetectorVariant::FaceHaar,
            Profile::Pedestrian(PedestrianKind::Hog) => DetectorVariant::PedestrianHog,
            Profile::Pedestrian(PedestrianKind::C4) => DetectorVariant::PedestrianC4,
            Profile::OpenCvDnn(_) => DetectorVariant::DnnOpenCv,
            Profile::YoloDarknet(_) => DetectorVariant::YoloDarknet,
            Profile::YoloTensorRt(_) => DetectorVariant::YoloTensorRt,
        }
    }

    fn config_table(&self, ctx: &ScenarioContext, fps: f32) -> ConfigTable {
        let dir = ctx.data_dir.as_path();
        match *self {
            Profile::Motion(algo) => Self::motion_config(algo, ctx, fps),
            Profile::Face => ConfigTable::new().with(
                "cascadeFileName",
                data_path(dir, "haarcascade_frontalface_alt2.xml"),
            ),
            Profile::Pedestrian(kind) => ConfigTable::new()
                .with("detectorType", kind.detector_type())
                .with("cascadeFileName1", data_path(dir, "combined.txt.model"))
                .with("cascadeFileName2", data_path(dir, "combined.txt.model_")),
            Profile::OpenCvDnn(model) => {
                let mut config = ConfigTable::new();
                model.emplace_files(&mut config, dir);
                config
                    .emplace("classNames", data_path(dir, model.class_names_file()))
                    .emplace("confidenceThreshold", model.confidence_threshold().to_string())
                    .emplace("maxCropRatio", "-1")
                    .emplace("dnnTarget", "DNN_TARGET_CPU")
                    .emplace("dnnBackend", "DNN_BACKEND_DEFAULT");
                config
            }
            Profile::YoloDarknet(model) => {
                let mut config = ConfigTable::new();
                model.emplace_files(&mut config, dir);
                config
                    .emplace("confidenceThreshold", model.confidence_threshold().to_string())
                    .emplace("classNames", data_path(dir, "coco.names"))
                    .emplace("maxCropRatio", "-1");
                Self::emplace_white_list(&mut config);
                config
            }
            Profile::YoloTensorRt(model) => {
                let mut config = ConfigTable::new();
                model.emplace_files(&mut config, dir);
                // 没有预设时不写 net_type, 构造检测器时报 MissingKey
                if let Some(preset) = model.tensorrt() {
                    config
                        .emplace("confidenceThreshold", preset.confidence_threshold.to_string())
                        .emplace("inference_precison", "FP32")
                        .emplace("net_type", preset.net_type)
                        .emplace("maxBatch", preset.max_batch.to_string())
                        .emplace("maxCropRatio", preset.max_crop_ratio.to_string());
                }
                config.emplace("classNames", data_path(dir, "coco.names"));
                Self::emplace_white_list(&mut config);
                config
            }
        }
    }

    fn min_object_size(&self, frame: Size) -> Size {
        match self {
            Profile::Motion(_) => Size::new(frame.width / 20, frame.width / 20),
            Profile::Face | Profile::Pedestrian(_) => Size::new(frame.width / 20, frame.height / 20),
            _ => Size::new(frame.width / 40, frame.height / 40),
        }
    }

    fn tracker_settings(&self, ctx: &ScenarioContext, frame: Size, fps: f32) -> TrackerSettings {
        let mut s = TrackerSettings {
            kalman_type: KalmanType::Linear,
            lost_track_type: LostTrackType::Csrt,
            match_type: MatchType::Hungarian,
            use_acceleration: false,
            ..Default::default()
        };
        let radius_h20 = frame.height as f32 / 20.0;

        match self {
            Profile::Motion(_) => {
                s.distance_metric = DistanceMetric::Rects;
                s.filter_goal = FilterGoal::Center;
                s.dt = 0.2;
                s.accel_noise_mag = 0.2;
                s.dist_thres = 0.95;
                s.min_area_radius_pix = -1.0;
                s.min_area_radius_k = 0.8;

                s.use_abandoned_detection = true;
                s.min_static_time = ctx.min_static_time;
                s.max_static_time = ctx.max_static_time;
                s.set_time_constants(
                    fps,
                    TimeConstantMode::Abandoned {
                        min_static_time: ctx.min_static_time as f32,
                    },
                );
            }
            Profile::Face => {
                s.distance_metric = DistanceMetric::Jaccard;
                s.kalman_type = KalmanType::Unscented;
                s.filter_goal = FilterGoal::Rect;
                s.dt = 0.3;
                s.accel_noise_mag = 0.1;
                s.dist_thres = 0.8;
                s.min_area_radius_pix = radius_h20;
                s.set_time_constants(fps, TimeConstantMode::Fixed { skip_k: 0.5, trace_k: 5.0 });
            }
            Profile::Pedestrian(_) => {
                s.distance_metric = DistanceMetric::Rects;
                s.filter_goal = FilterGoal::Rect;
                s.dt = 0.3;
                s.accel_noise_mag = 0.1;
                s.dist_thres = 0.8;
                s.min_area_radius_pix = radius_h20;
                s.set_time_constants(fps, TimeConstantMode::Fixed { skip_k: 1.0, trace_k: 5.0 });
            }
            Profile::OpenCvDnn(_) | Profile::YoloDarknet(_) => {
                s.distance_metric = DistanceMetric::Centers;
                s.filter_goal = FilterGoal::Rect;
                s.dt = 0.4;
                s.accel_noise_mag = 0.2;
                s.dist_thres = 0.8;
                s.min_area_radius_pix = -1.0;
                s.min_area_radius_k = 0.8;
                s.set_time_constants(fps, TimeConstantMode::Fixed { skip_k: 2.0, trace_k: 2.0 });

                if matches!(self, Profile::YoloDarknet(_)) {
                    s.add_near_types(ObjectType::CAR, ObjectType::BUS, true);
                    s.add_near_types(ObjectType::CAR, ObjectType::TRUCK, true);
                    s.add_near_types(ObjectType::BUS, ObjectType::TRUCK, true);
                    s.add_near_types(ObjectType::PERSON, ObjectType::BICYCLE, true);
                    s.add_near_types(ObjectType::PERSON, ObjectType::MOTORBIKE, true);
                }
            }
            Profile::YoloTensorRt(_) => {
                s.distance_metric = DistanceMetric::Centers;
                s.filter_goal = FilterGoal::Center;
                s.lost_track_type = LostTrackType::Kcf;
                s.dt = 0.3;
                s.accel_noise_mag = 0.2;
                s.dist_thres = 0.8;
                s.min_area_radius_pix = radius_h20;
                s.set_time_constants(fps, TimeConstantMode::Fixed { skip_k: 2.0, trace_k: 5.0 });

                s.add_near_types(ObjectType::CAR, ObjectType::BUS, false);
                s.add_near_types(ObjectType::CAR, ObjectType::TRUCK, false);
                s.add_near_types(ObjectType::PERSON, ObjectType::BICYCLE, true);
                s.add_near_types(ObjectType::PERSON, ObjectType::MOTORBIKE, true);
            }
        }
        s
    }

    fn render_policy(&self, fps: f32) -> RenderPolicy {
        match self {
            Profile::Motion(_) => RenderPolicy {
                robust: RobustThresholds::new(round_frames(0.25, fps), 0.7),
                abandoned_path: true,
                draw_trajectory: true,
                draw_motion_map: true,
                ..Default::default()
            },
            Profile::Face => RenderPolicy {
                robust: RobustThresholds::new(8, 0.4),
                draw_motion_map: true,
                ..Default::default()
            },
            Profile::Pedestrian(_) => RenderPolicy {
                robust: RobustThresholds::new(round_frames(0.5, fps), 0.4),
                draw_motion_map: true,
                ..Default::default()
            },
            Profile::OpenCvDnn(_) | Profile::YoloDarknet(_) => RenderPolicy {
                robust: RobustThresholds::new(3, 0.5),
                draw_trajectory: false,
                label: LabelStyle::TypeConf,
                ..Default::default()
            },
            Profile::YoloTensorRt(_) => RenderPolicy {
                robust: RobustThresholds::new(2, 0.5),
                draw_trajectory: true,
                label: LabelStyle::TypeVelocityConf,
                ..Default::default()
            },
        }
    }
}
