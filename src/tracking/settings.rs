// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 跟踪器参数 (Tracker settings) 与时间常数推导

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detection::ObjectType;

/// 检测与轨迹之间的距离度量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// 中心点距离
    Centers,
    /// 矩形重叠 (1 - IoU)
    Rects,
    /// 轮廓 Jaccard 相似度
    Jaccard,
}

/// 卡尔曼滤波族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KalmanType {
    Linear,
    Unscented,
}

/// 滤波目标: 只跟踪中心点, 或整个矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterGoal {
    Center,
    Rect,
}

/// 丢失后用于找回目标的视觉跟踪器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LostTrackType {
    None,
    Kcf,
    Csrt,
    DaSiamRpn,
}

/// 分配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    Hungarian,
    Bipartite,
}

/// 相近类型对 (允许跨类型匹配)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearTypes {
    pub track_type: ObjectType,
    pub detection_type: ObjectType,
}

/// 时间常数推导模式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeConstantMode {
    /// 开启遗留物检测: skip = round(min_static_time * fps), trace = 2 * skip
    Abandoned { min_static_time: f32 },
    /// 关闭: skip = round(skip_k * fps), trace = round(trace_k * fps)
    Fixed { skip_k: f32, trace_k: f32 },
}

/// 由实测帧率推导 (最大跳帧数, 最大轨迹长度), 半数取偶
pub fn derive_time_constants(fps: f32, mode: TimeConstantMode) -> (usize, usize) {
    let frames = |k: f32| (k * fps).round_ties_even().max(0.0) as usize;
    match mode {
        TimeConstantMode::Abandoned { min_static_time } => {
            let skip = frames(min_static_time);
            (skip, 2 * skip)
        }
        TimeConstantMode::Fixed { skip_k, trace_k } => (frames(skip_k), frames(trace_k)),
    }
}

/// 跟踪器参数, 构造后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    pub distance_metric: DistanceMetric,
    pub kalman_type: KalmanType,
    pub filter_goal: FilterGoal,
    pub lost_track_type: LostTrackType,
    pub match_type: MatchType,

    /// 匀加速模型 (false 为匀速)
    pub use_acceleration: bool,
    /// 时间步长
    pub dt: f32,
    /// 过程噪声幅度
    pub accel_noise_mag: f32,

    /// 距离接受阈值
    pub dist_thres: f32,
    /// 最小轨迹半径 (像素), <= 0 表示使用相对半径
    pub min_area_radius_pix: f32,
    /// 相对半径系数 (目标尺寸的倍数)
    pub min_area_radius_k: f32,

    pub max_skipped_frames: usize,
    pub max_trace_length: usize,

    /// 遗留物 (静止目标) 检测
    pub use_abandoned_detection: bool,
    /// 最小静止时间 (秒)
    pub min_static_time: i32,
    /// 最大静止时间 (秒)
    pub max_static_time: i32,

    pub near_types: Vec<NearTypes>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            distance_metric: DistanceMetric::Centers,
            kalman_type: KalmanType::Linear,
            filter_goal: FilterGoal::Center,
            lost_track_type: LostTrackType::None,
            match_type: MatchType::Hungarian,
            use_acceleration: false,
            dt: 0.2,
            accel_noise_mag: 0.1,
            dist_thres: 0.5,
            min_area_radius_pix: 20.0,
            min_area_radius_k: 0.5,
            max_skipped_frames: 25,
            max_trace_length: 50,
            use_abandoned_detection: false,
            min_static_time: 5,
            max_static_time: 25,
            near_types: Vec::new(),
        }
    }
}

impl TrackerSettings {
    /// 声明相近类型 (symmetric 为 true 时双向生效)
    pub fn add_near_types(&mut self, a: ObjectType, b: ObjectType, symmetric: bool) {
        let mut push = |track_type, detection_type| {
            let pair = NearTypes {
                track_type,
                detection_type,
            };
            if !self.near_types.contains(&pair) {
                self.near_types.push(pair);
            }
        };
        push(a, b);
        if symmetric {
            push(b, a);
        }
    }

    /// 检测类型能否匹配到该类型的轨迹
    pub fn types_compatible(&self, track_type: ObjectType, detection_type: ObjectType) -> bool {
        track_type == detection_type
            || self
                .near_types
                .iter()
                .any(|p| p.track_type == track_type && p.detection_type == detection_type)
    }

    /// 按帧率设置时间常数
    pub fn set_time_constants(&mut self, fps: f32, mode: TimeConstantMode) {
        let (skip, trace) = derive_time_constants(fps, mode);
        self.max_skipped_frames = skip;
        self.max_trace_length = trace;
    }

    /// 修正不一致的参数 (使用文档化的默认值, 不报错)
    pub fn normalized(mut self) -> Self {
        if self.use_abandoned_detection {
            if self.min_static_time <= 0 {
                warn!(
                    "⚠️ min_static_time = {} with abandoned detection, using 5 s",
                    self.min_static_time
                );
                self.min_static_time = 5;
            }
            if self.max_static_time < self.min_static_time {
                self.max_static_time = 2 * self.min_static_time;
            }
        }
        if self.max_skipped_frames == 0 {
            self.max_skipped_frames = 1;
        }
        if self.max_trace_length == 0 {
            self.max_trace_length = 1;
        }
        if !(self.dt > 0.0) {
            self.dt = 0.2;
        }
        debug!(
            "tracker settings: metric={:?} match={:?} skip={} trace={}",
            self.distance_metric, self.match_type, self.max_skipped_frames, self.max_trace_length
        );
        self
    }
}
