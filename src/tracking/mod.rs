// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 多目标跟踪模块
//! Multi-object tracking: settings, tracker builder, tracks

pub mod assignment;
pub mod kalman;
pub mod settings;
pub mod track;
pub mod tracker;

pub use settings::{
    derive_time_constants, DistanceMetric, FilterGoal, KalmanType, LostTrackType, MatchType,
    NearTypes, TimeConstantMode, TrackerSettings,
};
pub use track::{TracePoint, Track};
pub use tracker::{MultiObjectTracker, Tracker};

use tracing::info;

/// 构建跟踪器
///
/// 纯配置组装, 不会失败: 不一致的参数按默认值修正。
/// 丢失找回跟踪器类型与卡尔曼族仅被记录, 内置跟踪器不做视觉重识别。
pub fn build_tracker(settings: TrackerSettings) -> Box<dyn Tracker> {
    let tracker = MultiObjectTracker::new(settings);
    let s = tracker.settings();
    info!(
        "🎯 跟踪器: {:?}/{:?}/{:?} 匹配={:?} 丢失找回={:?} 最大跳帧={} 轨迹长度={}{}",
        s.distance_metric,
        s.kalman_type,
        s.filter_goal,
        s.match_type,
        s.lost_track_type,
        s.max_skipped_frames,
        s.max_trace_length,
        if s.use_abandoned_detection {
            format!(" 遗留物检测={}..{}s", s.min_static_time, s.max_static_time)
        } else {
            String::new()
        }
    );
    Box::new(tracker)
}
