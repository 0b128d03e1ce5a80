// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行与JSON配置
pub mod detection; // 检测器工厂与内置运动检测
pub mod input; // 帧源与输出
pub mod logging; // 日志初始化
pub mod models; // 神经网络配置与ONNX后端
pub mod pipeline; // 逐帧流水线与演示场景
pub mod renderer; // 叠加绘制
pub mod tracking; // 多目标跟踪

use chrono::Offset;

pub use crate::config::{AppConfig, Args, TrackerOverrides};
pub use crate::detection::{
    BBox, ConfigTable, Detection, Detector, DetectorError, DetectorRegistry, DetectorVariant,
    ObjectType,
};
pub use crate::pipeline::{
    Pipeline, PipelineError, PipelineOptions, PipelineState, Profile, Scenario, StopFlag,
};
pub use crate::tracking::{build_tracker, Track, Tracker, TrackerSettings};

/// 非极大值抑制 (按置信度降序, 与已保留框 IoU 超过阈值的丢弃)
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].bbox.iou(&xs[index].bbox);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

pub fn gen_time_string(delimiter: &str) -> String {
    let offset = chrono::FixedOffset::east_opt(8 * 60 * 60) // Beijing
        .unwrap_or_else(|| chrono::Utc.fix());
    let t_now = chrono::Utc::now().with_timezone(&offset);
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
