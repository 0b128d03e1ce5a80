// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 多目标跟踪器 (Multi-object tracker)
//!
//! 预测 → 距离矩阵 (类型门控) → 分配 → 更新/预测填充 → 删除超时轨迹 → 新建轨迹

use image::RgbImage;

use crate::detection::{BBox, Detection, Point2, RotatedRect, Size2f};

use super::assignment::assign;
use super::kalman::KalmanBoxFilter;
use super::settings::{DistanceMetric, FilterGoal, TrackerSettings};
use super::track::{TracePoint, Track};

/// 速度估计使用的轨迹点数
const VELOCITY_WINDOW: usize = 5;
/// 静止判定: 相对锚点的最大偏移 (框对角线比例)
const STATIC_SHIFT_K: f32 = 0.1;
const STATIC_MIN_SHIFT: f32 = 2.0;

/// 多目标跟踪器接口
pub trait Tracker: Send {
    /// 用当前帧的检测更新所有轨迹
    fn update(&mut self, detections: &[Detection], frame: &RgbImage, timestamp_ms: i64);

    /// 当前轨迹 (只读视图, 下次 update 前有效)
    fn tracks(&self) -> &[Track];

    /// 清除所有轨迹
    fn reset(&mut self);

    fn settings(&self) -> &TrackerSettings;

    fn track_count(&self) -> usize {
        self.tracks().len()
    }
}

/// 轨迹的内部滤波/静止状态, 与 `tracks` 一一对应
#[derive(Clone, Debug)]
struct TrackMotion {
    filter: KalmanBoxFilter,
    static_anchor: Point2,
    static_since_ms: i64,
}

/// 内置多目标跟踪器
pub struct MultiObjectTracker {
    settings: TrackerSettings,
    tracks: Vec<Track>,
    motions: Vec<TrackMotion>,
    next_id: u64,
}

impl MultiObjectTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings: settings.normalized(),
            tracks: Vec::new(),
            motions: Vec::new(),
            next_id: 1,
        }
    }

    /// 门控半径
    fn gating_radius(&self, bbox: &BBox) -> f32 {
        if self.settings.min_area_radius_pix > 0.0 {
            self.settings.min_area_radius_pix
        } else {
            (self.settings.min_area_radius_k * bbox.diagonal()).max(1.0)
        }
    }

    /// 轨迹预测框与检测之间的距离
    fn distance(&self, predicted: &BBox, detection: &Detection) -> f32 {
        match self.settings.distance_metric {
            DistanceMetric::Centers => {
                predicted.center().distance(&detection.bbox.center()) / self.gating_radius(predicted)
            }
            // 无轮廓信息时 Jaccard 退化为框的 IoU
            DistanceMetric::Rects | DistanceMetric::Jaccard => 1.0 - predicted.iou(&detection.bbox),
        }
    }

    fn new_filter(&self, bbox: &BBox) -> KalmanBoxFilter {
        KalmanBoxFilter::new(
            bbox,
            self.settings.filter_goal,
            self.settings.dt,
            self.settings.accel_noise_mag,
            self.settings.use_acceleration,
        )
    }

    fn spawn(&mut self, detection: &Detection, timestamp_ms: i64) {
        let mut track = Track::new(
            self.next_id,
            detection.bbox,
            detection.object_type,
            detection.confidence,
        );
        track.rrect = detection.rrect;
        track.push_trace(
            TracePoint {
                pos: detection.bbox.center(),
                raw: true,
                timestamp_ms,
            },
            self.settings.max_trace_length,
        );
        self.next_id += 1;

        self.motions.push(TrackMotion {
            filter: self.new_filter(&detection.bbox),
            static_anchor: detection.bbox.center(),
            static_since_ms: timestamp_ms,
        });
        self.tracks.push(track);
    }

    /// 速度 (像素/秒), 由最近几个轨迹点估计
    fn estimate_velocity(track: &Track) -> Point2 {
        let n = track.trace.len();
        if n < 2 {
            return Point2::default();
        }
        let first = track.trace[n.saturating_sub(VELOCITY_WINDOW)];
        let last = track.trace[n - 1];
        let dt = (last.timestamp_ms - first.timestamp_ms) as f32 / 1000.0;
        if dt <= 0.0 {
            return Point2::default();
        }
        Point2::new((last.pos.x - first.pos.x) / dt, (last.pos.y - first.pos.y) / dt)
    }

    fn update_static(settings: &TrackerSettings, track: &mut Track, motion: &mut TrackMotion, timestamp_ms: i64) {
        if !settings.use_abandoned_detection {
            track.is_static = false;
            return;
        }
        let center = track.bbox.center();
        let max_shift = (STATIC_SHIFT_K * track.bbox.diagonal()).max(STATIC_MIN_SHIFT);
        if center.distance(&motion.static_anchor) > max_shift {
            motion.static_anchor = center;
            motion.static_since_ms = timestamp_ms;
        }
        let still_ms = timestamp_ms - motion.static_since_ms;
        track.is_static = still_ms >= settings.min_static_time as i64 * 1000
            && still_ms <= settings.max_static_time as i64 * 1000;
    }
}

/// 以滤波后的中心/尺寸刷新旋转矩形
fn refresh_rrect(rrect: &RotatedRect, bbox: &BBox, goal: FilterGoal) -> RotatedRect {
    let size = match goal {
        FilterGoal::Rect => Size2f::new(bbox.width(), bbox.height()),
        FilterGoal::Center => rrect.size,
    };
    RotatedRect::new(bbox.center(), size, rrect.angle)
}

impl Tracker for MultiObjectTracker {
    fn update(&mut self, detections: &[Detection], _frame: &RgbImage, timestamp_ms: i64) {
        for motion in &mut self.motions {
            motion.filter.predict();
        }

        let costs: Vec<Vec<Option<f32>>> = self
            .tracks
            .iter()
            .zip(&self.motions)
            .map(|(track, motion)| {
                let predicted = motion.filter.state_bbox();
                detections
                    .iter()
                    .map(|det| {
                        self.settings
                            .types_compatible(track.object_type, det.object_type)
                            .then(|| self.distance(&predicted, det))
                    })
                    .collect()
            })
            .collect();

        let result = assign(
            &costs,
            detections.len(),
            self.settings.dist_thres,
            self.settings.match_type,
        );

        let max_trace = self.settings.max_trace_length;
        let goal = self.settings.filter_goal;

        for &(t, d) in &result.matches {
            let det = &detections[d];
            let (track, motion) = (&mut self.tracks[t], &mut self.motions[t]);
            motion.filter.update(&det.bbox);
            track.bbox = motion.filter.state_bbox();
            track.rrect = refresh_rrect(&det.rrect, &track.bbox, goal);
            track.confidence = det.confidence;
            track.skipped_frames = 0;
            track.push_trace(
                TracePoint {
                    pos: track.bbox.center(),
                    raw: true,
                    timestamp_ms,
                },
                max_trace,
            );
        }

        for &t in &result.unmatched_tracks {
            let (track, motion) = (&mut self.tracks[t], &mut self.motions[t]);
            track.skipped_frames += 1;
            track.bbox = motion.filter.state_bbox();
            track.rrect = refresh_rrect(&track.rrect, &track.bbox, FilterGoal::Rect);
            track.push_trace(
                TracePoint {
                    pos: track.bbox.center(),
                    raw: false,
                    timestamp_ms,
                },
                max_trace,
            );
        }

        // 删除超过最大跳帧数的轨迹
        let max_skipped = self.settings.max_skipped_frames;
        let keep: Vec<bool> = self
            .tracks
            .iter()
            .map(|t| t.skipped_frames <= max_skipped)
            .collect();
        let mut flags = keep.iter();
        self.tracks.retain(|_| flags.next().copied().unwrap_or(false));
        let mut flags = keep.iter();
        self.motions.retain(|_| flags.next().copied().unwrap_or(false));

        for &d in &result.unmatched_detections {
            self.spawn(&detections[d], timestamp_ms);
        }

        let settings = &self.settings;
        for (track, motion) in self.tracks.iter_mut().zip(self.motions.iter_mut()) {
            track.velocity = Self::estimate_velocity(track);
            Self::update_static(settings, track, motion, timestamp_ms);
        }
    }

    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn reset(&mut self) {
        self.tracks.clear();
        self.motions.clear();
    }

    fn settings(&self) -> &TrackerSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ObjectType;
    use crate::tracking::settings::MatchType;

    fn det(x: f32, y: f32, w: f32, h: f32, object_type: ObjectType) -> Detection {
        Detection::new(BBox::from_xywh(x, y, w, h), object_type, 0.9)
    }

    fn frame() -> RgbImage {
        RgbImage::new(320, 240)
    }

    fn settings() -> TrackerSettings {
        TrackerSettings {
            distance_metric: DistanceMetric::Centers,
            min_area_radius_pix: 30.0,
            dist_thres: 0.8,
            max_skipped_frames: 3,
            max_trace_length: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_track_keeps_id_while_moving() {
        let mut tracker = MultiObjectTracker::new(settings());
        let frame = frame();
        for i in 0..8 {
            let x = 10.0 + i as f32 * 5.0;
            tracker.update(&[det(x, 50.0, 20.0, 20.0, ObjectType::PERSON)], &frame, i * 40);
        }
        assert_eq!(tracker.track_count(), 1);
        let track = &tracker.tracks()[0];
        assert_eq!(track.id, 1);
        assert_eq!(track.trace.len(), 8);
        assert_eq!(track.raw_ratio(), 1.0);
        assert!(track.velocity.x > 50.0, "velocity = {:?}", track.velocity);
    }

    #[test]
    fn test_unmatched_track_is_predicted_then_removed() {
        let mut tracker = MultiObjectTracker::new(settings());
        let frame = frame();
        tracker.update(&[det(100.0, 100.0, 20.0, 20.0, ObjectType::CAR)], &frame, 0);

        for i in 1..=3 {
            tracker.update(&[], &frame, i * 40);
            assert_eq!(tracker.track_count(), 1);
            let track = &tracker.tracks()[0];
            assert_eq!(track.skipped_frames, i as usize);
            assert!(!track.trace.back().map(|p| p.raw).unwrap_or(true));
        }

        tracker.update(&[], &frame, 160);
        assert_eq!(tracker.track_count(), 0);
    }

    #[test]
    fn test_new_ids_are_monotonic() {
        let mut tracker = MultiObjectTracker::new(settings());
        let frame = frame();
        tracker.update(&[det(10.0, 10.0, 20.0, 20.0, ObjectType::PERSON)], &frame, 0);
        tracker.update(
            &[
                det(10.0, 10.0, 20.0, 20.0, ObjectType::PERSON),
                det(200.0, 150.0, 20.0, 20.0, ObjectType::PERSON),
            ],
            &frame,
            40,
        );
        let ids: Vec<u64> = tracker.tracks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);

        tracker.reset();
        tracker.update(&[det(10.0, 10.0, 20.0, 20.0, ObjectType::PERSON)], &frame, 80);
        assert_eq!(tracker.tracks()[0].id, 3);
    }

    #[test]
    fn test_type_gating_with_near_types() {
        let frame = frame();
        let mut strict = MultiObjectTracker::new(settings());
        strict.update(&[det(50.0, 50.0, 20.0, 20.0, ObjectType::CAR)], &frame, 0);
        strict.update(&[det(50.0, 50.0, 20.0, 20.0, ObjectType::BUS)], &frame, 40);
        assert_eq!(strict.track_count(), 2);

        let mut near = settings();
        near.add_near_types(ObjectType::CAR, ObjectType::BUS, false);
        let mut tracker = MultiObjectTracker::new(near);
        tracker.update(&[det(50.0, 50.0, 20.0, 20.0, ObjectType::CAR)], &frame, 0);
        tracker.update(&[det(50.0, 50.0, 20.0, 20.0, ObjectType::BUS)], &frame, 40);
        assert_eq!(tracker.track_count(), 1);
        assert_eq!(tracker.tracks()[0].object_type, ObjectType::CAR);
    }

    #[test]
    fn test_rects_metric_uses_overlap() {
        let mut s = settings();
        s.distance_metric = DistanceMetric::Rects;
        s.dist_thres = 0.5;
        s.match_type = MatchType::Bipartite;
        let mut tracker = MultiObjectTracker::new(s);
        let frame = frame();
        tracker.update(&[det(0.0, 0.0, 40.0, 40.0, ObjectType::UNKNOWN)], &frame, 0);
        tracker.update(&[det(4.0, 0.0, 40.0, 40.0, ObjectType::UNKNOWN)], &frame, 40);
        assert_eq!(tracker.track_count(), 1);
        tracker.update(&[det(200.0, 100.0, 40.0, 40.0, ObjectType::UNKNOWN)], &frame, 80);
        assert_eq!(tracker.track_count(), 2);
    }

    #[test]
    fn test_static_flag_window() {
        let mut s = settings();
        s.use_abandoned_detection = true;
        s.min_static_time = 1;
        s.max_static_time = 2;
        s.max_trace_length = 100;
        let mut tracker = MultiObjectTracker::new(s);
        let frame = frame();
        let still = det(100.0, 100.0, 20.0, 20.0, ObjectType::UNKNOWN);

        let mut flags = Vec::new();
        for i in 0..=75 {
            tracker.update(std::slice::from_ref(&still), &frame, i * 40);
            flags.push(tracker.tracks()[0].is_static());
        }
        // 0..1000ms 非静止, 1000..=2000ms 静止, 之后超过最大静止时间
        assert!(!flags[24]);
        assert!(flags[25]);
        assert!(flags[50]);
        assert!(!flags[51]);
    }

    #[test]
    fn test_trace_truncated_to_max_length() {
        let mut tracker = MultiObjectTracker::new(settings());
        let frame = frame();
        for i in 0..25 {
            tracker.update(&[det(50.0, 50.0, 20.0, 20.0, ObjectType::PERSON)], &frame, i * 40);
        }
        assert_eq!(tracker.tracks()[0].trace.len(), 10);
    }
}
