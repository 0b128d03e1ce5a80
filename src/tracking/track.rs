// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 轨迹 (Track) 与轨迹分类谓词

use std::collections::VecDeque;

use crate::detection::{BBox, ObjectType, Point2, RotatedRect};

/// 轨迹点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TracePoint {
    /// 滤波后的位置
    pub pos: Point2,
    /// true: 由检测更新; false: 跳帧时的预测填充
    pub raw: bool,
    pub timestamp_ms: i64,
}

/// 跟踪对象
#[derive(Clone, Debug)]
pub struct Track {
    /// 唯一跟踪ID
    pub id: u64,
    /// 历史轨迹, 最新的在末尾
    pub trace: VecDeque<TracePoint>,
    pub rrect: RotatedRect,
    pub bbox: BBox,
    pub object_type: ObjectType,
    pub confidence: f32,
    /// 速度 (像素/秒)
    pub velocity: Point2,
    /// 静止/遗留标记 (由跟踪器维护)
    pub is_static: bool,
    /// 连续跳帧数
    pub skipped_frames: usize,
}

impl Track {
    pub fn new(id: u64, bbox: BBox, object_type: ObjectType, confidence: f32) -> Self {
        Self {
            id,
            trace: VecDeque::new(),
            rrect: RotatedRect::from_bbox(&bbox),
            bbox,
            object_type,
            confidence,
            velocity: Point2::default(),
            is_static: false,
            skipped_frames: 0,
        }
    }

    /// 添加轨迹点, 超出长度时丢弃最旧的点
    pub fn push_trace(&mut self, point: TracePoint, max_len: usize) {
        self.trace.push_back(point);
        while self.trace.len() > max_len.max(1) {
            self.trace.pop_front();
        }
    }

    pub fn last_position(&self) -> Option<Point2> {
        self.trace.back().map(|p| p.pos)
    }

    /// 原始检测点占比
    pub fn raw_ratio(&self) -> f32 {
        if self.trace.is_empty() {
            return 0.0;
        }
        let raw = self.trace.iter().filter(|p| p.raw).count();
        raw as f32 / self.trace.len() as f32
    }

    /// 速度大小 (像素/秒)
    pub fn speed(&self) -> f32 {
        (self.velocity.x.powi(2) + self.velocity.y.powi(2)).sqrt()
    }

    /// 可靠轨迹判定
    ///
    /// 轨迹长度 >= `min_trace_size`, 原始点占比 >= `min_raw_ratio`,
    /// 宽高比位于 `[aspect.0, aspect.1]`。空轨迹永远不可靠。
    pub fn is_robust(&self, min_trace_size: usize, min_raw_ratio: f32, aspect: (f32, f32)) -> bool {
        if self.trace.is_empty() || self.trace.len() < min_trace_size {
            return false;
        }
        if self.raw_ratio() < min_raw_ratio {
            return false;
        }
        match self.rrect.aspect_ratio() {
            Some(ratio) => ratio >= aspect.0 && ratio <= aspect.1,
            None => false,
        }
    }

    /// 静止/遗留目标
    pub fn is_static(&self) -> bool {
        self.is_static
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const ASPECT: (f32, f32) = (0.1, 8.0);

    /// 长度 len, 前 raw 个点为原始检测
    fn make_track(len: usize, raw: usize, width: f32, height: f32) -> Track {
        let mut track = Track::new(
            1,
            BBox::from_xywh(0.0, 0.0, width, height),
            ObjectType::PERSON,
            0.9,
        );
        for i in 0..len {
            track.push_trace(
                TracePoint {
                    pos: Point2::new(i as f32, 0.0),
                    raw: i < raw,
                    timestamp_ms: i as i64 * 40,
                },
                usize::MAX,
            );
        }
        track
    }

    #[test]
    fn test_robust_reference_scenarios() {
        let track = make_track(10, 8, 20.0, 20.0);
        assert!(track.is_robust(8, 0.7, ASPECT));
        assert!(!track.is_robust(8, 0.9, ASPECT));
        assert!(!track.is_robust(11, 0.7, ASPECT));
    }

    #[test]
    fn test_robust_aspect_bounds() {
        assert!(!make_track(10, 10, 100.0, 10.0).is_robust(1, 0.0, ASPECT));
        assert!(!make_track(10, 10, 1.0, 20.0).is_robust(1, 0.0, ASPECT));
        assert!(make_track(10, 10, 80.0, 10.0).is_robust(1, 0.0, ASPECT));
        assert!(!make_track(10, 10, 5.0, 0.0).is_robust(1, 0.0, ASPECT));
    }

    #[test]
    fn test_empty_trace_is_never_robust() {
        let track = make_track(0, 0, 10.0, 10.0);
        assert!(!track.is_robust(0, 0.0, ASPECT));
        assert_eq!(track.raw_ratio(), 0.0);
    }

    #[test]
    fn test_robust_is_monotonic() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..2_000 {
            let len = rng.gen_range(0..30);
            let raw = rng.gen_range(0..=len);
            let track = make_track(len, raw, rng.gen_range(1.0..50.0), rng.gen_range(1.0..50.0));

            let size = rng.gen_range(0..30);
            let ratio: f32 = rng.gen_range(0.0..1.0);
            let stricter_size = size + rng.gen_range(0..10);
            let stricter_ratio = ratio + rng.gen_range(0.0..0.5);

            if !track.is_robust(size, ratio, ASPECT) {
                assert!(!track.is_robust(stricter_size, ratio, ASPECT));
                assert!(!track.is_robust(size, stricter_ratio, ASPECT));
                assert!(!track.is_robust(stricter_size, stricter_ratio, ASPECT));
            }
        }
    }

    #[test]
    fn test_trace_is_truncated() {
        let mut track = make_track(0, 0, 10.0, 10.0);
        for i in 0..20 {
            track.push_trace(
                TracePoint {
                    pos: Point2::new(i as f32, 1.0),
                    raw: true,
                    timestamp_ms: 0,
                },
                5,
            );
        }
        assert_eq!(track.trace.len(), 5);
        assert_eq!(track.last_position(), Some(Point2::new(19.0, 1.0)));
        assert_eq!(track.trace.front().map(|p| p.pos.x), Some(15.0));
    }
}
