// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 简化卡尔曼滤波器 (单个边界框的位置和尺寸平滑)
//!
//! 状态向量: [cx, cy, w, h, vx, vy, vw, vh], 协方差简化为对角阵。
//! 速度以 "每个时间步 dt" 为单位, 预测: x += v * dt。

use crate::detection::{BBox, Point2};

use super::settings::FilterGoal;

/// 观测噪声
const MEASUREMENT_NOISE: f32 = 4.0;
/// 过程噪声的像素尺度
const PROCESS_SCALE: f32 = 100.0;
/// 静止阈值 (像素/步)
const STATIONARY_THRESHOLD: f32 = 2.0;

#[derive(Clone, Debug)]
pub struct KalmanBoxFilter {
    state: [f32; 8],
    p: [f32; 8],
    dt: f32,
    /// 位置过程噪声
    q_pos: f32,
    /// 速度过程噪声
    q_vel: f32,
    r: f32,
    goal: FilterGoal,
    /// 速度衰减因子 (每步保留比例)
    velocity_decay: f32,
    stationary_count: u32,
}

impl KalmanBoxFilter {
    /// 创建滤波器
    ///
    /// - `dt`: 时间步长
    /// - `accel_noise`: 加速度噪声幅度 (越小越平滑)
    /// - `use_acceleration`: 匀加速模型时速度衰减更弱
    pub fn new(bbox: &BBox, goal: FilterGoal, dt: f32, accel_noise: f32, use_acceleration: bool) -> Self {
        let c = bbox.center();
        let dt = if dt > 0.0 { dt } else { 0.2 };
        let accel = accel_noise.max(1e-3) * PROCESS_SCALE;

        Self {
            state: [c.x, c.y, bbox.width(), bbox.height(), 0.0, 0.0, 0.0, 0.0],
            p: [10.0; 8],
            dt,
            q_pos: 0.25 * accel * dt.powi(2),
            q_vel: accel * dt,
            r: MEASUREMENT_NOISE,
            goal,
            velocity_decay: if use_acceleration { 0.99 } else { 0.95 },
            stationary_count: 0,
        }
    }

    /// 预测下一帧状态
    pub fn predict(&mut self) {
        let speed = (self.state[4].powi(2) + self.state[5].powi(2)).sqrt();
        let stationary = speed < STATIONARY_THRESHOLD;

        let decay = if stationary {
            self.stationary_count += 1;
            // 连续静止3步后大幅衰减
            if self.stationary_count > 3 {
                0.7
            } else {
                self.velocity_decay
            }
        } else {
            self.stationary_count = 0;
            self.velocity_decay
        };
        for v in &mut self.state[4..8] {
            *v *= decay;
        }

        for i in 0..4 {
            self.state[i] += self.state[i + 4] * self.dt;
        }

        let q_factor = if stationary { 0.5 } else { 1.0 };
        for i in 0..4 {
            self.p[i] += self.q_pos * q_factor;
            self.p[i + 4] += self.q_vel * q_factor;
        }
    }

    /// 融合观测值
    pub fn update(&mut self, bbox: &BBox) {
        let c = bbox.center();
        let z = [c.x, c.y, bbox.width(), bbox.height()];
        let y: [f32; 4] = std::array::from_fn(|i| z[i] - self.state[i]);

        // 自适应观测噪声: 小残差更信任观测, 大跳变更信任预测
        let residual = (y[0].powi(2) + y[1].powi(2)).sqrt();
        let r = if residual < STATIONARY_THRESHOLD {
            self.r * 0.3
        } else if residual < 10.0 {
            self.r
        } else {
            self.r * 3.0
        };

        let dims = match self.goal {
            FilterGoal::Center => 2,
            FilterGoal::Rect => 4,
        };

        for i in 0..4 {
            if i >= dims {
                // 只滤波中心点时尺寸直接取观测
                self.state[i] = z[i];
                self.state[i + 4] = 0.0;
                continue;
            }
            let k = self.p[i] / (self.p[i] + r);
            let kv = self.p[i + 4] / (self.p[i + 4] + r * 10.0);
            self.state[i] += k * y[i];
            self.state[i + 4] += kv * y[i] / self.dt;
            self.p[i] *= 1.0 - k;
            self.p[i + 4] *= 1.0 - kv;
        }

        if residual >= STATIONARY_THRESHOLD {
            self.stationary_count = 0;
        }
    }

    /// 当前状态的边界框
    pub fn state_bbox(&self) -> BBox {
        BBox::from_center(
            Point2::new(self.state[0], self.state[1]),
            self.state[2].max(1.0),
            self.state[3].max(1.0),
        )
    }

    /// 下一步的预测框 (不修改状态)
    pub fn predicted_bbox(&self) -> BBox {
        let dt = self.dt;
        BBox::from_center(
            Point2::new(
                self.state[0] + self.state[4] * dt,
                self.state[1] + self.state[5] * dt,
            ),
            (self.state[2] + self.state[6] * dt).max(1.0),
            (self.state[3] + self.state[7] * dt).max(1.0),
        )
    }

    /// 速度 (像素/时间步)
    pub fn velocity(&self) -> Point2 {
        Point2::new(self.state[4], self.state[5])
    }

    /// 位置不确定性
    pub fn position_uncertainty(&self) -> f32 {
        (self.p[0] + self.p[1]).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_follows_constant_motion() {
        let mut kf = KalmanBoxFilter::new(
            &BBox::from_xywh(0.0, 0.0, 10.0, 10.0),
            FilterGoal::Rect,
            0.2,
            0.2,
            false,
        );
        for step in 1..=30 {
            kf.predict();
            kf.update(&BBox::from_xywh(step as f32 * 4.0, 0.0, 10.0, 10.0));
        }
        let center = kf.state_bbox().center();
        assert!((center.x - 125.0).abs() < 6.0, "center = {center:?}");
        assert!(kf.velocity().x > 0.0);

        let predicted = kf.predicted_bbox().center();
        assert!(predicted.x > center.x);
    }

    #[test]
    fn test_center_goal_takes_measured_size() {
        let mut kf = KalmanBoxFilter::new(
            &BBox::from_xywh(0.0, 0.0, 10.0, 10.0),
            FilterGoal::Center,
            0.3,
            0.1,
            false,
        );
        kf.predict();
        kf.update(&BBox::from_xywh(0.0, 0.0, 30.0, 20.0));
        let bbox = kf.state_bbox();
        assert!((bbox.width() - 30.0).abs() < 1e-4);
        assert!((bbox.height() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_stationary_velocity_decays() {
        let bbox = BBox::from_xywh(50.0, 50.0, 10.0, 10.0);
        let mut kf = KalmanBoxFilter::new(&bbox, FilterGoal::Rect, 0.2, 0.2, false);
        for _ in 0..50 {
            kf.predict();
            kf.update(&bbox);
        }
        let v = kf.velocity();
        assert!(v.x.abs() < 0.5 && v.y.abs() < 0.5);
        assert!((kf.state_bbox().center().x - 55.0).abs() < 0.5);
    }
}
