// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运动检测器 (Motion segmentation backend)
//!
//! 灰度滑动平均背景模型 → 前景掩码 → 形态学开运算 → 连通域 → 检测框。
//! 所有运动算法标签共用该实现, 学习率与阈值取自各算法自己的配置键。

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::open;
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

use super::config_table::ConfigTable;
use super::detector::{Detector, DetectorError, DetectorRegistry};
use super::types::{BBox, Detection, ObjectType, Point2, RotatedRect, Size, Size2f};
use super::variant::{DetectorVariant, MotionAlgorithm};
use crate::renderer::overlay::blend_pixel;

const DEFAULT_HISTORY: f32 = 100.0;
const DEFAULT_THRESHOLD: f32 = 20.0;
const DEFAULT_VIBE_SAMPLES: f32 = 20.0;
/// 默认噪声方差 (varThreshold 以此为单位)
const NOISE_VARIANCE: f32 = 16.0;
const MOTION_MAP_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MOTION_MAP_ALPHA: u8 = 100;

/// 运动检测参数
#[derive(Debug, Clone, PartialEq)]
pub struct MotionParams {
    /// 背景学习率 (每帧)
    pub learning_rate: f32,
    /// 前景判定阈值 (灰度差)
    pub threshold: f32,
    /// 开运算半径 (LInf)
    pub open_radius: u8,
    pub use_rotated_rect: bool,
}

impl MotionParams {
    /// 从配置表解析, 历史长度键因算法而异
    pub fn from_table(algo: MotionAlgorithm, config: &ConfigTable) -> Result<Self, DetectorError> {
        let history_key = match algo {
            MotionAlgorithm::Vibe => "updateFactor",
            MotionAlgorithm::Mog | MotionAlgorithm::Mog2 => "history",
            MotionAlgorithm::Gmg => "initializationFrames",
            MotionAlgorithm::Cnt => "maxPixelStability",
            MotionAlgorithm::SuBSENSE | MotionAlgorithm::Lobster => "history",
        };
        let mut history = config.parse_or(history_key, DEFAULT_HISTORY)?.max(1.0);
        if algo == MotionAlgorithm::Vibe {
            // 每个样本以 1/updateFactor 的概率被替换
            history *= config.parse_or("samples", DEFAULT_VIBE_SAMPLES)?.max(1.0);
        }

        let threshold = match (
            config.parse::<f32>("distanceThreshold")?,
            config.parse::<f32>("varThreshold")?,
        ) {
            (Some(t), _) => t,
            (None, Some(var)) => (var.max(0.0) * NOISE_VARIANCE).sqrt(),
            (None, None) => DEFAULT_THRESHOLD,
        };

        Ok(Self {
            learning_rate: 1.0 / history,
            threshold,
            open_radius: config.parse_or("openRadius", 1u8)?,
            use_rotated_rect: config.parse_or("useRotatedRect", 0i32)? != 0,
        })
    }
}

/// 滑动平均背景模型运动检测器
pub struct MotionDetector {
    algo: MotionAlgorithm,
    params: MotionParams,
    background: Vec<f32>,
    width: u32,
    height: u32,
    mask: GrayImage,
    min_object_size: Size,
}

impl MotionDetector {
    pub fn new(algo: MotionAlgorithm, params: MotionParams, reference_frame: &RgbImage) -> Self {
        let mut detector = Self {
            algo,
            params,
            background: Vec::new(),
            width: 0,
            height: 0,
            mask: GrayImage::new(0, 0),
            min_object_size: Size::default(),
        };
        detector.reset_background(&image::imageops::grayscale(reference_frame));
        detector
    }

    pub fn params(&self) -> &MotionParams {
        &self.params
    }

    /// 最近一帧的前景掩码
    pub fn foreground_mask(&self) -> &GrayImage {
        &self.mask
    }

    fn reset_background(&mut self, gray: &GrayImage) {
        self.width = gray.width();
        self.height = gray.height();
        self.background = gray.pixels().map(|p| p.0[0] as f32).collect();
        self.mask = GrayImage::new(self.width, self.height);
    }

    /// 前景掩码 + 背景更新
    fn segment(&mut self, gray: &GrayImage) -> GrayImage {
        let rate = self.params.learning_rate;
        let threshold = self.params.threshold;
        let mut mask = GrayImage::new(self.width, self.height);

        for ((bg, px), out) in self
            .background
            .iter_mut()
            .zip(gray.pixels())
            .zip(mask.pixels_mut())
        {
            let value = px.0[0] as f32;
            if (value - *bg).abs() > threshold {
                out.0[0] = 255;
            }
            *bg += rate * (value - *bg);
        }

        if self.params.open_radius > 0 {
            open(&mask, Norm::LInf, self.params.open_radius)
        } else {
            mask
        }
    }

    /// 连通域 → 检测
    fn extract_blobs(&self, mask: &GrayImage) -> Vec<Detection> {
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
        let mut blobs: Vec<Blob> = Vec::new();

        for (x, y, label) in labels.enumerate_pixels() {
            let id = label.0[0] as usize;
            if id == 0 {
                continue;
            }
            if blobs.len() < id {
                blobs.resize_with(id, Blob::default);
            }
            blobs[id - 1].add(x as f32, y as f32, self.params.use_rotated_rect);
        }

        blobs
            .iter()
            .filter(|b| b.count > 0)
            .filter_map(|b| {
                let bbox = b.bbox();
                if (bbox.width() as i32) < self.min_object_size.width
                    || (bbox.height() as i32) < self.min_object_size.height
                {
                    return None;
                }
                let confidence = (b.count as f32 / bbox.area().max(1.0)).min(1.0);
                let mut detection = Detection::new(bbox, ObjectType::UNKNOWN, confidence);
                if self.params.use_rotated_rect {
                    detection.rrect = b.rotated_rect();
                }
                Some(detection)
            })
            .collect()
    }
}

/// 连通域统计
#[derive(Debug, Default)]
struct Blob {
    count: usize,
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
    points: Vec<(f32, f32)>,
}

impl Blob {
    fn add(&mut self, x: f32, y: f32, keep_points: bool) {
        if self.count == 0 {
            self.min_x = x;
            self.min_y = y;
            self.max_x = x;
            self.max_y = y;
        } else {
            self.min_x = self.min_x.min(x);
            self.min_y = self.min_y.min(y);
            self.max_x = self.max_x.max(x);
            self.max_y = self.max_y.max(y);
        }
        self.count += 1;
        if keep_points {
            self.points.push((x, y));
        }
    }

    /// 像素包围盒 (右下角包含该像素)
    fn bbox(&self) -> BBox {
        BBox::new(self.min_x, self.min_y, self.max_x + 1.0, self.max_y + 1.0)
    }

    /// 二阶矩主方向上的最小外接旋转矩形
    fn rotated_rect(&self) -> RotatedRect {
        if self.points.len() < 2 {
            return RotatedRect::from_bbox(&self.bbox());
        }
        let n = self.points.len() as f32;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0f32, 0.0f32), |(ax, ay), (x, y)| (ax + x, ay + y));
        let (mx, my) = (sx / n, sy / n);

        let (mut cxx, mut cyy, mut cxy) = (0.0f32, 0.0f32, 0.0f32);
        for (x, y) in &self.points {
            let (dx, dy) = (x - mx, y - my);
            cxx += dx * dx;
            cyy += dy * dy;
            cxy += dx * dy;
        }
        let theta = 0.5 * (2.0 * cxy).atan2(cxx - cyy);
        let (sin, cos) = theta.sin_cos();

        let (mut u_min, mut u_max, mut v_min, mut v_max) =
            (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY);
        for (x, y) in &self.points {
            let (dx, dy) = (x - mx, y - my);
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            u_min = u_min.min(u);
            u_max = u_max.max(u);
            v_min = v_min.min(v);
            v_max = v_max.max(v);
        }

        let (cu, cv) = ((u_min + u_max) / 2.0, (v_min + v_max) / 2.0);
        let center = Point2::new(mx + cu * cos - cv * sin, my + cu * sin + cv * cos);
        RotatedRect::new(
            center,
            Size2f::new(u_max - u_min + 1.0, v_max - v_min + 1.0),
            theta.to_degrees(),
        )
    }
}

impl Detector for MotionDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        let gray = image::imageops::grayscale(frame);
        if gray.dimensions() != (self.width, self.height) {
            debug!(
                "frame size changed {}x{} -> {}x{}, reset background",
                self.width,
                self.height,
                gray.width(),
                gray.height()
            );
            self.reset_background(&gray);
            return Ok(Vec::new());
        }

        let mask = self.segment(&gray);
        let detections = self.extract_blobs(&mask);
        self.mask = mask;
        Ok(detections)
    }

    fn set_min_object_size(&mut self, size: Size) {
        self.min_object_size = size;
    }

    fn min_object_size(&self) -> Size {
        self.min_object_size
    }

    fn draw_motion_map(&self, frame: &mut RgbImage) {
        if frame.dimensions() != self.mask.dimensions() {
            return;
        }
        for (pixel, m) in frame.pixels_mut().zip(self.mask.pixels()) {
            if m.0[0] != 0 {
                blend_pixel(pixel, MOTION_MAP_COLOR, MOTION_MAP_ALPHA);
            }
        }
    }

    fn variant(&self) -> DetectorVariant {
        DetectorVariant::Motion(self.algo)
    }
}

/// 注册所有运动算法
pub fn register(registry: &mut DetectorRegistry) {
    for algo in MotionAlgorithm::ALL {
        registry.register(DetectorVariant::Motion(algo), &[], move |config, frame| {
            let params = MotionParams::from_table(algo, config)?;
            Ok(Box::new(MotionDetector::new(algo, params, frame)) as Box<dyn Detector>)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving_square(offset: u32) -> RgbImage {
        let mut frame = RgbImage::from_pixel(80, 60, Rgb([20, 20, 20]));
        for y in 20..32 {
            for x in offset..offset + 12 {
                frame.put_pixel(x, y, Rgb([230, 230, 230]));
            }
        }
        frame
    }

    fn vibe_table() -> ConfigTable {
        ConfigTable::new()
            .with("useRotatedRect", "0")
            .with("distanceThreshold", "20")
            .with("updateFactor", "16")
    }

    #[test]
    fn test_params_per_algorithm() {
        let vibe = MotionParams::from_table(MotionAlgorithm::Vibe, &vibe_table()).unwrap();
        assert_eq!(vibe.learning_rate, 1.0 / 320.0);
        assert_eq!(vibe.threshold, 20.0);
        assert!(!vibe.use_rotated_rect);

        let mog2 = ConfigTable::new().with("history", "2500").with("varThreshold", "25");
        let mog2 = MotionParams::from_table(MotionAlgorithm::Mog2, &mog2).unwrap();
        assert_eq!(mog2.learning_rate, 1.0 / 2500.0);
        assert_eq!(mog2.threshold, 20.0);

        let bad = ConfigTable::new().with("history", "many");
        assert!(MotionParams::from_table(MotionAlgorithm::Mog, &bad).is_err());
    }

    #[test]
    fn test_detects_moving_blob() {
        let background = RgbImage::from_pixel(80, 60, Rgb([20, 20, 20]));
        let params = MotionParams::from_table(MotionAlgorithm::Vibe, &vibe_table()).unwrap();
        let mut detector = MotionDetector::new(MotionAlgorithm::Vibe, params, &background);
        detector.set_min_object_size(Size::new(4, 4));

        assert!(detector.detect(&background).unwrap().is_empty());

        let detections = detector.detect(&moving_square(30)).unwrap();
        assert_eq!(detections.len(), 1);
        let bbox = detections[0].bbox;
        assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (30.0, 20.0, 42.0, 32.0));
        assert_eq!(detections[0].object_type, ObjectType::UNKNOWN);
    }

    #[test]
    fn test_min_object_size_filters_blobs() {
        let background = RgbImage::from_pixel(80, 60, Rgb([20, 20, 20]));
        let params = MotionParams::from_table(MotionAlgorithm::Vibe, &vibe_table()).unwrap();
        let mut detector = MotionDetector::new(MotionAlgorithm::Vibe, params, &background);
        detector.set_min_object_size(Size::new(20, 20));
        assert!(detector.detect(&moving_square(30)).unwrap().is_empty());
    }

    #[test]
    fn test_motion_map_marks_foreground() {
        let background = RgbImage::from_pixel(80, 60, Rgb([20, 20, 20]));
        let params = MotionParams::from_table(MotionAlgorithm::Vibe, &vibe_table()).unwrap();
        let mut detector = MotionDetector::new(MotionAlgorithm::Vibe, params, &background);
        let mut frame = moving_square(30);
        detector.detect(&frame).unwrap();
        detector.draw_motion_map(&mut frame);

        assert_ne!(*frame.get_pixel(35, 25), Rgb([230, 230, 230]));
        assert_eq!(*frame.get_pixel(5, 5), Rgb([20, 20, 20]));
    }

    #[test]
    fn test_rotated_rect_for_axis_aligned_blob() {
        let background = RgbImage::from_pixel(80, 60, Rgb([20, 20, 20]));
        let mut config = vibe_table();
        config.set("useRotatedRect", "1");
        let params = MotionParams::from_table(MotionAlgorithm::Vibe, &config).unwrap();
        let mut detector = MotionDetector::new(MotionAlgorithm::Vibe, params, &background);

        let detections = detector.detect(&moving_square(30)).unwrap();
        assert_eq!(detections.len(), 1);
        let rr = detections[0].rrect;
        assert!((rr.center.x - 35.5).abs() < 0.5 && (rr.center.y - 25.5).abs() < 0.5);
        let area = rr.size.width * rr.size.height;
        assert!((area - 144.0).abs() < 1.0);
    }
}
