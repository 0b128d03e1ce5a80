// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测系统数据结构定义
//! Data structures shared by detectors, trackers and the overlay renderer

use serde::{Deserialize, Serialize};

// ========== 几何类型 ==========

/// 二维点 (浮点)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 整数尺寸 (像素)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// 浮点尺寸
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size2f {
    pub width: f32,
    pub height: f32,
}

impl Size2f {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// 整数矩形 (左上角 + 宽高), 用于标签摆放与像素填充
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// 与另一个矩形的交集 (无交集时返回空矩形)
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return Rect::default();
        }
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// 检测框 (Detection bounding box, 左上/右下角点)
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn from_center(center: Point2, width: f32, height: f32) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            center.x + width / 2.0,
            center.y + height / 2.0,
        )
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> Point2 {
        Point2::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn diagonal(&self) -> f32 {
        (self.width().powi(2) + self.height().powi(2)).sqrt()
    }

    /// 交并比 (Intersection over Union)
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// 旋转矩形 (中心 + 尺寸 + 角度, 角度单位为度)
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: Point2,
    pub size: Size2f,
    pub angle: f32,
}

impl RotatedRect {
    pub fn new(center: Point2, size: Size2f, angle: f32) -> Self {
        Self {
            center,
            size,
            angle,
        }
    }

    pub fn from_bbox(bbox: &BBox) -> Self {
        Self::new(
            bbox.center(),
            Size2f::new(bbox.width(), bbox.height()),
            0.0,
        )
    }

    /// 四个角点 (顺时针, 从左上开始)
    pub fn points(&self) -> [Point2; 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let hw = self.size.width / 2.0;
        let hh = self.size.height / 2.0;
        let corner = |dx: f32, dy: f32| {
            Point2::new(
                self.center.x + dx * cos - dy * sin,
                self.center.y + dx * sin + dy * cos,
            )
        };
        [
            corner(-hw, -hh),
            corner(hw, -hh),
            corner(hw, hh),
            corner(-hw, hh),
        ]
    }

    /// 外接整数矩形: 最小角向下取整, 最大角向上取整
    pub fn bounding_rect(&self) -> Rect {
        let pts = self.points();
        let min_x = pts.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let min_y = pts.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_x = pts.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let max_y = pts.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

        // f32 -> i32 的 as 转换是饱和的 (NaN 为 0)
        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;
        Rect::new(
            x,
            y,
            (max_x.ceil() as i32).saturating_sub(x),
            (max_y.ceil() as i32).saturating_sub(y),
        )
    }

    /// 宽高比 (width / height), 高度为0时返回 None
    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.size.height <= 0.0 {
            return None;
        }
        Some(self.size.width / self.size.height)
    }
}

// ========== 目标类型 ==========

/// COCO 80类名称
pub const COCO_NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorbike",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// 目标类型 (COCO类别索引 + 人脸/未知两个扩展类型)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectType(pub u32);

impl ObjectType {
    pub const PERSON: ObjectType = ObjectType(0);
    pub const BICYCLE: ObjectType = ObjectType(1);
    pub const CAR: ObjectType = ObjectType(2);
    pub const MOTORBIKE: ObjectType = ObjectType(3);
    pub const BUS: ObjectType = ObjectType(5);
    pub const TRUCK: ObjectType = ObjectType(7);
    pub const FACE: ObjectType = ObjectType(COCO_NAMES.len() as u32);
    pub const UNKNOWN: ObjectType = ObjectType(COCO_NAMES.len() as u32 + 1);

    /// 类型名称 (用于标签显示)
    pub fn name(&self) -> &'static str {
        match *self {
            ObjectType::FACE => "face",
            ObjectType(id) => COCO_NAMES.get(id as usize).copied().unwrap_or("unknown"),
        }
    }

    /// 从类别名称解析 (兼容 VOC / COCO 命名差异)
    pub fn from_name(name: &str) -> ObjectType {
        let name = name.trim().to_lowercase();
        let canonical = match name.as_str() {
            "motorcycle" => "motorbike",
            "aeroplane" => "airplane",
            "tvmonitor" => "tv",
            "sofa" => "couch",
            "diningtable" => "dining table",
            "pottedplant" => "potted plant",
            "bike" => "bicycle",
            other => other,
        };
        if canonical == "face" {
            return ObjectType::FACE;
        }
        COCO_NAMES
            .iter()
            .position(|n| *n == canonical)
            .map(|idx| ObjectType(idx as u32))
            .unwrap_or(ObjectType::UNKNOWN)
    }
}

impl Default for ObjectType {
    fn default() -> Self {
        ObjectType::UNKNOWN
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ========== 检测结果 ==========

/// 单个检测 (检测器 → 跟踪器)
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub rrect: RotatedRect,
    pub object_type: ObjectType,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BBox, object_type: ObjectType, confidence: f32) -> Self {
        Self {
            rrect: RotatedRect::from_bbox(&bbox),
            bbox,
            object_type,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_iou() {
        let a = BBox::from_xywh(0.0, 0.0, 10.0, 10.0);
        let b = BBox::from_xywh(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&BBox::from_xywh(20.0, 20.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn test_bounding_rect_axis_aligned() {
        let rr = RotatedRect::from_bbox(&BBox::from_xywh(10.0, 20.0, 30.0, 40.0));
        assert_eq!(rr.bounding_rect(), Rect::new(10, 20, 30, 40));
    }

    #[test]
    fn test_bounding_rect_extreme_coordinates() {
        let rr = RotatedRect::new(Point2::new(0.0, 0.0), Size2f::new(1.0e12, 1.0e12), 0.0);
        let br = rr.bounding_rect();
        assert_eq!((br.x, br.y), (i32::MIN, i32::MIN));
        assert_eq!((br.width, br.height), (i32::MAX, i32::MAX));
        assert_eq!(br.right(), -1);
    }

    #[test]
    fn test_bounding_rect_rotated_covers_corners() {
        let rr = RotatedRect::new(Point2::new(50.0, 50.0), Size2f::new(20.0, 10.0), 45.0);
        let br = rr.bounding_rect();
        for p in rr.points() {
            assert!(p.x >= br.x as f32 && p.x <= br.right() as f32);
            assert!(p.y >= br.y as f32 && p.y <= br.bottom() as f32);
        }
    }

    #[test]
    fn test_object_type_names() {
        assert_eq!(ObjectType::PERSON.name(), "person");
        assert_eq!(ObjectType::TRUCK.name(), "truck");
        assert_eq!(ObjectType::FACE.name(), "face");
        assert_eq!(ObjectType::UNKNOWN.name(), "unknown");
        assert_eq!(ObjectType::from_name("motorcycle"), ObjectType::MOTORBIKE);
        assert_eq!(ObjectType::from_name("tvmonitor"), ObjectType::from_name("tv"));
        assert_eq!(ObjectType::from_name("background"), ObjectType::UNKNOWN);
    }

    #[test]
    fn test_rect_intersect() {
        let frame = Rect::new(0, 0, 100, 50);
        assert_eq!(Rect::new(-10, 40, 30, 30).intersect(&frame), Rect::new(0, 40, 20, 10));
        assert!(Rect::new(200, 0, 5, 5).intersect(&frame).is_empty());
    }
}
