// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 叠加层基础操作: Alpha混合填充 + 标签矩形边界约束
//!
//! alpha 是填充颜色的权重: `r = round(((255 - a) * p + a * c) / 255)`.
//! `a == 0` 时直接实心填充, 不做逐像素混合。

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;

use crate::detection::{Rect, Size};

/// 单通道混合 (四舍五入, 结果位于 p 与 c 之间)
#[inline]
pub fn blend_channel(p: u8, c: u8, a: u8) -> u8 {
    let a = a as u32;
    let value = ((255 - a) * p as u32 + a * c as u32 + 127) / 255;
    value.min(255) as u8
}

#[inline]
pub fn blend_pixel(pixel: &mut Rgb<u8>, color: Rgb<u8>, a: u8) {
    for i in 0..3 {
        pixel.0[i] = blend_channel(pixel.0[i], color.0[i], a);
    }
}

/// 填充矩形 (超出画面部分被裁剪)
pub fn draw_filled_rect(frame: &mut RgbImage, rect: &Rect, color: Rgb<u8>, alpha: u8) {
    let bounds = Rect::new(0, 0, frame.width() as i32, frame.height() as i32);
    let clip = rect.intersect(&bounds);
    if clip.is_empty() {
        return;
    }

    if alpha == 0 {
        draw_filled_rect_mut(
            frame,
            imageproc::rect::Rect::at(clip.x, clip.y).of_size(clip.width as u32, clip.height as u32),
            color,
        );
        return;
    }

    for y in clip.y..clip.bottom() {
        for x in clip.x..clip.right() {
            blend_pixel(frame.get_pixel_mut(x as u32, y as u32), color, alpha);
        }
    }
}

/// 标签摆放用的矩形约束
///
/// 标签画在框的上方 (`y - label.height`). 先按水平/垂直规则平移并限制宽高,
/// 再做一次饱和处理: 框或标签比画面更大时输出可能退化为零面积。
pub fn clamp_label_rect(brect: Rect, label: Size, frame: Size) -> Rect {
    let (fw, fh) = (frame.width, frame.height);
    let mut r = brect;

    if r.x < 0 {
        r.width = r.width.min(fw - 1);
        r.x = 0;
    } else if r.x.saturating_add(r.width) >= fw {
        r.x = fw.saturating_sub(r.width).saturating_sub(1).max(0);
        r.width = r.width.min(fw - 1);
    }

    if r.y.saturating_sub(label.height) < 0 {
        r.height = r.height.min(fh - 1);
        r.y = label.height;
    } else if r.y.saturating_add(r.height) >= fh {
        r.y = fh.saturating_sub(r.height).saturating_sub(1).max(0);
        r.height = r.height.min(fh - 1);
    }

    // 饱和
    let max_x = (fw - 1).max(0);
    let max_y = (fh - 1).max(0);
    r.x = r.x.clamp(0, max_x);
    r.y = r.y.clamp(label.height.clamp(0, max_y), max_y);
    r.width = r.width.min(fw - 1 - r.x).max(0);
    r.height = r.height.min(fh - 1 - r.y).max(0);
    r
}

/// 标签背景矩形: 位于约束后框的上方, 高度包含基线
pub fn label_background(clamped: &Rect, label: Size, baseline: i32) -> Rect {
    Rect::new(
        clamped.x,
        clamped.y - label.height,
        label.width,
        label.height + baseline,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_blend_endpoints() {
        for p in [0u8, 1, 77, 128, 254, 255] {
            for c in [0u8, 13, 200, 255] {
                assert_eq!(blend_channel(p, c, 0), p);
                assert_eq!(blend_channel(p, c, 255), c);
            }
        }
    }

    #[test]
    fn test_blend_is_bounded_interpolation() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20_000 {
            let p: u8 = rng.gen();
            let c: u8 = rng.gen();
            let a: u8 = rng.gen();
            let r = blend_channel(p, c, a);
            assert!(r >= p.min(c) && r <= p.max(c), "p={p} c={c} a={a} r={r}");

            let exact = ((255.0 - a as f64) * p as f64 + a as f64 * c as f64) / 255.0;
            assert!((r as f64 - exact).abs() <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn test_zero_alpha_is_solid_fill() {
        let mut frame = RgbImage::from_pixel(10, 10, Rgb([10, 20, 30]));
        draw_filled_rect(&mut frame, &Rect::new(2, 2, 3, 3), Rgb([200, 0, 100]), 0);
        assert_eq!(*frame.get_pixel(3, 3), Rgb([200, 0, 100]));
        assert_eq!(*frame.get_pixel(5, 5), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_partial_alpha_blends_and_clips() {
        let mut frame = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        draw_filled_rect(&mut frame, &Rect::new(-4, 6, 6, 10), Rgb([255, 255, 255]), 150);
        assert_eq!(*frame.get_pixel(0, 7), Rgb([150, 150, 150]));
        assert_eq!(*frame.get_pixel(1, 6), Rgb([150, 150, 150]));
        assert_eq!(*frame.get_pixel(2, 7), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(0, 5), Rgb([0, 0, 0]));

        // 完全在画面外
        draw_filled_rect(&mut frame, &Rect::new(20, 20, 5, 5), Rgb([255, 0, 0]), 0);
        draw_filled_rect(&mut frame, &Rect::new(1, 1, 0, 4), Rgb([255, 0, 0]), 0);
        assert_eq!(*frame.get_pixel(1, 1), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_clamp_in_bounds_is_identity() {
        let frame = Size::new(640, 480);
        let label = Size::new(60, 12);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..5_000 {
            let x = rng.gen_range(0..639);
            let w = rng.gen_range(0..(640 - x));
            let y = rng.gen_range(label.height..479);
            let h = rng.gen_range(0..(480 - y));
            let r = Rect::new(x, y, w, h);
            assert_eq!(clamp_label_rect(r, label, frame), r);
        }
    }

    #[test]
    fn test_clamp_is_always_inside_frame() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..20_000 {
            let fw = rng.gen_range(1..400);
            let fh = rng.gen_range(1..300);
            let label = Size::new(rng.gen_range(0..=fw), rng.gen_range(0..=fh));
            let r = Rect::new(
                rng.gen_range(-500..900),
                rng.gen_range(-500..900),
                rng.gen_range(0..1200),
                rng.gen_range(0..1200),
            );
            let c = clamp_label_rect(r, label, Size::new(fw, fh));
            assert!(c.x >= 0 && c.y >= 0, "{r:?} -> {c:?}");
            assert!(c.width >= 0 && c.height >= 0, "{r:?} -> {c:?}");
            assert!(c.x + c.width < fw, "{r:?} -> {c:?} in {fw}x{fh}");
            assert!(c.y + c.height < fh, "{r:?} -> {c:?} in {fw}x{fh}");
        }
    }

    #[test]
    fn test_clamp_reference_cases() {
        let frame = Size::new(100, 80);
        let label = Size::new(30, 10);

        // 左边越界
        assert_eq!(
            clamp_label_rect(Rect::new(-5, 20, 30, 20), label, frame),
            Rect::new(0, 20, 30, 20)
        );
        // 右边越界: 左移
        assert_eq!(
            clamp_label_rect(Rect::new(90, 20, 30, 20), label, frame),
            Rect::new(69, 20, 30, 20)
        );
        // 标签超出顶部: 下推到 y = 标签高度
        assert_eq!(
            clamp_label_rect(Rect::new(10, 4, 20, 20), label, frame),
            Rect::new(10, 10, 20, 20)
        );
        // 底部越界: 上移
        assert_eq!(
            clamp_label_rect(Rect::new(10, 70, 20, 20), label, frame),
            Rect::new(10, 59, 20, 20)
        );
        // 比画面还宽: 宽度截为 W - 1
        let wide = clamp_label_rect(Rect::new(-10, 20, 500, 20), label, frame);
        assert_eq!((wide.x, wide.width), (0, 99));
        let wide = clamp_label_rect(Rect::new(10, 20, 500, 20), label, frame);
        assert_eq!((wide.x, wide.width), (0, 99));
    }

    #[test]
    fn test_clamp_extreme_coordinates() {
        let frame = Size::new(100, 80);
        let label = Size::new(30, 10);
        assert_eq!(
            clamp_label_rect(
                Rect::new(i32::MAX - 5, i32::MAX - 5, i32::MAX, i32::MAX),
                label,
                frame
            ),
            Rect::new(0, 10, 99, 69)
        );
        assert_eq!(
            clamp_label_rect(Rect::new(i32::MIN, i32::MIN, 10, 10), label, frame),
            Rect::new(0, 10, 10, 10)
        );
    }

    #[test]
    fn test_label_background_geometry() {
        let bg = label_background(&Rect::new(10, 30, 50, 20), Size::new(40, 12), 4);
        assert_eq!(bg, Rect::new(10, 18, 40, 16));
    }
}
