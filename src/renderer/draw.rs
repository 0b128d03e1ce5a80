// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 轨迹/标签绘制 (imageproc + ab_glyph)

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut, text_size};

use super::overlay::{clamp_label_rect, draw_filled_rect, label_background};
use crate::detection::{Rect, Size};
use crate::tracking::Track;

/// 标签文字颜色
pub const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

// 无字体时的近似字符度量
const FALLBACK_CHAR_WIDTH: i32 = 8;
const FALLBACK_TEXT_HEIGHT: i32 = 11;
const FALLBACK_BASELINE: i32 = 5;

/// 标签字体 (未加载字体时只测量/绘制背景)
pub struct LabelFont {
    font: Option<FontVec>,
    scale: PxScale,
}

impl LabelFont {
    /// 加载 TTF/OTF 字体
    pub fn load(path: impl AsRef<Path>, px: f32) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context(|| format!("读取字体失败: {}", path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| anyhow::anyhow!("无效字体 {}: {}", path.display(), e))?;
        Ok(Self {
            font: Some(font),
            scale: PxScale::from(px),
        })
    }

    pub fn fallback() -> Self {
        Self {
            font: None,
            scale: PxScale::from(FALLBACK_TEXT_HEIGHT as f32),
        }
    }

    pub fn has_glyphs(&self) -> bool {
        self.font.is_some()
    }

    /// 文本尺寸与基线高度
    pub fn measure(&self, text: &str) -> (Size, i32) {
        match &self.font {
            Some(font) => {
                let (w, h) = text_size(self.scale, font, text);
                let baseline = (self.scale.y * 0.25).ceil() as i32;
                (Size::new(w as i32, h as i32), baseline)
            }
            None => (
                Size::new(
                    FALLBACK_CHAR_WIDTH * text.chars().count() as i32,
                    FALLBACK_TEXT_HEIGHT,
                ),
                FALLBACK_BASELINE,
            ),
        }
    }

    /// 以左上角为锚点绘制文字
    pub fn draw(&self, frame: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            draw_text_mut(frame, color, x, y, self.scale, font, text);
        }
    }
}

impl Default for LabelFont {
    fn default() -> Self {
        Self::fallback()
    }
}

/// 在框上方绘制半透明背景的标签
pub fn draw_label(
    frame: &mut RgbImage,
    brect: Rect,
    text: &str,
    background: Rgb<u8>,
    alpha: u8,
    font: &LabelFont,
) -> Rect {
    let (label, baseline) = font.measure(text);
    let frame_size = Size::new(frame.width() as i32, frame.height() as i32);
    let clamped = clamp_label_rect(brect, label, frame_size);
    let bg = label_background(&clamped, label, baseline);
    draw_filled_rect(frame, &bg, background, alpha);
    font.draw(frame, text, clamped.x, clamped.y - label.height, TEXT_COLOR);
    bg
}

/// 绘制轨迹: 旋转框 + 可选的历史轨迹线
pub fn draw_track(frame: &mut RgbImage, track: &Track, draw_trajectory: bool, color: Rgb<u8>) {
    let pts = track.rrect.points();
    for i in 0..pts.len() {
        let (a, b) = (pts[i], pts[(i + 1) % pts.len()]);
        draw_line_segment_mut(frame, (a.x, a.y), (b.x, b.y), color);
    }

    if !draw_trajectory {
        return;
    }

    let points: Vec<_> = track.trace.iter().collect();
    for pair in points.windows(2) {
        draw_line_segment_mut(
            frame,
            (pair[0].pos.x, pair[0].pos.y),
            (pair[1].pos.x, pair[1].pos.y),
            color,
        );
    }
    for p in track.trace.iter().filter(|p| p.raw) {
        draw_filled_circle_mut(frame, (p.pos.x.round() as i32, p.pos.y.round() as i32), 2, color);
    }
}

/// 根据ID生成不同颜色 (黄金角度采样)
pub fn id_to_color(id: u64) -> Rgb<u8> {
    let hue = (id as f64 * 137.508) % 360.0;
    hsv_to_rgb(hue as f32, 0.8, 0.9)
}

/// HSV转RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}

/// 两位有效数字 (流式输出 setprecision(2) 的效果)
pub fn format_sig2(value: f32) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = 1 - magnitude;
    if decimals <= 0 {
        let unit = 10f32.powi(-decimals);
        return format!("{}", ((value / unit).round() * unit) as i64);
    }
    let text = format!("{:.*}", decimals as usize, value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, ObjectType};

    #[test]
    fn test_format_sig2() {
        assert_eq!(format_sig2(0.87654), "0.88");
        assert_eq!(format_sig2(0.5), "0.5");
        assert_eq!(format_sig2(1.0), "1");
        assert_eq!(format_sig2(12.34), "12");
        assert_eq!(format_sig2(156.0), "160");
        assert_eq!(format_sig2(0.0), "0");
        assert_eq!(format_sig2(0.0123), "0.012");
    }

    #[test]
    fn test_fallback_measure() {
        let font = LabelFont::fallback();
        let (size, baseline) = font.measure("abandoned 7");
        assert_eq!(size, Size::new(88, 11));
        assert_eq!(baseline, 5);
        assert!(!font.has_glyphs());
    }

    #[test]
    fn test_draw_label_background_stays_inside() {
        let mut frame = RgbImage::from_pixel(120, 80, Rgb([0, 0, 0]));
        let font = LabelFont::fallback();
        let bg = draw_label(
            &mut frame,
            Rect::new(-20, 2, 40, 30),
            "abandoned 1",
            Rgb([255, 0, 255]),
            150,
            &font,
        );
        assert_eq!(bg, Rect::new(0, 0, 88, 16));
        assert_eq!(*frame.get_pixel(0, 0), Rgb([150, 0, 150]));
        assert_eq!(*frame.get_pixel(100, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_track_marks_pixels() {
        let mut frame = RgbImage::new(100, 100);
        let mut track = Track::new(3, BBox::from_xywh(20.0, 20.0, 30.0, 30.0), ObjectType::CAR, 0.8);
        for i in 0..5 {
            track.push_trace(
                crate::tracking::TracePoint {
                    pos: crate::detection::Point2::new(35.0 + i as f32 * 5.0, 35.0),
                    raw: true,
                    timestamp_ms: i * 40,
                },
                10,
            );
        }
        let color = id_to_color(track.id);
        draw_track(&mut frame, &track, true, color);
        assert_eq!(*frame.get_pixel(20, 35), color);
        assert_eq!(*frame.get_pixel(40, 35), color);
        assert_eq!(*frame.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_id_colors_differ() {
        assert_ne!(id_to_color(1), id_to_color(2));
        assert_eq!(id_to_color(5), id_to_color(5));
    }
}
