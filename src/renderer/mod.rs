// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 叠加层渲染 (Overlay renderer)
//!
//! - `overlay`: Alpha混合填充与标签矩形约束
//! - `draw`:    轨迹框/轨迹线/标签文字

pub mod draw;
pub mod overlay;

pub use draw::{draw_label, draw_track, format_sig2, id_to_color, LabelFont};
pub use overlay::{blend_channel, clamp_label_rect, draw_filled_rect, label_background};
