// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输入/输出 (Frame sources and sinks)
///
/// - ImageSequenceSource: 图片序列目录 (按文件名排序)
/// - ChannelSource:       crossbeam 通道 (阻塞接收, 断开即结束)
/// - ImageDirSink:        标注结果写入 PNG 目录
/// - NullSink:            丢弃输出
pub mod channel;
pub mod sequence;
pub mod sink;

pub use channel::ChannelSource;
pub use sequence::ImageSequenceSource;
pub use sink::{FrameSink, ImageDirSink, NullSink};

use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;

/// 帧源错误
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("frame size changed from {expected:?} to {actual:?}")]
    FrameSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// 一帧图像
#[derive(Clone, Debug)]
pub struct Frame {
    /// 帧序号 (从0开始)
    pub index: u64,
    /// 时间戳 (毫秒)
    pub timestamp_ms: i64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, timestamp_ms: i64, image: RgbImage) -> Self {
        Self {
            index,
            timestamp_ms,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 帧源: 可查询帧率, 阻塞读取下一帧
pub trait FrameSource {
    /// 实测/配置的帧率
    fn fps(&self) -> f32;

    /// 下一帧; `Ok(None)` 表示输入结束
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// 帧序号 → 时间戳 (毫秒)
pub fn frame_timestamp_ms(index: u64, fps: f32) -> i64 {
    if fps <= 0.0 {
        return 0;
    }
    (index as f64 * 1000.0 / fps as f64).round() as i64
}
