// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 输出端: 保存标注后的帧

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use super::Frame;

pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 丢弃所有帧 (仅计数)
#[derive(Debug, Default)]
pub struct NullSink {
    pub frames: u64,
}

impl FrameSink for NullSink {
    fn write(&mut self, _frame: &Frame) -> Result<()> {
        self.frames += 1;
        Ok(())
    }
}

/// PNG 目录输出: frame_000000.png, frame_000001.png, ...
pub struct ImageDirSink {
    dir: PathBuf,
    written: u64,
}

impl ImageDirSink {
    /// 在 base 下创建带时间戳的子目录
    pub fn create(base: impl AsRef<Path>) -> Result<Self> {
        let dir = base
            .as_ref()
            .join(format!("mtrack_{}", crate::gen_time_string("-")));
        Self::at(dir)
    }

    /// 直接使用指定目录
    pub fn at(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("创建输出目录失败: {}", dir.display()))?;
        info!("💾 输出目录: {}", dir.display());
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for ImageDirSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", frame.index));
        frame
            .image
            .save(&path)
            .with_context(|| format!("保存帧失败: {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!("💾 已保存 {} 帧到 {}", self.written, self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_image_dir_sink_writes_png() {
        let base = tempfile::tempdir().unwrap();
        let mut sink = ImageDirSink::create(base.path()).unwrap();
        assert!(sink.dir().starts_with(base.path()));

        sink.write(&Frame::new(7, 280, RgbImage::new(6, 4))).unwrap();
        sink.finish().unwrap();

        let saved = sink.dir().join("frame_000007.png");
        assert!(saved.is_file());
        assert_eq!(image::open(saved).unwrap().to_rgb8().dimensions(), (6, 4));
        assert_eq!(sink.written(), 1);
    }

    #[test]
    fn test_null_sink_counts() {
        let mut sink = NullSink::default();
        sink.write(&Frame::new(0, 0, RgbImage::new(1, 1))).unwrap();
        sink.write(&Frame::new(1, 40, RgbImage::new(1, 1))).unwrap();
        assert_eq!(sink.frames, 2);
    }
}
