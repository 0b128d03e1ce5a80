// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 图片序列帧源

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{frame_timestamp_ms, Frame, FrameSource, SourceError};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    fps: f32,
    next: usize,
    frame_size: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    /// 打开目录, 按文件名排序
    pub fn open(dir: impl AsRef<Path>, fps: f32) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let io_err = |source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            warn!("⚠️ 目录中没有图片: {}", dir.display());
        } else {
            info!("📂 图片序列: {} ({} 帧, {} fps)", dir.display(), files.len(), fps);
        }

        Ok(Self {
            files,
            fps,
            next: 0,
            frame_size: None,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn fps(&self) -> f32 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let image = image::open(path)
            .map_err(|source| SourceError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();

        let actual = image.dimensions();
        match self.frame_size {
            Some(expected) if expected != actual => {
                return Err(SourceError::FrameSize { expected, actual });
            }
            None => self.frame_size = Some(actual),
            _ => {}
        }

        let index = self.next as u64;
        self.next += 1;
        Ok(Some(Frame::new(index, frame_timestamp_ms(index, self.fps), image)))
    }
}
