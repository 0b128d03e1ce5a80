// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 通道帧源: 解码线程 → 处理线程

use crossbeam_channel::{bounded, Receiver, Sender};
use image::RgbImage;

use super::{frame_timestamp_ms, Frame, FrameSource, SourceError};

pub struct ChannelSource {
    rx: Receiver<RgbImage>,
    fps: f32,
    next: u64,
}

impl ChannelSource {
    pub fn new(rx: Receiver<RgbImage>, fps: f32) -> Self {
        Self { rx, fps, next: 0 }
    }

    /// 创建有界通道, 返回 (发送端, 帧源)
    pub fn bounded(capacity: usize, fps: f32) -> (Sender<RgbImage>, Self) {
        let (tx, rx) = bounded(capacity);
        (tx, Self::new(rx, fps))
    }
}

impl FrameSource for ChannelSource {
    fn fps(&self) -> f32 {
        self.fps
    }

    /// 阻塞等待下一帧, 所有发送端断开时结束
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        match self.rx.recv() {
            Ok(image) => {
                let index = self.next;
                self.next += 1;
                Ok(Some(Frame::new(index, frame_timestamp_ms(index, self.fps), image)))
            }
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_source_ends_on_disconnect() {
        let (tx, mut source) = ChannelSource::bounded(4, 20.0);
        let producer = std::thread::spawn(move || {
            for _ in 0..3 {
                tx.send(RgbImage::new(4, 4)).unwrap();
            }
        });

        let mut stamps = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            stamps.push(frame.timestamp_ms);
        }
        producer.join().unwrap();
        assert_eq!(stamps, vec![0, 50, 100]);
        assert_eq!(source.fps(), 20.0);
    }
}
