// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 逐帧处理流水线 (Per-frame pipeline)
///
/// 状态机:
/// ```text
/// Uninitialized → DetectorReady → TrackerReady → Running → Stopped
///        └──────→ Failed (检测器构造失败 / 没有第一帧)
/// ```
/// 每帧顺序执行: 检测 → 跟踪更新 → 分类 → 渲染, 单线程, 阶段之间不重叠。
pub mod scenarios;

pub use scenarios::{
    LabelStyle, PedestrianKind, Profile, RenderPolicy, RobustThresholds, Scenario,
    ScenarioContext,
};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::TrackerOverrides;
use crate::detection::{ConfigTable, Detector, DetectorError, DetectorRegistry, Size};
use crate::input::{Frame, FrameSink, FrameSource, SourceError};
use crate::renderer::{draw_label, draw_track, format_sig2, id_to_color, LabelFont};
use crate::tracking::{build_tracker, Track, Tracker};

/// 源未报告帧率时使用
const FALLBACK_FPS: f32 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    DetectorReady,
    TrackerReady,
    Running,
    Stopped,
    Failed,
}

impl PipelineState {
    /// 终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Stopped | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("detector construction failed: {0}")]
    Detector(#[from] DetectorError),

    #[error("frame source produced no first frame")]
    NoFirstFrame,

    #[error("frame source error: {0}")]
    Source(#[from] SourceError),

    #[error("frame sink error: {0}")]
    Sink(String),

    #[error("operation not allowed in state {0}")]
    InvalidState(PipelineState),
}

/// 外部停止标志, 只在帧之间检查
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 单帧统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub index: u64,
    pub tracks: usize,
    pub robust: usize,
    pub abandoned: usize,
    pub elapsed_ms: f64,
}

/// 运行结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub state: PipelineState,
}

/// 轨迹分类结果 (每帧每条轨迹只走一条绘制路径)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackClass {
    Abandoned,
    Robust,
    Rejected,
}

/// 分类单条轨迹
pub fn classify(track: &Track, policy: &RenderPolicy) -> TrackClass {
    if policy.abandoned_path && track.is_static() {
        return TrackClass::Abandoned;
    }
    let r = &policy.robust;
    if track.is_robust(r.min_trace_size, r.min_raw_ratio, r.aspect) {
        TrackClass::Robust
    } else {
        TrackClass::Rejected
    }
}

/// 标签文字
pub fn track_label(track: &Track, style: LabelStyle) -> Option<String> {
    let name = track.object_type.name();
    match style {
        LabelStyle::None => None,
        LabelStyle::TypeConf => Some(format!("{}: {}", name, format_sig2(track.confidence))),
        LabelStyle::TypeVelocityConf => Some(format!(
            "{} [{}, {}]: {}",
            name,
            format_sig2(track.velocity.x),
            format_sig2(track.velocity.y),
            format_sig2(track.confidence)
        )),
    }
}

/// 绘制一帧的所有轨迹, 返回 (可靠数, 遗留物数)
pub fn render_tracks(
    frame: &mut RgbImage,
    tracks: &[Track],
    policy: &RenderPolicy,
    font: &LabelFont,
) -> (usize, usize) {
    let (mut robust, mut abandoned) = (0, 0);
    for track in tracks {
        let color = id_to_color(track.id);
        match classify(track, policy) {
            TrackClass::Abandoned => {
                abandoned += 1;
                draw_track(frame, track, false, color);
                let label = format!("abandoned {}", track.id);
                draw_label(
                    frame,
                    track.rrect.bounding_rect(),
                    &label,
                    policy.abandoned_color,
                    policy.label_alpha,
                    font,
                );
            }
            TrackClass::Robust => {
                robust += 1;
                draw_track(frame, track, policy.draw_trajectory, color);
                if let Some(label) = track_label(track, policy.label) {
                    draw_label(
                        frame,
                        track.rrect.bounding_rect(),
                        &label,
                        policy.label_color,
                        policy.label_alpha,
                        font,
                    );
                }
            }
            TrackClass::Rejected => {}
        }
    }
    (robust, abandoned)
}

/// 运行选项 (来自命令行 + JSON 配置)
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub context: ScenarioContext,
    /// 每帧日志使用 info (否则 debug)
    pub show_logs: bool,
    /// 覆盖场景的标签透明度
    pub label_alpha: Option<u8>,
    /// false 时关闭所有轨迹线
    pub draw_trajectories: bool,
    /// 合并到场景配置表之后 (同名键覆盖)
    pub config_overrides: ConfigTable,
    pub tracker_overrides: TrackerOverrides,
    pub max_frames: Option<u64>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            context: ScenarioContext::default(),
            show_logs: false,
            label_alpha: None,
            draw_trajectories: true,
            config_overrides: ConfigTable::new(),
            tracker_overrides: TrackerOverrides::default(),
            max_frames: None,
        }
    }
}

pub struct Pipeline {
    scenario: Box<dyn Scenario>,
    registry: DetectorRegistry,
    options: PipelineOptions,
    font: LabelFont,
    state: PipelineState,
    detector: Option<Box<dyn Detector>>,
    tracker: Option<Box<dyn Tracker>>,
    policy: RenderPolicy,
    fps: f32,
}

impl Pipeline {
    pub fn new(scenario: Box<dyn Scenario>, registry: DetectorRegistry) -> Self {
        Self {
            scenario,
            registry,
            options: PipelineOptions::default(),
            font: LabelFont::fallback(),
            state: PipelineState::Uninitialized,
            detector: None,
            tracker: None,
            policy: RenderPolicy::default(),
            fps: FALLBACK_FPS,
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_font(mut self, font: LabelFont) -> Self {
        self.font = font;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn render_policy(&self) -> &RenderPolicy {
        &self.policy
    }

    pub fn tracker(&self) -> Option<&dyn Tracker> {
        self.tracker.as_deref()
    }

    pub fn detector(&self) -> Option<&dyn Detector> {
        self.detector.as_deref()
    }

    /// 用第一帧创建检测器与跟踪器
    pub fn initialize(&mut self, first_frame: &RgbImage, fps: f32) -> Result<(), PipelineError> {
        if self.state != PipelineState::Uninitialized {
            return Err(PipelineError::InvalidState(self.state));
        }

        self.fps = if fps > 0.0 {
            fps
        } else {
            warn!("⚠️ 无效帧率 {}, 使用 {}", fps, FALLBACK_FPS);
            FALLBACK_FPS
        };
        let ctx = &self.options.context;
        let frame_size = Size::new(first_frame.width() as i32, first_frame.height() as i32);
        let variant = self.scenario.variant();

        let mut config = self.scenario.config_table(ctx, self.fps);
        config.merge(&self.options.config_overrides);

        let mut detector = match self.registry.create_detector(variant, &config, first_frame) {
            Ok(d) => d,
            Err(e) => {
                error!("❌ 检测器初始化失败 [{}]: {}", self.scenario.name(), e);
                self.state = PipelineState::Failed;
                return Err(e.into());
            }
        };
        detector.set_min_object_size(self.scenario.min_object_size(frame_size));
        self.detector = Some(detector);
        self.state = PipelineState::DetectorReady;

        let mut settings = self.scenario.tracker_settings(ctx, frame_size, self.fps);
        self.options.tracker_overrides.apply(&mut settings);
        self.tracker = Some(build_tracker(settings));
        self.state = PipelineState::TrackerReady;

        let mut policy = self.scenario.render_policy(self.fps);
        if let Some(alpha) = self.options.label_alpha {
            policy.label_alpha = alpha;
        }
        if !self.options.draw_trajectories {
            policy.draw_trajectory = false;
        }
        self.policy = policy;

        info!(
            "✅ 流水线就绪: {} ({}x{}, {:.1} fps)",
            self.scenario.name(),
            frame_size.width,
            frame_size.height,
            self.fps
        );
        Ok(())
    }

    /// 处理一帧: 检测 → 跟踪 → 分类 → 渲染 (就地绘制到帧上)
    pub fn process_frame(&mut self, frame: &mut Frame) -> Result<FrameReport, PipelineError> {
        if !matches!(
            self.state,
            PipelineState::TrackerReady | PipelineState::Running
        ) {
            return Err(PipelineError::InvalidState(self.state));
        }
        let (Some(detector), Some(tracker)) = (self.detector.as_mut(), self.tracker.as_mut()) else {
            return Err(PipelineError::InvalidState(self.state));
        };
        self.state = PipelineState::Running;

        let start = Instant::now();
        let detections = match detector.detect(&frame.image) {
            Ok(d) => d,
            Err(e) => {
                warn!("⚠️ 第 {} 帧检测失败: {}", frame.index, e);
                Vec::new()
            }
        };
        tracker.update(&detections, &frame.image, frame.timestamp_ms);

        let tracks = tracker.tracks();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if self.options.show_logs {
            info!(
                "Frame {}: tracks = {}, time = {:.0}ms",
                frame.index,
                tracks.len(),
                elapsed_ms
            );
        } else {
            debug!(
                "Frame {}: tracks = {}, time = {:.0}ms",
                frame.index,
                tracks.len(),
                elapsed_ms
            );
        }

        let (robust, abandoned) = render_tracks(&mut frame.image, tracks, &self.policy, &self.font);
        if self.policy.draw_motion_map {
            detector.draw_motion_map(&mut frame.image);
        }

        Ok(FrameReport {
            index: frame.index,
            tracks: tracks.len(),
            robust,
            abandoned,
            elapsed_ms,
        })
    }

    /// 运行到输入结束或外部停止
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        stop: &StopFlag,
    ) -> Result<RunSummary, PipelineError> {
        let first = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                error!("❌ 输入没有任何帧");
                self.state = PipelineState::Failed;
                return Err(PipelineError::NoFirstFrame);
            }
            Err(e) => {
                error!("❌ 读取第一帧失败: {}", e);
                self.state = PipelineState::Failed;
                return Err(e.into());
            }
        };
        self.initialize(&first.image, source.fps())?;

        let mut frames = 0u64;
        let mut next = Some(first);
        while let Some(mut frame) = next.take() {
            if stop.is_stopped() {
                info!("⏹️ 收到停止信号");
                break;
            }
            if self.options.max_frames.is_some_and(|max| frames >= max) {
                break;
            }

            self.process_frame(&mut frame)?;
            if let Err(e) = sink.write(&frame) {
                self.state = PipelineState::Failed;
                return Err(PipelineError::Sink(format!("{:#}", e)));
            }
            frames += 1;

            next = match source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("⚠️ 读取帧失败, 结束: {}", e);
                    None
                }
            };
        }

        if let Err(e) = sink.finish() {
            self.state = PipelineState::Failed;
            return Err(PipelineError::Sink(format!("{:#}", e)));
        }
        self.state = PipelineState::Stopped;
        info!("🏁 处理完成: {} 帧", frames);
        Ok(RunSummary {
            frames,
            state: self.state,
        })
    }
}
