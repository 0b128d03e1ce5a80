// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 多目标检测跟踪演示 - 图片序列 → 检测 → 跟踪 → 标注输出
///
/// 双线程: 解码线程读取图片序列, 主线程逐帧处理
///
/// 直接运行: cargo run --release --bin mtrack -- --input frames/ --scenario motion --out out/
use std::io::BufRead;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use mtracking_rs::detection::DetectorVariant;
use mtracking_rs::input::{
    ChannelSource, FrameSink, FrameSource, ImageDirSink, ImageSequenceSource, NullSink,
};
use mtracking_rs::pipeline::{PipelineOptions, ScenarioContext};
use mtracking_rs::renderer::LabelFont;
use mtracking_rs::{
    logging, AppConfig, Args, DetectorRegistry, Pipeline, Profile, Scenario, StopFlag,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 标签字号 (像素)
const LABEL_FONT_PX: f32 = 16.0;

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let mut config = AppConfig::load(&args.config);
    config.merge_args(&args);
    config.print_summary();

    // 场景 + 可选的检测器覆盖
    let mut profile: Profile = args.scenario.parse()?;
    if let Some(tag) = &args.detector {
        let variant: DetectorVariant = tag.parse()?;
        profile = profile.with_variant(variant)?;
    }

    let mut options = PipelineOptions {
        context: ScenarioContext {
            data_dir: config.data_dir.clone(),
            min_static_time: config.min_static_time,
            max_static_time: config.max_static_time,
        },
        show_logs: config.show_logs,
        label_alpha: Some(config.label_alpha),
        draw_trajectories: config.draw_trajectories,
        tracker_overrides: config.tracker_overrides.clone(),
        max_frames: args.max_frames,
        ..Default::default()
    };
    if let Some(model) = &args.model {
        options
            .config_overrides
            .set("modelBinary", model.to_string_lossy().into_owned());
    }

    let font = match &config.font_path {
        Some(path) => LabelFont::load(path, LABEL_FONT_PX).unwrap_or_else(|e| {
            warn!("⚠️ {:#}, 标签只绘制背景", e);
            LabelFont::fallback()
        }),
        None => LabelFont::fallback(),
    };

    println!("🎬 场景: {} | 检测器: {}", profile, profile.variant());
    println!("📂 输入: {} ({} fps)", args.input.display(), args.fps);

    // 解码线程 → 主线程
    let mut sequence = ImageSequenceSource::open(&args.input, args.fps)
        .with_context(|| format!("打开输入失败: {}", args.input.display()))?;
    let (tx, mut source) = ChannelSource::bounded(60, sequence.fps());
    std::thread::spawn(move || loop {
        match sequence.next_frame() {
            Ok(Some(frame)) => {
                if tx.send(frame.image).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("❌ 解码失败: {}", e);
                break;
            }
        }
    });

    // 输入 q 回车停止
    let stop = StopFlag::new();
    let stop_on_input = stop.clone();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) if l.trim().eq_ignore_ascii_case("q") => {
                    stop_on_input.stop();
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    let mut sink: Box<dyn FrameSink> = match &config.output_dir {
        Some(dir) => Box::new(ImageDirSink::create(dir)?),
        None => Box::new(NullSink::default()),
    };

    let mut pipeline = Pipeline::new(Box::new(profile), DetectorRegistry::with_defaults())
        .with_options(options)
        .with_font(font);

    let summary = pipeline.run(&mut source, sink.as_mut(), &stop)?;
    info!("✅ 完成: {} 帧, 状态 {}", summary.frames, summary.state);
    Ok(())
}
