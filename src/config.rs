// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 命令行参数与 JSON 运行配置

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::tracking::TrackerSettings;

/// 多目标检测跟踪演示
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "多目标检测 + 跟踪演示", long_about = None)]
pub struct Args {
    /// 图片序列目录 (按文件名排序)
    #[arg(short, long)]
    pub input: PathBuf,

    /// 输入帧率
    #[arg(long, default_value_t = 25.0)]
    pub fps: f32,

    /// 场景: motion / face / pedestrian / dnn / yolo-darknet / yolo-tensorrt
    #[arg(short, long, default_value = "motion")]
    pub scenario: String,

    /// 检测器标签, 覆盖场景默认值 (如 motion-mog2)
    #[arg(short, long)]
    pub detector: Option<String>,

    /// 模型文件, 覆盖 modelBinary
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// 模型数据目录 (不指定则使用配置文件, 默认 ../data/)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// 输出目录 (不指定则不保存)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// 标签字体 (TTF/OTF)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// JSON 配置文件
    #[arg(short, long, default_value = "mtrack_config.json")]
    pub config: PathBuf,

    /// 每帧输出日志
    #[arg(long)]
    pub show_logs: bool,

    /// 调试日志
    #[arg(short, long)]
    pub verbose: bool,

    /// 最多处理的帧数
    #[arg(long)]
    pub max_frames: Option<u64>,
}

/// 跟踪器参数覆盖 (未设置的字段保持场景默认值)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_thres: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_skipped_frames: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_trace_length: Option<usize>,
}

impl TrackerOverrides {
    pub fn apply(&self, settings: &mut TrackerSettings) {
        if let Some(v) = self.dist_thres {
            settings.dist_thres = v;
        }
        if let Some(v) = self.max_skipped_frames {
            settings.max_skipped_frames = v;
        }
        if let Some(v) = self.max_trace_length {
            settings.max_trace_length = v;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// 运行配置 - 通过JSON文件调整参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // === 数据 ===
    pub data_dir: PathBuf,            // 模型目录
    pub output_dir: Option<PathBuf>,  // 输出目录
    pub font_path: Option<PathBuf>,   // 标签字体

    // === 遗留物检测 ===
    pub min_static_time: i32, // 最小静止时间(秒)
    pub max_static_time: i32, // 最大静止时间(秒)

    // === 绘制 ===
    pub show_logs: bool,
    pub draw_trajectories: bool,
    pub label_alpha: u8, // 标签背景权重 (0 为实心填充)

    // === 跟踪器 ===
    pub tracker_overrides: TrackerOverrides,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("../data/"),
            output_dir: None,
            font_path: None,

            min_static_time: 5,
            max_static_time: 10,

            show_logs: false,
            draw_trajectories: true,
            label_alpha: 150,

            tracker_overrides: TrackerOverrides::default(),
        }
    }
}

impl AppConfig {
    /// 从JSON文件加载配置, 文件不存在时创建默认配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在, 创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {:#}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, json).with_context(|| format!("写入 {} 失败", path.display()))?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 命令行参数优先于配置文件
    pub fn merge_args(&mut self, args: &Args) {
        if let Some(dir) = &args.data_dir {
            self.data_dir = dir.clone();
        }
        if args.out.is_some() {
            self.output_dir = args.out.clone();
        }
        if args.font.is_some() {
            self.font_path = args.font.clone();
        }
        self.show_logs |= args.show_logs;
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️ 当前配置:");
        info!("  模型目录: {}", self.data_dir.display());
        info!("  静止时间: {}..{} 秒", self.min_static_time, self.max_static_time);
        info!("  标签透明度: {}", self.label_alpha);
        if !self.tracker_overrides.is_empty() {
            info!("  跟踪器覆盖: {:?}", self.tracker_overrides);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let config = AppConfig::load(&path);
        assert_eq!(config, AppConfig::default());
        assert!(path.is_file());
        assert_eq!(AppConfig::load(&path), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(
            &path,
            r#"{ "min_static_time": 3, "tracker_overrides": { "max_skipped_frames": 7 } }"#,
        )
        .unwrap();
        let config = AppConfig::load(&path);
        assert_eq!(config.min_static_time, 3);
        assert_eq!(config.max_static_time, 10);
        assert_eq!(config.label_alpha, 150);
        assert_eq!(config.tracker_overrides.max_skipped_frames, Some(7));
    }

    #[test]
    fn test_invalid_json_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load(&path), AppConfig::default());
    }

    #[test]
    fn test_tracker_overrides_apply() {
        let mut settings = TrackerSettings::default();
        let overrides = TrackerOverrides {
            dist_thres: Some(0.3),
            max_trace_length: Some(12),
            ..Default::default()
        };
        overrides.apply(&mut settings);
        assert_eq!(settings.dist_thres, 0.3);
        assert_eq!(settings.max_trace_length, 12);
        assert_eq!(settings.max_skipped_frames, TrackerSettings::default().max_skipped_frames);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "mtrack",
            "--input",
            "frames",
            "--scenario",
            "yolo-darknet",
            "--max-frames",
            "20",
            "--show-logs",
        ]);
        assert_eq!(args.scenario, "yolo-darknet");
        assert_eq!(args.fps, 25.0);
        assert_eq!(args.data_dir, None);
        assert_eq!(args.max_frames, Some(20));

        let mut config = AppConfig::default();
        config.merge_args(&args);
        assert!(config.show_logs);
        assert_eq!(config.data_dir, PathBuf::from("../data/"));
    }

    #[test]
    fn test_json_data_dir_survives_merge() {
        let mut config = AppConfig {
            data_dir: PathBuf::from("/models/from_json"),
            ..Default::default()
        };
        let args = Args::parse_from(["mtrack", "--input", "frames"]);
        config.merge_args(&args);
        assert_eq!(config.data_dir, PathBuf::from("/models/from_json"));

        let args = Args::parse_from(["mtrack", "--input", "frames", "--data-dir", "/cli"]);
        config.merge_args(&args);
        assert_eq!(config.data_dir, PathBuf::from("/cli"));
    }
}
