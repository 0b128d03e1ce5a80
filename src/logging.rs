// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 日志初始化 (tracing-subscriber)

use tracing_subscriber::EnvFilter;

/// 安装全局 fmt 订阅者
///
/// `RUST_LOG` 优先; 未设置时 verbose 使用 debug, 否则 info。
/// 重复调用时忽略 (测试中可能多次初始化)。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
        tracing::info!("logging initialized");
    }
}
