//! 日志工具模块
//!
//! 订阅器初始化，以及批量运行时的横幅、统计输出

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅器
///
/// 优先使用 `RUST_LOG`；未设置时 verbose 为 debug，否则 info。
/// `LOG_FORMAT=json` 时输出 JSON 行。重复调用不会 panic。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(false)))
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `mode`: 运行模式（single / batch）
/// - `max_concurrent`: 最大并发数
pub fn log_startup(mode: &str, max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {} 模式", mode);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录任务准备信息
///
/// # 参数
/// - `total`: 任务总数
/// - `models` / `files` / `datatypes`: 各维度数量
/// - `jobs`: 并发数
pub fn log_tasks_prepared(total: usize, models: usize, files: usize, datatypes: usize, jobs: usize) {
    info!(
        "✓ 准备了 {} 个任务 ({} 模型 × {} 文件 × {} 格式)，并发 {}",
        total, models, files, datatypes, jobs
    );
}

/// 记录重试轮次
pub fn log_retry_round(attempt: usize, max_attempts: usize, pending: usize) {
    info!("\n{}", "─".repeat(60));
    info!("🔁 第 {}/{} 轮重试，待重试任务 {} 个", attempt, max_attempts, pending);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `failures`: 失败描述，最多展示前 10 条
pub fn print_final_stats(success: usize, failed: usize, total: usize, failures: &[String]) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    for line in failures.iter().take(10) {
        error!("  - {}", line);
    }
    if failures.len() > 10 {
        error!("  ... 另有 {} 个失败未列出", failures.len() - 10);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("对位法练习", 2), "对位...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init(false);
        init(true);
    }
}
