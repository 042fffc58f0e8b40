/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use crate::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`；未设置时按 `verbose` 选择 debug / info。
/// 重复初始化时静默忽略。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 组卷出卷模式");
    info!("📁 题库: {}", config.pool_path);
    info!("🗄️ 归档目录: {}", config.archive_dir);
    match config.shuffle_seed {
        Some(seed) => info!("🎲 随机种子: {}", seed),
        None => info!("🎲 随机种子: 系统随机"),
    }
    info!("{}", "=".repeat(60));
}

/// 记录题库加载信息
///
/// # 参数
/// - `total`: 题目总数
/// - `courses`: 涉及的课程
pub fn log_pool_loaded(total: usize, courses: &[String]) {
    info!("✓ 题库中共有 {} 道题目", total);
    info!("📋 课程: {}\n", courses.join(", "));
}

/// 打印最终统计信息
///
/// # 参数
/// - `groups`: 分组数量
/// - `documents`: 文档数量
/// - `flagged`: 需要核对的题目数
/// - `output`: 输出文件路径
pub fn print_final_stats(groups: usize, documents: usize, flagged: usize, output: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 出卷完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 分组: {}", groups);
    info!("📄 文档: {}", documents);
    info!("⚠️ 待核对: {}", flagged);
    info!("{}", "=".repeat(60));
    info!("\n文件已保存至: {}", output);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
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
