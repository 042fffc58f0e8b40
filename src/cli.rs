//! 命令行参数

use crate::config::Config;
use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "exam_compose", version, about = "从题库组卷并输出 PDF / Word 文档")]
pub struct Args {
    /// 出卷任务文件 (TOML)
    pub job: PathBuf,

    /// 配置文件 (TOML)；不指定时只读环境变量
    #[arg(short, long, env = "EXAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// 固定随机种子，覆盖配置中的 shuffle_seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// 显示详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 加载配置，命令行参数优先
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::from_env(),
        };
        config.shuffle_seed = self.seed.or(config.shuffle_seed);
        config.verbose_logging |= self.verbose;
        config.validate()?;
        Ok(config)
    }
}
