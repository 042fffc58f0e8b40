use anyhow::Result;
use clap::Parser;
use exam_compose::cli::Args;
use exam_compose::utils::logging;
use exam_compose::{App, ExamJob};

fn main() -> Result<()> {
    let args = Args::parse();

    // 加载配置（命令行参数覆盖配置文件和环境变量）
    let config = args.load_config()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    let job = ExamJob::from_toml_file(&args.job)?;

    // 初始化并运行应用
    let mut app = App::initialize(config)?;
    app.run(&job)?;

    Ok(())
}
