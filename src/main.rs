use anyhow::Result;
use paper_screen::utils::logging;
use paper_screen::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(&config.output_log_file)?;

    // 初始化并运行应用
    let _report = App::initialize(config).await?.run().await?;

    Ok(())
}
