use anyhow::Result;
use assessment_bank::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::from_env();

    // 初始化并运行应用
    let _report = App::initialize(config).await?.run().await?;

    Ok(())
}
