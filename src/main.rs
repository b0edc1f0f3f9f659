use anyhow::Result;
use pnpilot::{logger, App, Config};
use std::sync::atomic::Ordering;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::from_env()?;

    // 初始化应用（登录所有来源）
    let app = App::initialize(config).await?;

    // 第一次 Ctrl-C：处理完当前零件后停止；第二次：立即退出，当前零件不记检查点
    let cancel = app.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ 收到停止信号，当前零件处理完后停止（再按一次立即退出）");
            cancel.store(true, Ordering::SeqCst);
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ 立即退出");
            std::process::exit(130);
        }
    });

    app.run().await?;

    Ok(())
}
