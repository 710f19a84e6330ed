use std::error::Error;
use study_resource_hub::config::AppConfig;
use study_resource_hub::database_sea::connect_database;
use study_resource_hub::web_server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载.env文件，RUST_LOG 也可以写在其中
    dotenv::dotenv().ok();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 从环境变量获取配置
    let config = AppConfig::from_env()?;
    info!("配置加载完成，监听 {}:{}", config.host, config.port);

    // 连接数据库
    let db = connect_database(&config.database_url).await?;

    // 启动Web服务器
    match web_server::start_server(db, &config).await {
        Ok(_) => {
            info!("Web服务器已停止");
            Ok(())
        }
        Err(e) => {
            error!("Web服务器启动失败: {}", e);
            // 打印错误的源链
            let mut source = e.source();
            while let Some(err) = source {
                error!("  由于: {}", err);
                source = err.source();
            }
            Err(e)
        }
    }
}
