use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use log::{error, info};

use dose3d_backend::app_state::AppState;
use dose3d_backend::config::{GRID_TTL_VAR, PORT_VAR, RESOURCE_DIR_VAR, ServerConfig};
use dose3d_backend::grid_store::GridStore;
use dose3d_backend::routes;
use dose3d_backend::utils::parser_registry::ParserRegistry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("配置错误: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };

    // 初始化解析器注册表
    let parser_registry = Arc::new(ParserRegistry::new());
    info!("已注册的解析器:");
    for ext in parser_registry.supported_extensions() {
        info!("  - .{}", ext);
    }

    let grid_store = Arc::new(GridStore::with_ttl(config.grid_ttl));
    let app_state = web::Data::new(AppState {
        parser_registry,
        resource_dir: config.resource_dir.clone(),
        grid_store: grid_store.clone(),
    });

    // 后台清理任务：每 5 分钟清理一次过期的网格
    let cleanup_store = grid_store.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(std::time::Duration::from_secs(5 * 60));
        loop {
            interval.tick().await;
            let cleaned_count = cleanup_store.cleanup_expired();
            if cleaned_count > 0 {
                info!(
                    "[清理任务] 清理了 {} 个过期网格，当前剩余: {} 个",
                    cleaned_count,
                    cleanup_store.grid_count()
                );
            }
        }
    });

    info!("服务器启动在 http://{}:{}", config.host, config.port);
    info!("资源目录: {} (${})", config.resource_dir, RESOURCE_DIR_VAR);
    info!(
        "网格 TTL: {} 秒 (${})，端口可通过 ${} 修改",
        grid_store.default_ttl().as_secs(),
        GRID_TTL_VAR,
        PORT_VAR
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
