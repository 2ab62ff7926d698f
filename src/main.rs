use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use mesh_chat::{
    config::Config,
    error::AppErr,
    media::ImageStore,
    state::Hub,
    utils::clean,
};

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mesh_chat=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let hub = Hub::shared();
    let images = Arc::new(ImageStore::new(&config.upload_dir, config.public_base_url.clone()));

    // 啟動清道夫
    tokio::spawn(clean::task(
        images.log(),
        config.upload_disk_cap,
        config.upload_sweep_interval,
    ));

    let app = mesh_chat::app(hub, images, config.body_limit);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(addr = %config.bind_address, "listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
