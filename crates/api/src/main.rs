use anyhow::Context;

use assetkeep_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Read .env before the log filter is built so RUST_LOG/LOG_FORMAT apply.
    let config = AppConfig::from_env().context("invalid configuration")?;
    assetkeep_observability::init();

    tracing::info!(config = ?config, "starting assetkeep-api");

    let services = assetkeep_api::app::services::build_services(&config)
        .await
        .context("failed to initialise services")?;
    let app = assetkeep_api::app::build_app(services, &config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
