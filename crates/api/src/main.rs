use anyhow::Context;

use rolegate_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rolegate_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind = config.bind;

    let services = rolegate_api::app::services::build_services(&config)
        .await
        .context("failed to initialize services")?;
    let app = rolegate_api::app::router(services);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
