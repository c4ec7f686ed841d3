use shopcart_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    shopcart_observability::init_with(config.log_format);

    let app = shopcart_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.api.bind_addr()).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        validation_mode = ?config.checkout.validation_mode,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
