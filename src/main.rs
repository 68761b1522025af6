use schoolhouse::{app, backend::Backend, config::Config, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let app_state = AppState {
        backend: Backend::new(&config.backend_url)?,
    };

    let app = app(app_state, &config);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(bind = %config.bind, backend = %config.backend_url, "serving");
    axum::serve(listener, app).await?;
    Ok(())
}
