use lifetiles::config::RelayConfig;
use lifetiles::relay;
use lifetiles::transport::hub::Hub;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = RelayConfig::from_env();
    let app = relay::app(Hub::new());

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(port = config.port, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(port = config.port, "lifetiles relay listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "relay server failed");
        std::process::exit(1);
    }
}
