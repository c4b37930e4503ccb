use std::net::SocketAddr;

use anyhow::anyhow;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use zarex_gateway::{AppState, ServerConfig, create_router};

/// Zarex Gateway - Real-time voice assistant relay
#[derive(Parser, Debug)]
#[command(name = "zarex-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host to bind (overrides ZAREX_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides ZAREX_PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zarex_gateway=info,tower_http=info".into()),
        )
        .init();

    // Crypto provider for outbound TLS; must happen before any TLS connection.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let mut config = ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let address = config.address();
    let tls_config = config.tls.clone();

    let app_state = AppState::new(config)?;
    let app = create_router(app_state);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{address}': {e}"))?;

    match tls_config {
        Some(tls) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(|e| {
                    anyhow!(
                        "Failed to load TLS certificates from {} and {}: {}",
                        tls.cert_path.display(),
                        tls.key_path.display(),
                        e
                    )
                })?;

            info!("Server listening on https://{} (TLS enabled)", socket_addr);
            axum_server::bind_rustls(socket_addr, rustls_config)
                .serve(app.into_make_service())
                .await
                .map_err(|e| anyhow!("TLS server error: {e}"))?;
        }
        None => {
            info!("Server listening on http://{}", socket_addr);
            let listener = TcpListener::bind(&socket_addr).await?;
            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}
