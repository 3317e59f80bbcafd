use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wizard_client::config::ApiKeys;
use wizard_server::{
    app::{router, AppState},
    config::Config,
};

#[derive(Parser, Debug)]
struct Args {
    /// YAML file with server and provider settings
    #[clap(long)]
    config: Option<String>,

    /// The address and optionally port to bind to, overriding the config file
    #[clap(long)]
    address: Option<String>,
}

/// Log JSON to a daily rolling file when a directory is configured, otherwise to stdout.
/// Keep the returned guard alive or buffered file logs are lost.
fn init_tracing(log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "access.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .json()
                .with_writer(non_blocking)
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("Loading config from {path}"))?,
        None => Config::default(),
    };
    if let Some(address) = args.address {
        config.server.address = address;
    }

    // initialize tracing
    let _guard = init_tracing(config.server.log_dir.as_deref());

    // connect to every enabled provider up front, so a missing key stops us here
    let state = AppState::connect(&config, &ApiKeys::from_env())
        .await
        .context("Connecting to providers")?;

    // build our application with a route
    let app = router(state);

    // In development, use HTTP. In production, use HTTPS.
    if let Some(tls) = &config.server.tls {
        rustls::crypto::ring::default_provider()
            .install_default()
            .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;
        let tls_config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .context("Loading TLS certificate")?;

        let addr = config.server.address.parse()?;
        tracing::info!("Listening on {}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .context("Starting TLS server")?;
    } else {
        let listener = tokio::net::TcpListener::bind(&config.server.address).await?;
        tracing::info!("Listening on {}", config.server.address);
        axum::serve(listener, app).await?;
    }
    Ok(())
}
