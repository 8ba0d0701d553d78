use anyhow::Result;
use stream_relay::config::RelayConfig;
use stream_relay::{relay, tls};
use tokio_rustls::TlsConnector;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Stream Relay v{}", env!("CARGO_PKG_VERSION"));

    // 配置只在启动时读取一次，之后不可变
    let config = RelayConfig::from_env();
    info!("Config: {:?}", config);

    if config.insecure_skip_verify {
        warn!("Upstream TLS certificate verification is DISABLED");
    }

    let tls_config = tls::load_upstream_config(config.insecure_skip_verify)?;
    let connector = TlsConnector::from(tls_config);

    relay::run_relay(config, connector).await
}
