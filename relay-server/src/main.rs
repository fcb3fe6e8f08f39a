//! Chat relay binary. Configuration comes from the environment (and a `.env`
//! file, if present); see [`RelayConfig::load`].

use relay_server::{RelayConfig, init_tracing, start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::load()?;
    init_tracing(config.log_format)?;

    start_server(config).await
}
