use fortiflex_provider::{init_logging, serve, serve_on, FortiFlexProvider};
use std::net::SocketAddr;

/// Bind address override. Unset means an ephemeral port on 127.0.0.1.
const ADDR_ENV: &str = "FORTIFLEX_PROVIDER_ADDR";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let provider = FortiFlexProvider::new();
    match std::env::var(ADDR_ENV) {
        Ok(addr) if !addr.trim().is_empty() => {
            let addr: SocketAddr = addr
                .trim()
                .parse()
                .map_err(|e| format!("invalid {} {:?}: {}", ADDR_ENV, addr, e))?;
            serve_on(provider, addr).await
        },
        _ => serve(provider).await,
    }
}
