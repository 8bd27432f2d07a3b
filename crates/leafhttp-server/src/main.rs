//! leafhttp demo entry point — serves a minimal response tree so the crate
//! can be run directly as a smoke test.
//!
//! # Environment variables
//!
//! | Variable      | Default | Description        |
//! |---------------|---------|--------------------|
//! | `LEAFHTTP_PORT` | `8080`  | TCP port to listen on. |

use leafhttp_kernel::config::{Endpoint, HttpConfig};
use leafhttp_kernel::{InnerGroup, Input, ResponseBuilder, ResponseContent, RootGroup};
use leafhttp_server::{Server, ServerResult};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ServerResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leafhttp_server=info".parse().unwrap()))
        .init();

    let port: u16 = std::env::var("LEAFHTTP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let endpoint = Endpoint::new("0.0.0.0", port);

    let tree = RootGroup::new()
        .endpoint(endpoint.clone(), HttpConfig::http1())
        .child(InnerGroup::new().path("health").child(
            ResponseBuilder::new()
                .content(|_: Input<(), (), (), ()>| Ok(ResponseContent::new(200, b"ok".to_vec()))),
        ));

    tracing::info!(address = %endpoint.address, port = endpoint.port, "starting leafhttp demo server");
    let handle = Server::new(tree.resolve()).start().await?;

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received, draining connections");
    handle.stop().await;
    Ok(())
}
