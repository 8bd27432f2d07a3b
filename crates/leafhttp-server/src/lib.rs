//! Tokio/hyper/rustls runtime adapter for a declared response tree.
//!
//! This crate takes a compiled [`leafhttp_kernel::DispatchIndex`], binds one
//! listener per endpoint it names, and serves HTTP/1.1 and HTTP/2 (with or
//! without TLS) by feeding every accepted connection's requests through
//! [`leafhttp_kernel::RequestPipeline`] (§4.10).
//!
//! # Example
//!
//! ```rust,no_run
//! use leafhttp_kernel::{RootGroup, config::{Endpoint, HttpConfig}};
//! use leafhttp_server::{Server, ServerResult};
//!
//! #[tokio::main]
//! async fn main() -> ServerResult<()> {
//!     let endpoint = Endpoint::new("0.0.0.0", 8080);
//!     let tree = RootGroup::new().endpoint(endpoint, HttpConfig::http1());
//!     let handle = Server::new(tree.resolve()).start().await?;
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```

pub mod body_adapter;
pub mod connection;
pub mod error;
pub mod listener;
pub mod response_adapter;
pub mod server;
pub mod state;

pub use error::{ServerError, ServerResult};
pub use server::{Server, ServerHandle};
pub use state::AppState;
