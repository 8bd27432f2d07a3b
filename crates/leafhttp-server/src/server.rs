//! Top-level entry point: binding every endpoint a response tree declares,
//! serving it, and tearing it down gracefully when asked (§4.10, §5
//! Lifecycle, §6).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use leafhttp_kernel::{DispatchIndex, DynResponse, GroupAttributes};

use crate::connection;
use crate::error::{ServerError, ServerResult};
use crate::listener::Listener;
use crate::state::AppState;

/// Applied when a response declares no body plan override and the endpoint
/// sets no default of its own.
const DEFAULT_BODY_LIMIT: u64 = 10 * 1024 * 1024;

/// How long [`ServerHandle::stop`] (and a dropped handle) waits for
/// in-flight connections to finish before abandoning them.
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// A compiled response tree, ready to bind its declared endpoints and serve
/// requests.
pub struct Server {
    dispatch: Arc<DispatchIndex>,
    default_body_limit: u64,
    grace_period: Duration,
}

impl Server {
    /// Build a server from a resolved response tree — the return value of
    /// [`leafhttp_kernel::RootGroup::resolve`].
    pub fn new(
        resolved: (GroupAttributes, Vec<(GroupAttributes, Box<dyn DynResponse>)>),
    ) -> Self {
        Self {
            dispatch: Arc::new(DispatchIndex::compile(resolved)),
            default_body_limit: DEFAULT_BODY_LIMIT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Override the body-length ceiling applied when neither a response nor
    /// its cascaded attributes declare one.
    pub fn with_default_body_limit(mut self, limit: u64) -> Self {
        self.default_body_limit = limit;
        self
    }

    /// Override how long a stop request waits for in-flight connections to
    /// drain before the listener tasks are abandoned.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Bind every endpoint the tree declares and return a handle that keeps
    /// the server alive. Dropping the handle (or calling
    /// [`ServerHandle::stop`] explicitly) closes every listener and drains
    /// in-flight connections up to the configured grace period (§5
    /// Lifecycle).
    pub async fn start(self) -> ServerResult<ServerHandle> {
        let endpoints = self.dispatch.all_endpoints();
        if endpoints.is_empty() {
            return Err(ServerError::NoEndpoints);
        }

        let state = AppState::new(Arc::clone(&self.dispatch), self.default_body_limit);

        let mut listeners = Vec::with_capacity(endpoints.len());
        for (endpoint, config) in endpoints {
            listeners.push(Listener::bind(endpoint, config).await?);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut listener_tasks = Vec::with_capacity(listeners.len());
        for listener in listeners {
            listener_tasks.push(tokio::spawn(accept_loop(listener, state.clone(), shutdown_rx.clone())));
        }

        Ok(ServerHandle {
            shutdown: Some(shutdown_tx),
            listener_tasks,
            grace_period: self.grace_period,
        })
    }

    /// Bind every endpoint and serve until every listener's accept loop ends
    /// on its own — normally never, outside of a bind failure. Convenience
    /// for callers with no use for graceful shutdown; equivalent to
    /// `self.start().await?.wait().await`.
    pub async fn run(self) -> ServerResult<()> {
        let handle = self.start().await?;
        handle.wait().await;
        Ok(())
    }
}

/// A running server. Holds every listener's accept loop alive; dropping it
/// signals every listener to stop accepting new connections and waits up to
/// the configured grace period for in-flight connections to finish before
/// the listener tasks are abandoned (§5 Lifecycle).
pub struct ServerHandle {
    shutdown: Option<watch::Sender<bool>>,
    listener_tasks: Vec<JoinHandle<()>>,
    grace_period: Duration,
}

impl ServerHandle {
    /// Block until every listener's accept loop ends on its own — normally
    /// never, unless a listener errors out or something else calls
    /// [`stop`](Self::stop) on a clone of the underlying shutdown signal.
    pub async fn wait(mut self) {
        for task in std::mem::take(&mut self.listener_tasks) {
            let _ = task.await;
        }
    }

    /// Signal every listener to stop accepting connections, then wait up to
    /// the configured grace period for in-flight connections to drain.
    pub async fn stop(mut self) {
        self.signal_shutdown();
        drain(std::mem::take(&mut self.listener_tasks), self.grace_period).await;
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let Some(tx) = self.shutdown.take() else {
            return;
        };
        let _ = tx.send(true);
        let tasks = std::mem::take(&mut self.listener_tasks);
        let grace_period = self.grace_period;
        tokio::spawn(async move { drain(tasks, grace_period).await });
    }
}

async fn drain(tasks: Vec<JoinHandle<()>>, grace_period: Duration) {
    let joined = async {
        for task in tasks {
            let _ = task.await;
        }
    };
    if tokio::time::timeout(grace_period, joined).await.is_err() {
        tracing::warn!("grace period elapsed with connections still draining");
    }
}

async fn accept_loop(listener: Listener, state: AppState, mut shutdown: watch::Receiver<bool>) {
    let endpoint = Arc::new(listener.endpoint.clone());
    let scheme: &'static str = if listener.config.tls.is_some() {
        "https"
    } else {
        "http"
    };
    let connection_config = listener.config.connection;
    tracing::info!(
        address = %endpoint.address,
        port = endpoint.port,
        scheme,
        "listening"
    );

    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                tracing::info!(address = %endpoint.address, port = endpoint.port, "closing listener");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok(stream) => {
                        let endpoint = Arc::clone(&endpoint);
                        let state = state.clone();
                        connections.spawn(connection::serve(
                            stream,
                            endpoint,
                            state,
                            scheme,
                            connection_config,
                        ));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to accept connection");
                    }
                }
            }
        }
    }
    while connections.join_next().await.is_some() {}
}
