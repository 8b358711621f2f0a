//! # Proxy Server
//!
//! TCP accept loop: binds the configured address, spawns a [`Session`] per
//! client, and drains sessions on graceful shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::ProxyConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::{PacketRegistry, PayloadCache};
use crate::service::gate::Gate;
use crate::service::session::{Session, SessionSet};

/// The accept loop and its shared machinery: the packet registry, the
/// payload cache with its reaper, and the live-session set.
pub struct ProxyServer {
    config: ProxyConfig,
    gate: Arc<dyn Gate>,
    registry: Arc<PacketRegistry>,
    cache: Arc<PayloadCache>,
    sessions: Arc<SessionSet>,
    next_session_id: AtomicU64,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig, gate: Arc<dyn Gate>) -> ProxyServer {
        let cache = Arc::new(PayloadCache::new(config.cache.threshold_bytes));
        ProxyServer {
            config,
            gate,
            registry: Arc::new(PacketRegistry::new()),
            cache,
            sessions: SessionSet::new(),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionSet> {
        &self.sessions
    }

    /// Run until CTRL+C, then drain.
    pub async fn run(&self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_with_shutdown(shutdown_rx).await
    }

    /// Run the accept loop with an external shutdown channel.
    #[instrument(skip_all, fields(bind = %self.config.server.bind_address))]
    pub async fn run_with_shutdown(&self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let listener = TcpListener::bind(&self.config.server.bind_address)
            .await
            .map_err(ProtocolError::Io)?;
        info!(
            upstream = %self.config.upstream.address,
            "listening for client connections"
        );

        let reaper_cancel = CancellationToken::new();
        let _reaper = self
            .cache
            .spawn_reaper(self.config.cache.reap_interval, reaper_cancel.clone());

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("shutting down, draining sessions");
                    reaper_cancel.cancel();
                    self.drain().await;
                    return Ok(());
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            if self.sessions.len() >= self.config.server.max_sessions {
                                warn!(%peer, "session limit reached, refusing connection");
                                drop(stream);
                                continue;
                            }
                            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                            info!(session_id = id, %peer, "client connected");
                            Session::spawn(
                                id,
                                stream,
                                &self.config,
                                Arc::clone(&self.gate),
                                Arc::clone(&self.registry),
                                Arc::clone(&self.cache),
                                Arc::clone(&self.sessions),
                            );
                        }
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                        }
                    }
                }
            }
        }
    }

    /// Wait for live sessions to finish within the shutdown timeout, then
    /// tear down whatever remains.
    async fn drain(&self) {
        let timeout = tokio::time::sleep(self.config.server.shutdown_timeout);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                _ = &mut timeout => {
                    warn!(
                        remaining = self.sessions.len(),
                        "shutdown timeout reached, closing remaining sessions"
                    );
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(250)) => {
                    if self.sessions.is_empty() {
                        info!("all sessions closed");
                        break;
                    }
                }
            }
        }

        self.sessions.kill_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::gate::AllowAll;

    #[tokio::test]
    async fn shutdown_with_no_sessions_returns_promptly() {
        let mut config = ProxyConfig::default();
        config.server.bind_address = "127.0.0.1:0".to_string();
        config.server.shutdown_timeout = Duration::from_millis(200);

        let server = Arc::new(ProxyServer::new(config, Arc::new(AllowAll)));
        let (tx, rx) = mpsc::channel(1);

        let handle = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run_with_shutdown(rx).await })
        };

        // Let the listener come up before signalling.
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bind_failure_surfaces_as_error() {
        let mut config = ProxyConfig::default();
        config.server.bind_address = "256.0.0.1:0".to_string();

        let server = ProxyServer::new(config, Arc::new(AllowAll));
        let (_tx, rx) = mpsc::channel(1);
        assert!(server.run_with_shutdown(rx).await.is_err());
    }
}
