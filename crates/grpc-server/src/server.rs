//! Server lifecycle: bind, serve, drain, stop
//!
//! Shutdown is two-phase. A shutdown request stops accepting new calls
//! and lets in-flight calls drain; calls still running when the grace
//! period elapses are aborted. A second shutdown request during the
//! drain is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{info, warn};

use crate::proto::mt5_bridge_server::Mt5BridgeServer;
use crate::service::Mt5BridgeService;

pub struct BridgeServerConfig {
    pub host: String,
    pub port: u16,
    /// How long in-flight calls may keep running after a shutdown
    /// request.
    pub grace_period: Duration,
    pub keep_alive_interval: Duration,
    pub keep_alive_timeout: Duration,
}

impl Default for BridgeServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            grace_period: Duration::from_secs(5),
            keep_alive_interval: Duration::from_secs(60),
            keep_alive_timeout: Duration::from_secs(20),
        }
    }
}

pub struct BridgeServer {
    config: BridgeServerConfig,
    service: Mt5BridgeService,
}

impl BridgeServer {
    pub fn new(config: BridgeServerConfig, service: Mt5BridgeService) -> Self {
        Self { config, service }
    }

    pub fn address(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid listen address {}:{}",
                    self.config.host, self.config.port
                )
            })
    }

    /// Serve until `shutdown` fires, then drain within the grace period.
    pub async fn start_with_shutdown(
        self,
        shutdown: oneshot::Receiver<()>,
    ) -> anyhow::Result<()> {
        let addr = self.address()?;
        info!("bridge listening on {addr}");

        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let router = Server::builder()
            .http2_keepalive_interval(Some(self.config.keep_alive_interval))
            .http2_keepalive_timeout(Some(self.config.keep_alive_timeout))
            .add_service(Mt5BridgeServer::new(self.service));

        let mut serve = tokio::spawn(router.serve_with_shutdown(addr, async {
            let _ = drain_rx.await;
        }));

        tokio::select! {
            res = &mut serve => {
                // Transport fault before any shutdown was requested.
                res.context("server task panicked")??;
                return Ok(());
            }
            _ = shutdown => {
                info!("shutdown requested, draining in-flight calls");
                let _ = drain_tx.send(());
            }
        }

        let grace = self.config.grace_period;
        match tokio::time::timeout(grace, &mut serve).await {
            Ok(res) => {
                res.context("server task panicked")??;
                info!("server stopped cleanly");
            }
            Err(_) => {
                warn!("calls still running after {grace:?}, aborting");
                serve.abort();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mt5_bridge_core::testing::MockModule;
    use mt5_bridge_core::ModuleLoader;

    use super::*;

    fn test_server(config: BridgeServerConfig) -> BridgeServer {
        let loader = ModuleLoader::preloaded(Arc::new(MockModule::default()));
        BridgeServer::new(config, Mt5BridgeService::new(loader))
    }

    #[test]
    fn defaults_match_the_documented_endpoint() {
        let config = BridgeServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8001);
        assert_eq!(config.grace_period, Duration::from_secs(5));
    }

    #[test]
    fn address_is_host_and_port() {
        let server = test_server(BridgeServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9100,
            ..Default::default()
        });
        assert_eq!(server.address().unwrap().to_string(), "127.0.0.1:9100");
    }

    #[test]
    fn bad_host_is_reported() {
        let server = test_server(BridgeServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        });
        assert!(server.address().is_err());
    }

    #[tokio::test]
    async fn shutdown_signal_stops_the_server() {
        let server = test_server(BridgeServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            grace_period: Duration::from_secs(1),
            ..Default::default()
        });

        let (tx, rx) = oneshot::channel();
        // Already-sent shutdown: the server must drain and stop on its
        // own, well within the test timeout.
        tx.send(()).unwrap();
        server.start_with_shutdown(rx).await.unwrap();
    }
}
