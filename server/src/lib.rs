//! soundmesh-server – Bibliotheks-Root
//!
//! Verdrahtet Registry, Lease-Pruefung und Rendezvous-Server und stellt den
//! oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use soundmesh_registry::Registry;
use soundmesh_rendezvous::RendezvousServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Haelt den Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    registry: Arc<Registry>,
}

impl Server {
    /// Erstellt einen neuen Server samt leerer Registry
    pub fn neu(config: ServerConfig) -> Result<Self> {
        config.validieren()?;
        let registry = Registry::neu(config.registry_config());
        Ok(Self { config, registry })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Startet den Server und laeuft bis Ctrl-C oder Leerlauf-Timeout
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht registriert werden"),
            }
        });

        self.binden().await?.laufen(shutdown_rx).await
    }

    /// Bindet den TCP-Listener
    pub async fn binden(self) -> Result<GebundenerServer> {
        let bind_addr = self.config.bind_adresse()?;
        let rendezvous = RendezvousServer::binden(
            bind_addr,
            Arc::clone(&self.registry),
            self.config.rendezvous_config(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("TCP-Listener auf {bind_addr} nicht bindbar: {e}"))?;

        Ok(GebundenerServer {
            config: self.config,
            registry: self.registry,
            rendezvous,
        })
    }
}

/// Server mit gebundenem Listener, bereit zum Start
pub struct GebundenerServer {
    config: ServerConfig,
    registry: Arc<Registry>,
    rendezvous: RendezvousServer,
}

impl GebundenerServer {
    pub fn lokale_adresse(&self) -> Result<SocketAddr> {
        Ok(self.rendezvous.lokale_adresse()?)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt oder der
    /// Leerlauf-Timeout ablaeuft
    pub async fn laufen(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            adresse = %self.lokale_adresse()?,
            kapazitaet = self.config.registry.kapazitaet,
            lease_timeout_ms = ?self.config.registry.lease_timeout_ms,
            "Server startet"
        );

        let lease_pruefung = self.config.registry.lease_timeout_ms.map(|_| {
            lease_pruefung_starten(
                Arc::clone(&self.registry),
                self.config.lease_pruef_intervall(),
            )
        });

        let ergebnis = self.rendezvous.starten(shutdown_rx).await;

        if let Some(task) = lease_pruefung {
            task.abort();
        }
        ergebnis?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Gibt in festen Abstaenden abgelaufene Zuweisungen frei
fn lease_pruefung_starten(registry: Arc<Registry>, intervall: Duration) -> JoinHandle<()> {
    tracing::debug!(intervall_ms = intervall.as_millis() as u64, "Lease-Pruefung gestartet");
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(intervall);
        takt.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            takt.tick().await;
            registry.leases_ablaufen_lassen(std::time::Instant::now());
        }
    })
}
