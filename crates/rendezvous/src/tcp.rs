//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RendezvousServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `Connection`.
//! Alle Tasks teilen sich dieselbe `Registry`.
//!
//! ## Leerlauf
//! Mit `leerlauf_timeout` beendet sich die Accept-Loop, wenn fuer diese
//! Dauer keine Verbindung aktiv war.

use soundmesh_registry::Registry;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::connection::{shutdown_abwarten, Connection};

/// Standard-Maximum der Pause zwischen zwei Signal-Abfragen
pub const STANDARD_SIGNAL_POLL_MAX: Duration = Duration::from_millis(2000);

/// Konfiguration des Rendezvous-Servers
#[derive(Debug, Clone)]
pub struct RendezvousConfig {
    /// Obergrenze der zufaelligen Pause in der Network-Schleife
    pub signal_poll_max: Duration,
    /// Accept-Loop endet nach dieser Dauer ohne aktive Verbindung
    pub leerlauf_timeout: Option<Duration>,
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self {
            signal_poll_max: STANDARD_SIGNAL_POLL_MAX,
            leerlauf_timeout: None,
        }
    }
}

/// Zaehlt aktive Verbindungen, zaehlt beim Drop herunter
struct AktivGuard(Arc<AtomicUsize>);

impl AktivGuard {
    fn neu(zaehler: &Arc<AtomicUsize>) -> Self {
        zaehler.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(zaehler))
    }
}

impl Drop for AktivGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// TCP-Rendezvous-Server
pub struct RendezvousServer {
    listener: TcpListener,
    registry: Arc<Registry>,
    config: RendezvousConfig,
    aktive: Arc<AtomicUsize>,
}

impl RendezvousServer {
    /// Bindet den TCP-Socket
    ///
    /// Port 0 waehlt einen freien Port, siehe [`Self::lokale_adresse`].
    pub async fn binden(
        bind_addr: SocketAddr,
        registry: Arc<Registry>,
        config: RendezvousConfig,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self {
            listener,
            registry,
            config,
            aktive: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Tatsaechlich gebundene Adresse
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Startet die Accept-Loop
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt oder der
    /// Leerlauf-Timeout ablaeuft. Das Shutdown-Signal erreicht auch alle
    /// laufenden Verbindungen.
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "Rendezvous-Server gestartet");

        let leerlauf_timeout = self.config.leerlauf_timeout;
        let mut pruef_takt = tokio::time::interval(pruef_intervall(leerlauf_timeout));
        let mut leer_seit = Some(Instant::now());

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            leer_seit = None;

                            let guard = AktivGuard::neu(&self.aktive);
                            let verbindung = Connection::neu(
                                Arc::clone(&self.registry),
                                peer_addr,
                                self.config.signal_poll_max,
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                                drop(guard);
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                // Leerlauf pruefen
                _ = pruef_takt.tick(), if leerlauf_timeout.is_some() => {
                    if self.aktive.load(Ordering::Acquire) > 0 {
                        leer_seit = None;
                    } else {
                        let seit = *leer_seit.get_or_insert_with(Instant::now);
                        if leerlauf_timeout.is_some_and(|timeout| seit.elapsed() >= timeout) {
                            tracing::info!("Leerlauf-Timeout erreicht, keine aktiven Verbindungen");
                            break;
                        }
                    }
                }

                // Shutdown-Signal
                _ = shutdown_abwarten(&mut shutdown_rx) => {
                    tracing::info!("Rendezvous-Server: Shutdown-Signal empfangen");
                    break;
                }
            }
        }

        tracing::info!("Rendezvous-Server gestoppt");
        Ok(())
    }
}

/// Pruefintervall fuer den Leerlauf, ein Viertel des Timeouts
fn pruef_intervall(leerlauf_timeout: Option<Duration>) -> Duration {
    leerlauf_timeout
        .map(|timeout| timeout / 4)
        .unwrap_or(Duration::from_secs(1))
        .clamp(Duration::from_millis(10), Duration::from_secs(1))
}
