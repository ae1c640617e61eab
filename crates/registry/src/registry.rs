//! Registry – Prozessweiter Zustand aller Backends
//!
//! Vier unabhaengige Pools (Login, Streaming, Storage, Network) und eine
//! FIFO-Queue fuer Skalierungssignale. Die Registry wird einmal vom
//! Prozess-Einstiegspunkt erstellt und als `Arc` an jede Verbindung
//! weitergegeben.
//!
//! ## Auswahlstrategie
//! - LOGIN / STREAMING: geringste Auslastung unter der Kapazitaet,
//!   Reservierung im selben Durchlauf. Ohne passendes Backend wird
//!   `SPAWN:<ROLLE>` eingereiht.
//! - STORAGE / NETWORK: gleichverteilte Zufallsauswahl, keine Reservierung.

use parking_lot::Mutex;
use soundmesh_core::{BackendAddr, ServerRole};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::pool::{Freigabe, ServerPool};
use crate::record::ServerRecord;

/// Standard-Kapazitaet pro Login-/Streaming-Backend
pub const STANDARD_KAPAZITAET: u32 = 2;

/// Konfiguration der Registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximale Clients pro Login-/Streaming-Backend
    pub kapazitaet: u32,
    /// Leases aelter als dieser Wert werden freigegeben (None = nie)
    pub lease_timeout: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            kapazitaet: STANDARD_KAPAZITAET,
            lease_timeout: None,
        }
    }
}

/// Aufforderung an den Network-Manager, ein Backend zu starten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnSignal {
    pub rolle: ServerRole,
}

impl SpawnSignal {
    pub fn neu(rolle: ServerRole) -> Self {
        Self { rolle }
    }
}

impl fmt::Display for SpawnSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SPAWN:{}", self.rolle)
    }
}

pub struct Registry {
    config: RegistryConfig,
    login: ServerPool,
    streaming: ServerPool,
    storage: ServerPool,
    network: ServerPool,
    signale: Mutex<VecDeque<SpawnSignal>>,
}

impl Registry {
    /// Erstellt eine neue leere Registry
    pub fn neu(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            login: ServerPool::neu(ServerRole::Login),
            streaming: ServerPool::neu(ServerRole::Streaming),
            storage: ServerPool::neu(ServerRole::Storage),
            network: ServerPool::neu(ServerRole::Network),
            signale: Mutex::new(VecDeque::new()),
        })
    }

    /// Der Pool einer Rolle
    pub fn pool(&self, rolle: ServerRole) -> &ServerPool {
        match rolle {
            ServerRole::Login => &self.login,
            ServerRole::Streaming => &self.streaming,
            ServerRole::Storage => &self.storage,
            ServerRole::Network => &self.network,
        }
    }

    /// Registriert ein Backend im Pool seiner Rolle
    pub fn server_hinzufuegen(&self, adresse: BackendAddr, rolle: ServerRole) {
        self.pool(rolle).hinzufuegen(adresse);
        tracing::info!(rolle = %rolle, adresse = %adresse, "Backend registriert");
    }

    /// Waehlt ein Backend der Rolle aus
    ///
    /// Fuer LOGIN/STREAMING wird ein Client-Platz reserviert; ohne freies
    /// Backend wird ein Skalierungssignal eingereiht und `None` geliefert.
    pub fn server_anfordern(&self, rolle: ServerRole) -> Option<ServerRecord> {
        let pool = self.pool(rolle);
        if !rolle.ist_lastverteilt() {
            return pool.zufaellig();
        }

        // Pool-Lock ist nach reservieren() wieder frei
        let gewaehlt = pool.reservieren(self.config.kapazitaet);
        match &gewaehlt {
            Some(record) => tracing::debug!(
                rolle = %rolle,
                adresse = %record.adresse,
                clients = record.clients(),
                "Backend reserviert"
            ),
            None => {
                tracing::warn!(rolle = %rolle, "Kein freies Backend, Skalierungssignal eingereiht");
                self.signal_einreihen(SpawnSignal::neu(rolle));
            }
        }
        gewaehlt
    }

    /// Verarbeitet die Meldung, dass ein Backend einen Client verloren hat
    ///
    /// Nur LOGIN/STREAMING zaehlen Clients. Fuer andere Rollen bleibt der
    /// Pool unveraendert.
    pub fn client_getrennt(&self, adresse: BackendAddr, rolle: ServerRole) -> Freigabe {
        if !rolle.ist_lastverteilt() {
            return Freigabe::Unbekannt;
        }

        let freigabe = self.pool(rolle).client_getrennt(&adresse);
        match freigabe {
            Freigabe::Entfernt => {
                tracing::info!(rolle = %rolle, adresse = %adresse, "Backend ohne Clients entfernt")
            }
            Freigabe::Freigegeben { verbleibend } => tracing::debug!(
                rolle = %rolle,
                adresse = %adresse,
                verbleibend,
                "Client freigegeben"
            ),
            Freigabe::OhneLease => tracing::warn!(
                rolle = %rolle,
                adresse = %adresse,
                "Drop-Meldung ohne offene Zuweisung, Backend bleibt registriert"
            ),
            Freigabe::Unbekannt => {
                tracing::debug!(rolle = %rolle, adresse = %adresse, "Drop-Meldung fuer unbekanntes Backend")
            }
        }
        freigabe
    }

    // -----------------------------------------------------------------------
    // Skalierungssignale
    // -----------------------------------------------------------------------

    fn signal_einreihen(&self, signal: SpawnSignal) {
        self.signale.lock().push_back(signal);
    }

    /// Entnimmt das aelteste ausstehende Signal
    pub fn signal_holen(&self) -> Option<SpawnSignal> {
        self.signale.lock().pop_front()
    }

    /// Stellt ein nicht zugestelltes Signal wieder an den Anfang der Queue
    pub fn signal_zurueckstellen(&self, signal: SpawnSignal) {
        self.signale.lock().push_front(signal);
    }

    pub fn ausstehende_signale(&self) -> usize {
        self.signale.lock().len()
    }

    // -----------------------------------------------------------------------
    // Lease-Ablauf
    // -----------------------------------------------------------------------

    /// Gibt alle Leases frei, die zum Zeitpunkt `jetzt` abgelaufen sind
    ///
    /// Ohne konfigurierten Timeout passiert nichts. Backends werden dabei
    /// nie entfernt. Pools werden nacheinander gesperrt.
    pub fn leases_ablaufen_lassen(&self, jetzt: Instant) -> usize {
        let Some(timeout) = self.config.lease_timeout else {
            return 0;
        };
        let Some(grenze) = jetzt.checked_sub(timeout) else {
            return 0;
        };

        let freigegeben: usize = ServerRole::ALLE
            .into_iter()
            .filter(ServerRole::ist_lastverteilt)
            .map(|rolle| self.pool(rolle).abgelaufene_freigeben(grenze))
            .sum();

        if freigegeben > 0 {
            tracing::info!(freigegeben, "Abgelaufene Leases freigegeben");
        }
        freigegeben
    }
}
