//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use soundmesh_registry::RegistryConfig;
use soundmesh_rendezvous::RendezvousConfig;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Standard-Port des Rendezvous-Servers
pub const STANDARD_PORT: u16 = 57313;

/// Woher die geladene Konfiguration stammt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigQuelle {
    Datei,
    /// Datei nicht gefunden, alle Werte sind Standardwerte
    Standardwerte,
}

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Registry und Load-Balancing
    pub registry: RegistryEinstellungen,
    /// Skalierungssignale an den Network-Manager
    pub signale: SignalEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse des TCP-Listeners
    pub bind_adresse: String,
    /// TCP-Port
    pub port: u16,
    /// Server beendet sich nach so vielen Sekunden ohne Verbindung
    /// (leer = nie)
    pub leerlauf_timeout_sek: Option<u64>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: STANDARD_PORT,
            leerlauf_timeout_sek: None,
        }
    }
}

/// Registry-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryEinstellungen {
    /// Maximale Clients pro Login-/Streaming-Backend
    pub kapazitaet: u32,
    /// Zuweisungen verfallen nach dieser Zeit (leer = nie)
    pub lease_timeout_ms: Option<u64>,
    /// Intervall der Pruefung auf abgelaufene Zuweisungen
    pub lease_pruef_intervall_ms: u64,
}

impl Default for RegistryEinstellungen {
    fn default() -> Self {
        Self {
            kapazitaet: 2,
            lease_timeout_ms: None,
            lease_pruef_intervall_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalEinstellungen {
    /// Obergrenze der zufaelligen Pause zwischen zwei Signal-Abfragen
    pub poll_max_ms: u64,
}

impl Default for SignalEinstellungen {
    fn default() -> Self {
        Self { poll_max_ms: 2000 }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder Filter-Direktive
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    ///
    /// Laeuft vor der Logging-Initialisierung, deshalb meldet die
    /// [`ConfigQuelle`] dem Aufrufer, ob Standardwerte verwendet werden.
    pub fn laden(pfad: &str) -> anyhow::Result<(Self, ConfigQuelle)> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.validieren()?;
                Ok((config, ConfigQuelle::Datei))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok((Self::default(), ConfigQuelle::Standardwerte))
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die TOML allein nicht ausschliesst
    pub fn validieren(&self) -> anyhow::Result<()> {
        if self.registry.kapazitaet == 0 {
            anyhow::bail!("registry.kapazitaet muss groesser als 0 sein");
        }
        if self.registry.lease_timeout_ms.is_some() && self.registry.lease_pruef_intervall_ms == 0 {
            anyhow::bail!("registry.lease_pruef_intervall_ms muss groesser als 0 sein");
        }
        self.bind_adresse()?;
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self.netzwerk.bind_adresse.parse().map_err(|e| {
            anyhow::anyhow!(
                "Ungueltige Bind-Adresse '{}': {e}",
                self.netzwerk.bind_adresse
            )
        })?;
        Ok(SocketAddr::new(ip, self.netzwerk.port))
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            kapazitaet: self.registry.kapazitaet,
            lease_timeout: self.registry.lease_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn rendezvous_config(&self) -> RendezvousConfig {
        RendezvousConfig {
            signal_poll_max: Duration::from_millis(self.signale.poll_max_ms),
            leerlauf_timeout: self.netzwerk.leerlauf_timeout_sek.map(Duration::from_secs),
        }
    }

    pub fn lease_pruef_intervall(&self) -> Duration {
        Duration::from_millis(self.registry.lease_pruef_intervall_ms)
    }
}
