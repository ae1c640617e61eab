//! Adressdatei des Rendezvous-Servers
//!
//! Backends und der Network-Manager finden den Server ueber eine kleine
//! Textdatei:
//!
//! ```text
//! IP : 10.0.0.10
//! PORT : 57313
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use crate::error::{ClientError, ClientResult};

/// Adresse des Rendezvous-Servers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl RegistryAddress {
    /// Liest die Adresse aus einer Datei
    pub fn aus_datei(pfad: impl AsRef<Path>) -> ClientResult<Self> {
        let pfad = pfad.as_ref();
        let inhalt = std::fs::read_to_string(pfad).map_err(|e| {
            ClientError::Adressdatei(format!("'{}' nicht lesbar: {e}", pfad.display()))
        })?;
        Self::parsen(&inhalt)
    }

    /// Parst den Inhalt einer Adressdatei
    ///
    /// Unbekannte Zeilen werden mit einer Warnung uebersprungen.
    pub fn parsen(inhalt: &str) -> ClientResult<Self> {
        let mut ip = None;
        let mut port = None;

        for zeile in inhalt.lines().map(str::trim).filter(|z| !z.is_empty()) {
            let Some((schluessel, wert)) = zeile.split_once(':') else {
                tracing::warn!(zeile, "Zeile ohne ':' in Adressdatei ignoriert");
                continue;
            };
            let wert = wert.trim();
            match schluessel.trim() {
                "IP" => {
                    let adresse = wert.parse::<IpAddr>().map_err(|e| {
                        ClientError::Adressdatei(format!("ungueltige IP '{wert}': {e}"))
                    })?;
                    ip = Some(adresse);
                }
                "PORT" => {
                    let nummer = wert.parse::<u16>().map_err(|e| {
                        ClientError::Adressdatei(format!("ungueltiger Port '{wert}': {e}"))
                    })?;
                    port = Some(nummer);
                }
                andere => tracing::warn!(schluessel = andere, "Unbekannter Schluessel in Adressdatei"),
            }
        }

        Ok(Self {
            ip: ip.ok_or_else(|| ClientError::Adressdatei("IP fehlt".into()))?,
            port: port.ok_or_else(|| ClientError::Adressdatei("PORT fehlt".into()))?,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}
