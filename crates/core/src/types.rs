//! Gemeinsame Typen fuer SoundMesh
//!
//! `ServerRole` beschreibt die Klasse eines Backend-Prozesses,
//! `BackendAddr` die Adresse unter der er erreichbar ist.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::SoundmeshError;

/// Rolle eines Backend-Servers
///
/// Auf dem Draht werden Rollen immer in Grossbuchstaben geschrieben.
/// Beim Parsen wird Gross-/Kleinschreibung ignoriert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerRole {
    Login,
    Streaming,
    Storage,
    Network,
}

impl ServerRole {
    /// Alle Rollen in Pool-Reihenfolge
    pub const ALLE: [ServerRole; 4] = [
        ServerRole::Login,
        ServerRole::Streaming,
        ServerRole::Storage,
        ServerRole::Network,
    ];

    /// Kanonischer Name auf dem Draht
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Streaming => "STREAMING",
            Self::Storage => "STORAGE",
            Self::Network => "NETWORK",
        }
    }

    /// LOGIN und STREAMING werden kapazitaetsbasiert verteilt,
    /// zaehlen Clients und loesen Skalierungssignale aus.
    pub fn ist_lastverteilt(&self) -> bool {
        matches!(self, Self::Login | Self::Streaming)
    }
}

impl std::fmt::Display for ServerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerRole {
    type Err = SoundmeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALLE
            .into_iter()
            .find(|rolle| rolle.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SoundmeshError::UnbekannteRolle(s.to_string()))
    }
}

/// Netzwerkadresse eines Backend-Servers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendAddr {
    pub ip: IpAddr,
    pub port: u16,
}

impl BackendAddr {
    pub fn neu(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl std::fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}
