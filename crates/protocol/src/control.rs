//! Control-Protokoll
//!
//! Definiert den Rollen-Handshake, alle Befehle und alle Antworten des
//! Rendezvous-Protokolls. Die `Display`-Implementierungen erzeugen exakt
//! den Text, der auf dem Draht steht.

use soundmesh_core::{BackendAddr, ServerRole};
use std::fmt;

/// Trennzeichen zwischen Befehl und Argumenten
pub const TRENNZEICHEN: char = ':';

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Rolle, die ein Peer beim Verbindungsaufbau ankuendigt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRolle {
    /// Backend-Prozess (Login, Streaming, Storage, Network-Manager)
    Server,
    /// Endbenutzer-Client
    Client,
}

impl PeerRolle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "SERVER",
            Self::Client => "CLIENT",
        }
    }
}

impl fmt::Display for PeerRolle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Befehle
// ---------------------------------------------------------------------------

/// Ein vollstaendig gelesener Befehl
///
/// Rollen-Argumente bleiben Text, damit unbekannte Rollen mit einer
/// passenden Fehlermeldung beantwortet werden koennen. Bekannte Rollen
/// sind bereits auf Grossbuchstaben normalisiert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `SERVERTYPE:<ROLLE>:<PORT>` – Backend registriert sich
    ServerType { rolle: String, port: u16 },
    /// `GETSERVER:<ROLLE>` – Backend-Adresse anfordern
    GetServer { rolle: String },
    /// `DROPPED:<ROLLE>:<PORT>` – Backend hat einen Client verloren
    Dropped { rolle: String, port: u16 },
    /// `HEARTBEAT`
    Heartbeat,
    /// `DISCONNECT`
    Disconnect,
    /// Nicht erkannter oder fehlerhafter Befehl samt verworfenem Text
    Unsupported(String),
}

impl Request {
    /// Befehlsname fuer Logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::ServerType { .. } => "SERVERTYPE",
            Self::GetServer { .. } => "GETSERVER",
            Self::Dropped { .. } => "DROPPED",
            Self::Heartbeat => "HEARTBEAT",
            Self::Disconnect => "DISCONNECT",
            Self::Unsupported(_) => "UNSUPPORTED",
        }
    }

    pub fn server_type(rolle: ServerRole, port: u16) -> Self {
        Self::ServerType {
            rolle: rolle.as_str().to_string(),
            port,
        }
    }

    pub fn get_server(rolle: ServerRole) -> Self {
        Self::GetServer {
            rolle: rolle.as_str().to_string(),
        }
    }

    pub fn dropped(rolle: ServerRole, port: u16) -> Self {
        Self::Dropped {
            rolle: rolle.as_str().to_string(),
            port,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerType { rolle, port } => write!(f, "SERVERTYPE:{rolle}:{port}"),
            Self::GetServer { rolle } => write!(f, "GETSERVER:{rolle}"),
            Self::Dropped { rolle, port } => write!(f, "DROPPED:{rolle}:{port}"),
            Self::Heartbeat => f.write_str("HEARTBEAT"),
            Self::Disconnect => f.write_str("DISCONNECT"),
            Self::Unsupported(text) => f.write_str(text),
        }
    }
}

// ---------------------------------------------------------------------------
// Antworten
// ---------------------------------------------------------------------------

/// Antworten und Push-Nachrichten des Registry-Servers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Registrierung gespeichert
    TypeStored,
    /// Drop-Meldung verarbeitet
    Dropped,
    /// Verbindung wird beendet
    Disconnect,
    Heartbeat,
    MessageUnsupported,
    /// `IP:<ip>:PORT:<port>`
    Adresse(BackendAddr),
    /// `ERROR:<grund>`
    Fehler(String),
    /// `SPAWN:<ROLLE>` – Skalierungssignal an den Network-Manager
    Spawn(ServerRole),
}

impl Reply {
    pub fn kein_storage_server() -> Self {
        Self::Fehler("No storage server exists.".into())
    }

    pub fn kein_server(rolle: ServerRole) -> Self {
        Self::Fehler(format!("No server of type '{rolle}' exists."))
    }

    pub fn falscher_server_typ() -> Self {
        Self::Fehler("Incorrect server type.".into())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeStored => f.write_str("TYPESTORED"),
            Self::Dropped => f.write_str("DROPPED"),
            Self::Disconnect => f.write_str("DISCONNECT"),
            Self::Heartbeat => f.write_str("HEARTBEAT"),
            Self::MessageUnsupported => f.write_str("MESSAGEUNSUPPORTED"),
            Self::Adresse(adresse) => write!(f, "IP:{}:PORT:{}", adresse.ip, adresse.port),
            Self::Fehler(grund) => write!(f, "ERROR:{grund}"),
            Self::Spawn(rolle) => write!(f, "SPAWN:{rolle}"),
        }
    }
}
