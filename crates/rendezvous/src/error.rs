//! Fehlertypen fuer den Rendezvous-Server

use soundmesh_protocol::WireError;
use thiserror::Error;

/// Fehlertyp fuer eine Rendezvous-Verbindung
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Fehler beim Lesen oder Schreiben des Protokolls
    #[error("Protokollfehler: {0}")]
    Wire(#[from] WireError),

    /// Peer hat die Verbindung ohne DISCONNECT geschlossen
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,
}

/// Result-Typ fuer den Rendezvous-Server
pub type RendezvousResult<T> = Result<T, RendezvousError>;
