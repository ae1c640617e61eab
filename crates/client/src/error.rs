//! Fehlertypen fuer den Registry-Client

use soundmesh_protocol::{Reply, WireError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protokollfehler: {0}")]
    Wire(#[from] WireError),

    /// Server hat die Verbindung geschlossen
    #[error("Verbindung vom Server getrennt")]
    VerbindungGetrennt,

    /// Server hat mit `ERROR:<grund>` geantwortet
    #[error("Vom Server abgelehnt: {0}")]
    Abgelehnt(String),

    #[error("Unerwartete Antwort: {0}")]
    UnerwarteteAntwort(Reply),

    #[error("Keine Antwort innerhalb des Timeouts")]
    Timeout,

    /// Adressdatei fehlt, ist unvollstaendig oder fehlerhaft
    #[error("Ungueltige Adressdatei: {0}")]
    Adressdatei(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
