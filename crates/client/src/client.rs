//! RegistryClient – Verbindung zum Rendezvous-Server
//!
//! Sendet beim Verbinden den Rollen-Handshake und bietet danach je eine
//! Methode pro Befehl. Antworten werden vom `ReplyCodec` getrennt, auch
//! wenn mehrere in einem Lesevorgang ankommen.

use futures_util::{SinkExt, StreamExt};
use soundmesh_core::{BackendAddr, ServerRole};
use soundmesh_protocol::{PeerRolle, Reply, ReplyCodec, Request, WireError, RUHEPAUSE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::error::{ClientError, ClientResult};

/// Standard-Timeout fuer eine Antwort
pub const STANDARD_ANTWORT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RegistryClient {
    leitung: Framed<TcpStream, ReplyCodec>,
    rolle: PeerRolle,
    antwort_timeout: Duration,
}

impl RegistryClient {
    /// Verbindet sich und sendet den Handshake
    pub async fn verbinden(adresse: SocketAddr, rolle: PeerRolle) -> ClientResult<Self> {
        let stream = TcpStream::connect(adresse).await?;
        stream.set_nodelay(true)?;

        let mut leitung = Framed::new(stream, ReplyCodec::new());
        leitung.send(rolle).await?;
        tracing::debug!(adresse = %adresse, rolle = %rolle, "Mit Rendezvous-Server verbunden");

        Ok(Self {
            leitung,
            rolle,
            antwort_timeout: STANDARD_ANTWORT_TIMEOUT,
        })
    }

    /// Setzt den Timeout fuer Antworten
    pub fn mit_timeout(mut self, antwort_timeout: Duration) -> Self {
        self.antwort_timeout = antwort_timeout;
        self
    }

    pub fn rolle(&self) -> PeerRolle {
        self.rolle
    }

    /// Registriert dieses Backend unter `rolle` mit seinem Port
    ///
    /// Nach einer Registrierung als `NETWORK` liefert die Verbindung nur
    /// noch Signale ueber [`Self::naechstes_signal`].
    pub async fn registrieren(&mut self, rolle: ServerRole, port: u16) -> ClientResult<()> {
        match self.anfrage(Request::server_type(rolle, port)).await? {
            Reply::TypeStored => Ok(()),
            andere => Err(unerwartet(andere)),
        }
    }

    /// Fordert die Adresse eines Backends der Rolle an
    pub async fn server_anfordern(&mut self, rolle: ServerRole) -> ClientResult<BackendAddr> {
        match self.anfrage(Request::get_server(rolle)).await? {
            Reply::Adresse(adresse) => Ok(adresse),
            andere => Err(unerwartet(andere)),
        }
    }

    /// Meldet, dass das Backend auf `port` einen Client verloren hat
    pub async fn client_getrennt(&mut self, rolle: ServerRole, port: u16) -> ClientResult<()> {
        match self.anfrage(Request::dropped(rolle, port)).await? {
            Reply::Dropped => Ok(()),
            andere => Err(unerwartet(andere)),
        }
    }

    pub async fn heartbeat(&mut self) -> ClientResult<()> {
        match self.anfrage(Request::Heartbeat).await? {
            Reply::Heartbeat => Ok(()),
            andere => Err(unerwartet(andere)),
        }
    }

    /// Beendet die Sitzung mit `DISCONNECT`
    pub async fn trennen(mut self) -> ClientResult<()> {
        match self.anfrage(Request::Disconnect).await? {
            Reply::Disconnect => {
                tracing::debug!("Vom Rendezvous-Server getrennt");
                Ok(())
            }
            andere => Err(unerwartet(andere)),
        }
    }

    /// Wartet auf das naechste Skalierungssignal (nur Network-Manager)
    pub async fn naechstes_signal(&mut self) -> ClientResult<ServerRole> {
        match self.antwort_lesen().await? {
            Reply::Spawn(rolle) => Ok(rolle),
            andere => Err(unerwartet(andere)),
        }
    }

    async fn anfrage(&mut self, request: Request) -> ClientResult<Reply> {
        tracing::trace!(befehl = request.name(), "Sende Befehl");
        self.leitung.send(request).await?;
        tokio::time::timeout(self.antwort_timeout, self.antwort_lesen())
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    async fn antwort_lesen(&mut self) -> ClientResult<Reply> {
        match self.naechste_antwort().await {
            Some(Ok(Reply::Fehler(grund))) => Err(ClientError::Abgelehnt(grund)),
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::VerbindungGetrennt),
        }
    }

    /// Liest die naechste Antwort
    ///
    /// Adress- und Fehlerantworten enden mit einem offenen Argument. Sie
    /// werden abgeschlossen, sobald der Server fuer eine [`RUHEPAUSE`]
    /// nichts mehr schreibt.
    async fn naechste_antwort(&mut self) -> Option<Result<Reply, WireError>> {
        let mut zuletzt_gesehen = self.leitung.read_buffer().len();
        loop {
            tokio::select! {
                antwort = self.leitung.next() => return antwort,
                _ = tokio::time::sleep(RUHEPAUSE) => {
                    let laenge = self.leitung.read_buffer().len();
                    if laenge == 0 || laenge != zuletzt_gesehen {
                        zuletzt_gesehen = laenge;
                        continue;
                    }
                    let mut puffer = std::mem::take(self.leitung.read_buffer_mut());
                    let ergebnis = self.leitung.codec_mut().ausstehend_abschliessen(&mut puffer);
                    *self.leitung.read_buffer_mut() = puffer;
                    match ergebnis {
                        Ok(None) => zuletzt_gesehen = self.leitung.read_buffer().len(),
                        abgeschlossen => return abgeschlossen.transpose(),
                    }
                },
            }
        }
    }
}

fn unerwartet(reply: Reply) -> ClientError {
    tracing::warn!(antwort = %reply, "Unerwartete Antwort vom Rendezvous-Server");
    ClientError::UnerwarteteAntwort(reply)
}
