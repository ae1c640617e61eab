//! Connection – Verwaltet eine einzelne Rendezvous-Verbindung
//!
//! Jede angenommene TCP-Verbindung bekommt eine `Connection` in einem
//! eigenen tokio-Task. Nach dem Rollen-Handshake laeuft die Befehlsschleife
//! der ausgehandelten Rolle gegen die gemeinsame `Registry`.
//!
//! ## State Machine
//! ```text
//! Verbunden --(DISCONNECT)--> Trennend
//! ```
//! IO-Fehler im Zustand `Verbunden` sind ein unerwarteter Abbruch und werden
//! als Fehler geloggt. Nach `DISCONNECT` sind sie erwartet und werden nur
//! auf Debug-Level protokolliert.
//!
//! ## Network-Schleife
//! Ein Backend, das sich als `NETWORK` registriert, ist der
//! Network-Manager. Die Verbindung sendet ab dann nur noch
//! Skalierungssignale: zufaellige Pause in `[0, signal_poll_max)`, dann
//! hoechstens ein Signal aus der Queue.

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use soundmesh_core::{BackendAddr, ServerRole};
use soundmesh_protocol::{
    Eingang, PeerRolle, Reply, RendezvousCodec, Request, WireError, RUHEPAUSE,
};
use soundmesh_registry::Registry;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{RendezvousError, RendezvousResult};

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand der TCP-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Verbunden, Befehle werden verarbeitet
    Verbunden,
    /// `DISCONNECT` empfangen, Verbindung wird geschlossen
    Trennend,
}

/// Was nach einer Antwort mit der Verbindung passiert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uebergang {
    /// Naechsten Befehl lesen
    Bleiben,
    /// In den Push-Modus fuer Skalierungssignale wechseln
    NetzwerkSchleife,
    /// Verbindung nach der Antwort schliessen
    Trennen,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

pub struct Connection {
    id: Uuid,
    registry: Arc<Registry>,
    peer_addr: SocketAddr,
    signal_poll_max: Duration,
    zustand: VerbindungsZustand,
}

impl Connection {
    /// Erstellt eine neue Connection
    pub fn neu(registry: Arc<Registry>, peer_addr: SocketAddr, signal_poll_max: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry,
            peer_addr,
            signal_poll_max,
            zustand: VerbindungsZustand::Verbunden,
        }
    }

    /// IP des Peers, IPv4-mapped Adressen werden zu IPv4
    fn peer_ip(&self) -> IpAddr {
        self.peer_addr.ip().to_canonical()
    }

    /// Startet die Verarbeitung der Verbindung
    ///
    /// Laeuft bis der Peer trennt, `DISCONNECT` sendet oder `shutdown_rx`
    /// ein `true`-Signal empfaengt. Fehler werden hier geloggt und nicht
    /// weitergegeben.
    pub async fn verarbeiten<S>(mut self, stream: S, shutdown_rx: watch::Receiver<bool>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let span = tracing::info_span!(
            "verbindung",
            id = %self.id,
            peer = %self.peer_addr,
            rolle = tracing::field::Empty,
        );

        async move {
            tracing::debug!("Neue Verbindung");
            let ergebnis = self.ablauf(stream, shutdown_rx).await;
            match (ergebnis, self.zustand) {
                (Ok(()), _) => tracing::debug!("Verbindung beendet"),
                (Err(e), VerbindungsZustand::Trennend) => {
                    tracing::debug!(fehler = %e, "Fehler nach DISCONNECT ignoriert")
                }
                (Err(RendezvousError::VerbindungGetrennt), VerbindungsZustand::Verbunden) => {
                    tracing::warn!("Peer hat die Verbindung ohne DISCONNECT getrennt")
                }
                (Err(e), VerbindungsZustand::Verbunden) => {
                    tracing::error!(fehler = %e, "Unerwarteter Verbindungsabbruch")
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn ablauf<S>(
        &mut self,
        stream: S,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> RendezvousResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut leitung = Framed::new(stream, RendezvousCodec::new());

        let rolle = tokio::select! {
            eingang = leitung.next() => match eingang {
                Some(Ok(Eingang::Rolle(rolle))) => rolle,
                Some(Err(WireError::UnbekannteRolle(text))) => {
                    tracing::warn!(text = %text, "Unbekannte Rolle im Handshake, Verbindung verworfen");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Eingang::Befehl(_))) | None => {
                    tracing::debug!("Verbindung vor dem Handshake geschlossen");
                    return Ok(());
                }
            },
            _ = shutdown_abwarten(&mut shutdown_rx) => return Ok(()),
        };

        tracing::Span::current().record("rolle", rolle.as_str());
        tracing::debug!("Handshake abgeschlossen");

        self.befehls_schleife(rolle, &mut leitung, &mut shutdown_rx)
            .await
    }

    async fn befehls_schleife<S>(
        &mut self,
        rolle: PeerRolle,
        leitung: &mut Framed<S, RendezvousCodec>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> RendezvousResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let Some(request) = naechster_befehl(leitung, shutdown_rx).await? else {
                tracing::debug!("Shutdown, Verbindung wird geschlossen");
                return Ok(());
            };

            tracing::trace!(befehl = request.name(), "Befehl empfangen");
            let (antwort, uebergang) = match rolle {
                PeerRolle::Server => self.server_befehl(request),
                PeerRolle::Client => self.client_befehl(request),
            };

            if uebergang == Uebergang::Trennen {
                self.zustand = VerbindungsZustand::Trennend;
            }
            leitung.send(antwort).await?;

            match uebergang {
                Uebergang::Bleiben => {}
                Uebergang::Trennen => {
                    SinkExt::<Reply>::close(leitung).await?;
                    tracing::debug!("Verbindung nach DISCONNECT geschlossen");
                    return Ok(());
                }
                Uebergang::NetzwerkSchleife => {
                    return self.netzwerk_schleife(leitung, shutdown_rx).await;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Befehle
    // -----------------------------------------------------------------------

    /// Verarbeitet einen Befehl auf einer Server-Verbindung
    pub fn server_befehl(&self, request: Request) -> (Reply, Uebergang) {
        match request {
            Request::ServerType { rolle: name, port } => {
                let Some(rolle) = rolle_lesen(&name) else {
                    return (Reply::falscher_server_typ(), Uebergang::Bleiben);
                };
                self.registry
                    .server_hinzufuegen(BackendAddr::neu(self.peer_ip(), port), rolle);

                let uebergang = if rolle == ServerRole::Network {
                    Uebergang::NetzwerkSchleife
                } else {
                    Uebergang::Bleiben
                };
                (Reply::TypeStored, uebergang)
            }
            Request::GetServer { rolle: name } => {
                let antwort = match rolle_lesen(&name) {
                    Some(ServerRole::Storage) => self
                        .registry
                        .server_anfordern(ServerRole::Storage)
                        .map(|record| Reply::Adresse(record.adresse))
                        .unwrap_or_else(Reply::kein_storage_server),
                    _ => Reply::falscher_server_typ(),
                };
                (antwort, Uebergang::Bleiben)
            }
            Request::Dropped { rolle: name, port } => {
                let Some(rolle) = rolle_lesen(&name) else {
                    return (Reply::falscher_server_typ(), Uebergang::Bleiben);
                };
                self.registry
                    .client_getrennt(BackendAddr::neu(self.peer_ip(), port), rolle);
                (Reply::Dropped, Uebergang::Bleiben)
            }
            Request::Disconnect => (Reply::Disconnect, Uebergang::Trennen),
            andere => nicht_unterstuetzt(andere),
        }
    }

    /// Verarbeitet einen Befehl auf einer Client-Verbindung
    pub fn client_befehl(&self, request: Request) -> (Reply, Uebergang) {
        match request {
            Request::GetServer { rolle: name } => {
                let antwort = match rolle_lesen(&name) {
                    Some(rolle) if rolle.ist_lastverteilt() => self
                        .registry
                        .server_anfordern(rolle)
                        .map(|record| Reply::Adresse(record.adresse))
                        .unwrap_or_else(|| Reply::kein_server(rolle)),
                    _ => Reply::falscher_server_typ(),
                };
                (antwort, Uebergang::Bleiben)
            }
            Request::Heartbeat => (Reply::Heartbeat, Uebergang::Bleiben),
            Request::Disconnect => (Reply::Disconnect, Uebergang::Trennen),
            andere => nicht_unterstuetzt(andere),
        }
    }

    // -----------------------------------------------------------------------
    // Network-Schleife
    // -----------------------------------------------------------------------

    async fn netzwerk_schleife<S>(
        &self,
        leitung: &mut Framed<S, RendezvousCodec>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> RendezvousResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tracing::info!("Network-Manager verbunden");

        loop {
            let frist = Instant::now() + zufaellige_pause(self.signal_poll_max);

            // Eingehende Bytes werden gelesen und verworfen, damit ein
            // geschlossener Peer bemerkt wird
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(frist) => break,
                    eingang = leitung.next() => match eingang {
                        Some(Ok(eingang)) => {
                            tracing::trace!(?eingang, "Eingang im Network-Modus ignoriert")
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(RendezvousError::VerbindungGetrennt),
                    },
                    _ = shutdown_abwarten(shutdown_rx) => return Ok(()),
                }
            }

            let Some(signal) = self.registry.signal_holen() else {
                continue;
            };
            if let Err(e) = leitung.send(Reply::Spawn(signal.rolle)).await {
                self.registry.signal_zurueckstellen(signal);
                tracing::warn!(signal = %signal, "Signal nicht zugestellt, zurueck in die Queue");
                return Err(e.into());
            }
            tracing::info!(signal = %signal, "Skalierungssignal zugestellt");
        }
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

/// Liest den naechsten Befehl; `None` bei Shutdown
///
/// Steht ein Befehl mit offenem Argument im Puffer und schreibt der Peer
/// fuer eine [`RUHEPAUSE`] nichts mehr, wird das Argument abgeschlossen.
async fn naechster_befehl<S>(
    leitung: &mut Framed<S, RendezvousCodec>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> RendezvousResult<Option<Request>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut zuletzt_gesehen = leitung.read_buffer().len();
    loop {
        tokio::select! {
            eingang = leitung.next() => match eingang {
                Some(Ok(Eingang::Befehl(request))) => return Ok(Some(request)),
                Some(Ok(Eingang::Rolle(_))) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(RendezvousError::VerbindungGetrennt),
            },
            _ = tokio::time::sleep(RUHEPAUSE) => {
                let laenge = leitung.read_buffer().len();
                if laenge == 0 || laenge != zuletzt_gesehen {
                    zuletzt_gesehen = laenge;
                    continue;
                }
                if let Some(request) = ausstehenden_befehl_abschliessen(leitung)? {
                    return Ok(Some(request));
                }
                zuletzt_gesehen = leitung.read_buffer().len();
            },
            _ = shutdown_abwarten(shutdown_rx) => return Ok(None),
        }
    }
}

fn ausstehenden_befehl_abschliessen<S>(
    leitung: &mut Framed<S, RendezvousCodec>,
) -> RendezvousResult<Option<Request>> {
    let mut puffer = std::mem::take(leitung.read_buffer_mut());
    let ergebnis = leitung.codec_mut().ausstehend_abschliessen(&mut puffer);
    *leitung.read_buffer_mut() = puffer;

    match ergebnis? {
        Some(Eingang::Befehl(request)) => {
            tracing::trace!(befehl = request.name(), "Befehl nach Ruhepause abgeschlossen");
            Ok(Some(request))
        }
        _ => Ok(None),
    }
}

/// Wartet bis der Shutdown-Kanal `true` meldet
///
/// Ist der Sender verschwunden, kommt kein Shutdown mehr und die Future
/// bleibt haengen.
pub(crate) async fn shutdown_abwarten(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        let beenden = *shutdown_rx.borrow_and_update();
        if beenden {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn rolle_lesen(name: &str) -> Option<ServerRole> {
    match name.parse() {
        Ok(rolle) => Some(rolle),
        Err(e) => {
            tracing::warn!(fehler = %e, "Befehl mit unbekannter Rolle");
            None
        }
    }
}

fn nicht_unterstuetzt(request: Request) -> (Reply, Uebergang) {
    match &request {
        Request::Unsupported(text) => tracing::debug!(text = %text, "Unbekannter Befehl"),
        andere => tracing::debug!(befehl = andere.name(), "Befehl fuer diese Rolle nicht erlaubt"),
    }
    (Reply::MessageUnsupported, Uebergang::Bleiben)
}

fn zufaellige_pause(maximum: Duration) -> Duration {
    let max_ms = maximum.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
