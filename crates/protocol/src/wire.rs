//! Wire-Format fuer TCP-Verbindungen
//!
//! Das Protokoll hat weder Laengenfeld noch Terminator. Ein Lesevorgang
//! kann genau einen Befehl, einen Befehl plus den Anfang des naechsten oder
//! mehrere Befehle enthalten. Die Codecs hier scannen den Lesepuffer
//! grammatikbasiert und verbrauchen exakt die Bytes eines Befehls:
//!
//! ```text
//! SERVERSERVERTYPE:LOGIN:9000GETSERVER:STORAGE
//! |-----||-------------------||-----------------|
//! Rolle   Befehl                Befehl
//! ```
//!
//! - Ist der Puffer ein echter Praefix eines Schluesselworts oder fehlen
//!   noch deklarierte Argumente, wird auf weitere Bytes gewartet.
//! - Ein Rollen-Argument ist ein Lauf aus ASCII-Buchstaben. Beginnt er mit
//!   einer bekannten Rolle, wird nur diese verbraucht.
//! - Ein Port ist ein Lauf aus ASCII-Ziffern. Endet der Lauf am
//!   Pufferende und koennte mit weiteren Ziffern noch ein gueltiger Port
//!   werden, wird gewartet. Gleiches gilt fuer den Freitext einer
//!   `ERROR:`-Antwort.
//! - Der Aufrufer entscheidet, wann das Pufferende als Argumentende gilt:
//!   am Verbindungsende (`decode_eof`) oder nach einer Ruhepause des Peers
//!   (`ausstehend_abschliessen`).
//! - Alles andere ist nicht resynchronisierbar: der gesamte Puffer wird
//!   verworfen.
//! - `\n`, `\r`, Leerzeichen und Nullbytes zwischen Befehlen werden
//!   uebersprungen.

use bytes::{Buf, BytesMut};
use soundmesh_core::{BackendAddr, ServerRole};
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec;
use crate::control::{PeerRolle, Reply, Request, TRENNZEICHEN};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Schluesselwoerter fuer Befehle vom Peer
pub const BEFEHLE: [&str; 5] = ["SERVERTYPE", "GETSERVER", "DROPPED", "HEARTBEAT", "DISCONNECT"];

/// Schluesselwoerter des Rollen-Handshakes
pub const ROLLEN: [&str; 2] = ["SERVER", "CLIENT"];

/// Schluesselwoerter fuer Antworten des Registry-Servers
pub const ANTWORTEN: [&str; 8] = [
    "TYPESTORED",
    "DROPPED",
    "DISCONNECT",
    "HEARTBEAT",
    "MESSAGEUNSUPPORTED",
    "SPAWN",
    "IP",
    "ERROR",
];

/// Maximale Laenge des IP-Teils einer Adress-Antwort
const MAX_IP_LAENGE: usize = 64;

const PORT_MARKER: &[u8] = b":PORT:";

/// Ruhepause, nach der ein offenes Argument am Pufferende als vollstaendig
/// gilt
pub const RUHEPAUSE: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WireError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    /// Erster Token war weder `SERVER` noch `CLIENT`
    #[error("Unbekannte Verbindungsrolle: '{0}'")]
    UnbekannteRolle(String),

    #[error("Ungueltige Antwort: '{0}'")]
    UngueltigeAntwort(String),
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Warum ein Scan angehalten hat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    /// Es fehlen Bytes, der bisherige Inhalt ist ein gueltiger Praefix
    Unvollstaendig,
    /// Der Inhalt passt nicht zur Grammatik
    Ungueltig,
}

#[derive(Debug, PartialEq, Eq)]
enum Scan<T> {
    Fertig(T, usize),
    Unvollstaendig,
    Ungueltig,
}

fn scannen<T>(
    daten: &[u8],
    am_ende: bool,
    lesen: impl FnOnce(&mut Leser<'_>) -> Result<T, Stop>,
) -> Scan<T> {
    let mut leser = Leser {
        daten,
        pos: 0,
        am_ende,
    };
    match lesen(&mut leser) {
        Ok(wert) => Scan::Fertig(wert, leser.pos),
        Err(Stop::Unvollstaendig) => Scan::Unvollstaendig,
        Err(Stop::Ungueltig) => Scan::Ungueltig,
    }
}

struct Leser<'a> {
    daten: &'a [u8],
    pos: usize,
    /// Das Pufferende beendet auch ein noch offenes Argument
    am_ende: bool,
}

impl<'a> Leser<'a> {
    fn rest(&self) -> &'a [u8] {
        &self.daten[self.pos..]
    }

    fn schluesselwort(&mut self, woerter: &[&'static str]) -> Result<&'static str, Stop> {
        let rest = self.rest();
        if let Some(wort) = woerter.iter().find(|w| rest.starts_with(w.as_bytes())) {
            self.pos += wort.len();
            return Ok(*wort);
        }
        if woerter.iter().any(|w| w.as_bytes().starts_with(rest)) {
            return Err(Stop::Unvollstaendig);
        }
        Err(Stop::Ungueltig)
    }

    fn trennzeichen(&mut self) -> Result<(), Stop> {
        match self.rest().first() {
            None => Err(Stop::Unvollstaendig),
            Some(&b) if char::from(b) == TRENNZEICHEN => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(Stop::Ungueltig),
        }
    }

    /// Liest ein Rollen-Argument; bekannte Rollen werden normalisiert
    fn rolle(&mut self) -> Result<String, Stop> {
        let rest = self.rest();
        let lauf = rest.iter().take_while(|b| b.is_ascii_alphabetic()).count();
        if lauf == 0 {
            return Err(leerer_lauf(rest));
        }
        let wort = &rest[..lauf];

        for rolle in ServerRole::ALLE {
            let name = rolle.as_str().as_bytes();
            if wort.len() >= name.len() && wort[..name.len()].eq_ignore_ascii_case(name) {
                self.pos += name.len();
                return Ok(rolle.as_str().to_string());
            }
        }

        // Lauf endet am Pufferende und kann noch zu einer Rolle wachsen
        let koennte_wachsen = ServerRole::ALLE.iter().any(|rolle| {
            let name = rolle.as_str().as_bytes();
            name.len() > lauf && name[..lauf].eq_ignore_ascii_case(wort)
        });
        if lauf == rest.len() && koennte_wachsen && !self.am_ende {
            return Err(Stop::Unvollstaendig);
        }

        self.pos += lauf;
        Ok(String::from_utf8_lossy(wort).to_ascii_uppercase())
    }

    fn port(&mut self) -> Result<u16, Stop> {
        let rest = self.rest();
        let lauf = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        if lauf == 0 {
            return Err(leerer_lauf(rest));
        }
        let port = std::str::from_utf8(&rest[..lauf])
            .ok()
            .and_then(|text| text.parse::<u16>().ok())
            .ok_or(Stop::Ungueltig)?;
        if lauf == rest.len() && !self.am_ende && port_koennte_wachsen(port, lauf) {
            return Err(Stop::Unvollstaendig);
        }
        self.pos += lauf;
        Ok(port)
    }

    /// Liest die IP einer Adress-Antwort bis einschliesslich `:PORT:`
    fn ip_bis_port(&mut self) -> Result<IpAddr, Stop> {
        let rest = self.rest();
        let Some(ende) = rest
            .windows(PORT_MARKER.len())
            .position(|fenster| fenster == PORT_MARKER)
        else {
            return Err(if rest.len() > MAX_IP_LAENGE {
                Stop::Ungueltig
            } else {
                Stop::Unvollstaendig
            });
        };
        let ip = std::str::from_utf8(&rest[..ende])
            .ok()
            .and_then(|text| text.parse::<IpAddr>().ok())
            .ok_or(Stop::Ungueltig)?;
        self.pos += ende + PORT_MARKER.len();
        Ok(ip)
    }

    /// Freitext bis zum Pufferende, erst wenn der Peer fertig geschrieben hat
    fn rest_als_text(&mut self) -> Result<String, Stop> {
        if !self.am_ende {
            return Err(Stop::Unvollstaendig);
        }
        let rest = self.rest();
        self.pos += rest.len();
        Ok(codec::bytes_zu_text(Some(rest), rest.len()))
    }
}

/// Ob eine weitere Ziffer noch einen gueltigen Port ergeben kann
fn port_koennte_wachsen(port: u16, ziffern: usize) -> bool {
    ziffern < 5 && u32::from(port) * 10 <= u32::from(u16::MAX)
}

fn leerer_lauf(rest: &[u8]) -> Stop {
    if rest.is_empty() {
        Stop::Unvollstaendig
    } else {
        Stop::Ungueltig
    }
}

fn handshake_lesen(leser: &mut Leser<'_>) -> Result<PeerRolle, Stop> {
    match leser.schluesselwort(&ROLLEN)? {
        "SERVER" => Ok(PeerRolle::Server),
        "CLIENT" => Ok(PeerRolle::Client),
        _ => Err(Stop::Ungueltig),
    }
}

fn request_lesen(leser: &mut Leser<'_>) -> Result<Request, Stop> {
    let request = match leser.schluesselwort(&BEFEHLE)? {
        "SERVERTYPE" => {
            leser.trennzeichen()?;
            let rolle = leser.rolle()?;
            leser.trennzeichen()?;
            Request::ServerType {
                rolle,
                port: leser.port()?,
            }
        }
        "GETSERVER" => {
            leser.trennzeichen()?;
            Request::GetServer {
                rolle: leser.rolle()?,
            }
        }
        "DROPPED" => {
            leser.trennzeichen()?;
            let rolle = leser.rolle()?;
            leser.trennzeichen()?;
            Request::Dropped {
                rolle,
                port: leser.port()?,
            }
        }
        "HEARTBEAT" => Request::Heartbeat,
        "DISCONNECT" => Request::Disconnect,
        _ => return Err(Stop::Ungueltig),
    };
    Ok(request)
}

fn reply_lesen(leser: &mut Leser<'_>) -> Result<Reply, Stop> {
    let reply = match leser.schluesselwort(&ANTWORTEN)? {
        "TYPESTORED" => Reply::TypeStored,
        "DROPPED" => Reply::Dropped,
        "DISCONNECT" => Reply::Disconnect,
        "HEARTBEAT" => Reply::Heartbeat,
        "MESSAGEUNSUPPORTED" => Reply::MessageUnsupported,
        "SPAWN" => {
            leser.trennzeichen()?;
            let rolle = leser.rolle()?;
            Reply::Spawn(rolle.parse().map_err(|_| Stop::Ungueltig)?)
        }
        "IP" => {
            leser.trennzeichen()?;
            let ip = leser.ip_bis_port()?;
            Reply::Adresse(BackendAddr::neu(ip, leser.port()?))
        }
        "ERROR" => {
            leser.trennzeichen()?;
            Reply::Fehler(leser.rest_als_text()?)
        }
        _ => return Err(Stop::Ungueltig),
    };
    Ok(reply)
}

/// Ueberspringt Trennbytes zwischen zwei Nachrichten
fn trenner_ueberspringen(src: &mut BytesMut) {
    let anzahl = src
        .iter()
        .take_while(|b| matches!(b, b'\n' | b'\r' | b' ' | b'\t' | 0))
        .count();
    src.advance(anzahl);
}

/// Verwirft den gesamten Puffer und gibt seinen Inhalt als Text zurueck
fn puffer_verwerfen(src: &mut BytesMut) -> String {
    let text = codec::bytes_zu_text(Some(&src[..]), src.len());
    src.clear();
    text
}

fn text_schreiben(text: &str, dst: &mut BytesMut) {
    let bytes = codec::text_zu_bytes(Some(text));
    dst.reserve(bytes.len());
    dst.extend_from_slice(&bytes);
}

// ---------------------------------------------------------------------------
// RendezvousCodec (Serverseite)
// ---------------------------------------------------------------------------

/// Eingang auf einer Registry-Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eingang {
    /// Ergebnis des Handshakes, kommt genau einmal als erstes
    Rolle(PeerRolle),
    Befehl(Request),
}

/// tokio-util Codec fuer die Serverseite einer Registry-Verbindung
///
/// Dekodiert zuerst den Rollen-Handshake, danach Befehle. Was hinter dem
/// Rollen-Token im Puffer steht, bleibt als erster Befehl erhalten.
#[derive(Debug, Default)]
pub struct RendezvousCodec {
    rolle: Option<PeerRolle>,
}

impl RendezvousCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Die ausgehandelte Rolle, sobald der Handshake gelesen wurde
    pub fn rolle(&self) -> Option<PeerRolle> {
        self.rolle
    }

    /// Dekodiert den Puffer so, als haette der Peer fertig geschrieben
    ///
    /// Ein Argument, das am Pufferende steht, gilt als vollstaendig. Fuer
    /// den Aufruf nach einer Ruhepause des Peers.
    pub fn ausstehend_abschliessen(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<Eingang>, WireError> {
        self.dekodieren(src, true)
    }

    fn dekodieren(&mut self, src: &mut BytesMut, am_ende: bool) -> Result<Option<Eingang>, WireError> {
        trenner_ueberspringen(src);
        if src.is_empty() {
            return Ok(None);
        }

        if self.rolle.is_none() {
            return match scannen(&src[..], am_ende, handshake_lesen) {
                Scan::Fertig(rolle, verbraucht) => {
                    src.advance(verbraucht);
                    self.rolle = Some(rolle);
                    Ok(Some(Eingang::Rolle(rolle)))
                }
                Scan::Unvollstaendig => Ok(None),
                Scan::Ungueltig => Err(WireError::UnbekannteRolle(puffer_verwerfen(src))),
            };
        }

        match scannen(&src[..], am_ende, request_lesen) {
            Scan::Fertig(request, verbraucht) => {
                src.advance(verbraucht);
                Ok(Some(Eingang::Befehl(request)))
            }
            Scan::Unvollstaendig => Ok(None),
            Scan::Ungueltig => Ok(Some(Eingang::Befehl(Request::Unsupported(
                puffer_verwerfen(src),
            )))),
        }
    }
}

impl Decoder for RendezvousCodec {
    type Item = Eingang;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.dekodieren(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.dekodieren(src, true)? {
            Some(eingang) => Ok(Some(eingang)),
            None => {
                if !src.is_empty() {
                    tracing::trace!(bytes = src.len(), "Unvollstaendiger Rest am Verbindungsende verworfen");
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Reply> for RendezvousCodec {
    type Error = WireError;

    fn encode(&mut self, item: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        text_schreiben(&item.to_string(), dst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ReplyCodec (Clientseite)
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer die Clientseite einer Registry-Verbindung
///
/// Trennt zusammengefasste Antworten, z.B. zwei `SPAWN:`-Pushes in einem
/// Lesevorgang.
#[derive(Debug, Default, Clone)]
pub struct ReplyCodec;

impl ReplyCodec {
    pub fn new() -> Self {
        Self
    }

    /// Wie [`RendezvousCodec::ausstehend_abschliessen`], fuer Antworten
    pub fn ausstehend_abschliessen(&mut self, src: &mut BytesMut) -> Result<Option<Reply>, WireError> {
        self.dekodieren(src, true)
    }

    fn dekodieren(&mut self, src: &mut BytesMut, am_ende: bool) -> Result<Option<Reply>, WireError> {
        trenner_ueberspringen(src);
        if src.is_empty() {
            return Ok(None);
        }

        match scannen(&src[..], am_ende, reply_lesen) {
            Scan::Fertig(reply, verbraucht) => {
                src.advance(verbraucht);
                Ok(Some(reply))
            }
            Scan::Unvollstaendig => Ok(None),
            Scan::Ungueltig => Err(WireError::UngueltigeAntwort(puffer_verwerfen(src))),
        }
    }
}

impl Decoder for ReplyCodec {
    type Item = Reply;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.dekodieren(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.dekodieren(src, true)? {
            Some(reply) => Ok(Some(reply)),
            None => {
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Request> for ReplyCodec {
    type Error = WireError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        text_schreiben(&item.to_string(), dst);
        Ok(())
    }
}

impl Encoder<PeerRolle> for ReplyCodec {
    type Error = WireError;

    fn encode(&mut self, item: PeerRolle, dst: &mut BytesMut) -> Result<(), Self::Error> {
        text_schreiben(item.as_str(), dst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::FramedRead;

    fn puffer(text: &str) -> BytesMut {
        BytesMut::from(text.as_bytes())
    }

    fn alle_dekodieren(codec: &mut RendezvousCodec, src: &mut BytesMut) -> Vec<Eingang> {
        let mut ergebnis = Vec::new();
        while let Some(eingang) = codec.decode(src).unwrap() {
            ergebnis.push(eingang);
        }
        ergebnis
    }

    fn befehl(request: Request) -> Eingang {
        Eingang::Befehl(request)
    }

    #[test]
    fn handshake_mit_angehaengtem_befehl() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("SERVERSERVERTYPE:LOGIN:9000");

        let eingaenge = alle_dekodieren(&mut codec, &mut src);
        assert_eq!(
            eingaenge,
            vec![
                Eingang::Rolle(PeerRolle::Server),
                befehl(Request::server_type(ServerRole::Login, 9000)),
            ]
        );
        assert!(src.is_empty());
        assert_eq!(codec.rolle(), Some(PeerRolle::Server));
    }

    #[test]
    fn unbekannte_rolle_ist_fehler() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("ROBOT");
        let fehler = codec.decode(&mut src).unwrap_err();
        assert!(matches!(fehler, WireError::UnbekannteRolle(text) if text == "ROBOT"));
    }

    #[test]
    fn handshake_praefix_wartet() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("CLI");
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        src.extend_from_slice(b"ENT");
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Eingang::Rolle(PeerRolle::Client))
        );
    }

    #[test]
    fn zusammengefasste_befehle_werden_getrennt() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("CLIENTGETSERVER:LOGINHEARTBEATGETSERVER:STREAMINGDISCONNECT");

        let eingaenge = alle_dekodieren(&mut codec, &mut src);
        assert_eq!(
            eingaenge,
            vec![
                Eingang::Rolle(PeerRolle::Client),
                befehl(Request::get_server(ServerRole::Login)),
                befehl(Request::Heartbeat),
                befehl(Request::get_server(ServerRole::Streaming)),
                befehl(Request::Disconnect),
            ]
        );
    }

    #[test]
    fn port_gefolgt_von_befehl() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("SERVER DROPPED:LOGIN:9000DISCONNECT\n");

        let eingaenge = alle_dekodieren(&mut codec, &mut src);
        assert_eq!(
            eingaenge,
            vec![
                Eingang::Rolle(PeerRolle::Server),
                befehl(Request::dropped(ServerRole::Login, 9000)),
                befehl(Request::Disconnect),
            ]
        );
    }

    #[test]
    fn fehlende_argumente_warten_auf_weitere_bytes() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("SERVERSERVERTYPE:LOG");
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Eingang::Rolle(PeerRolle::Server))
        );
        assert_eq!(codec.decode(&mut src).unwrap(), None);

        src.extend_from_slice(b"IN:");
        assert_eq!(codec.decode(&mut src).unwrap(), None);

        src.extend_from_slice(b"9000");
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(befehl(Request::server_type(ServerRole::Login, 9000)))
        );
    }

    #[test]
    fn rollen_werden_normalisiert() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("CLIENTGETSERVER:login");
        let eingaenge = alle_dekodieren(&mut codec, &mut src);
        assert_eq!(eingaenge[1], befehl(Request::get_server(ServerRole::Login)));
    }

    #[test]
    fn unbekannte_rolle_als_argument_bleibt_text() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("CLIENTGETSERVER:MAIL");
        let eingaenge = alle_dekodieren(&mut codec, &mut src);
        assert_eq!(
            eingaenge[1],
            befehl(Request::GetServer {
                rolle: "MAIL".into()
            })
        );
    }

    #[test]
    fn unbekannter_befehl_verwirft_puffer() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("CLIENTPLAY:SONGHEARTBEAT");

        let eingaenge = alle_dekodieren(&mut codec, &mut src);
        assert_eq!(
            eingaenge,
            vec![
                Eingang::Rolle(PeerRolle::Client),
                befehl(Request::Unsupported("PLAY:SONGHEARTBEAT".into())),
            ]
        );
        assert!(src.is_empty());
    }

    #[test]
    fn ungueltiger_port_ist_nicht_unterstuetzt() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("SERVERSERVERTYPE:LOGIN:99999");
        let eingaenge = alle_dekodieren(&mut codec, &mut src);
        assert!(matches!(eingaenge[1], Eingang::Befehl(Request::Unsupported(_))));

        let mut src = puffer("SERVERTYPE:LOGIN:abc");
        let eingang = codec.decode(&mut src).unwrap();
        assert!(matches!(eingang, Some(Eingang::Befehl(Request::Unsupported(_)))));
    }

    #[test]
    fn rest_am_verbindungsende_wird_verworfen() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("CLIENTHEART");
        assert_eq!(
            codec.decode_eof(&mut src).unwrap(),
            Some(Eingang::Rolle(PeerRolle::Client))
        );
        assert_eq!(codec.decode_eof(&mut src).unwrap(), None);
        assert!(src.is_empty());
    }

    #[test]
    fn antworten_ohne_terminator_werden_getrennt() {
        let mut codec = ReplyCodec::new();
        let mut src = puffer("SPAWN:LOGINSPAWN:STREAMINGTYPESTORED");

        assert_eq!(codec.decode(&mut src).unwrap(), Some(Reply::Spawn(ServerRole::Login)));
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Reply::Spawn(ServerRole::Streaming))
        );
        assert_eq!(codec.decode(&mut src).unwrap(), Some(Reply::TypeStored));
        assert_eq!(codec.decode(&mut src).unwrap(), None);
    }

    #[test]
    fn adress_antwort_wird_gelesen() {
        let mut codec = ReplyCodec::new();
        let mut src = puffer("IP:10.0.0.1:PORT:9000");
        let erwartet = BackendAddr::neu("10.0.0.1".parse().unwrap(), 9000);
        assert_eq!(codec.decode(&mut src).unwrap(), Some(Reply::Adresse(erwartet)));

        // 80 kann noch zu 800 oder 8080 wachsen
        let mut src = puffer("IP:::1:PORT:80");
        let erwartet = BackendAddr::neu("::1".parse().unwrap(), 80);
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(
            codec.ausstehend_abschliessen(&mut src).unwrap(),
            Some(Reply::Adresse(erwartet))
        );

        let mut src = puffer("IP:::1:PORT:80\nHEARTBEAT");
        assert_eq!(codec.decode(&mut src).unwrap(), Some(Reply::Adresse(erwartet)));
        assert_eq!(codec.decode(&mut src).unwrap(), Some(Reply::Heartbeat));
    }

    #[test]
    fn geteilter_port_einer_adress_antwort() {
        let mut codec = ReplyCodec::new();
        let mut src = puffer("IP:10.0.0.1:PORT:90");
        assert_eq!(codec.decode(&mut src).unwrap(), None);

        src.extend_from_slice(b"00");
        let erwartet = BackendAddr::neu("10.0.0.1".parse().unwrap(), 9000);
        assert_eq!(codec.decode(&mut src).unwrap(), Some(Reply::Adresse(erwartet)));
    }

    #[test]
    fn fehler_antwort_wartet_auf_ende_des_textes() {
        let mut codec = ReplyCodec::new();
        let mut src = puffer("ERROR:No server of type");
        assert_eq!(codec.decode(&mut src).unwrap(), None);

        src.extend_from_slice(b" 'LOGIN' exists.");
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(
            codec.ausstehend_abschliessen(&mut src).unwrap(),
            Some(Reply::kein_server(ServerRole::Login))
        );
        assert!(src.is_empty());

        let mut src = puffer("ERROR:No storage server exists.");
        assert_eq!(
            codec.decode_eof(&mut src).unwrap(),
            Some(Reply::kein_storage_server())
        );
    }

    #[test]
    fn kurzer_port_wartet_bis_zum_abschluss() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("SERVERDROPPED:LOGIN:90");
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Eingang::Rolle(PeerRolle::Server))
        );
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(
            codec.ausstehend_abschliessen(&mut src).unwrap(),
            Some(befehl(Request::dropped(ServerRole::Login, 90)))
        );

        // Ein Zeilenende schliesst den Port sofort ab
        let mut src = puffer("SERVERTYPE:LOGIN:90\n");
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(befehl(Request::server_type(ServerRole::Login, 90)))
        );

        // Fuenf Ziffern oder ein Wert ueber 6553 koennen nicht wachsen
        let mut src = puffer("SERVERTYPE:LOGIN:12345");
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(befehl(Request::server_type(ServerRole::Login, 12345)))
        );
    }

    #[test]
    fn rollen_praefix_wird_beim_abschluss_uebernommen() {
        let mut codec = RendezvousCodec::new();
        let mut src = puffer("CLIENTGETSERVER:LOG");
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Eingang::Rolle(PeerRolle::Client))
        );
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(
            codec.ausstehend_abschliessen(&mut src).unwrap(),
            Some(befehl(Request::GetServer { rolle: "LOG".into() }))
        );
    }

    #[test]
    fn ungueltige_antwort_ist_fehler() {
        let mut codec = ReplyCodec::new();
        let mut src = puffer("HELLO");
        assert!(matches!(
            codec.decode(&mut src),
            Err(WireError::UngueltigeAntwort(_))
        ));
    }

    #[test]
    fn encoder_schreibt_draht_text() {
        let mut dst = BytesMut::new();
        RendezvousCodec::new()
            .encode(Reply::TypeStored, &mut dst)
            .unwrap();
        assert_eq!(&dst[..], b"TYPESTORED");

        let mut dst = BytesMut::new();
        let mut codec = ReplyCodec::new();
        codec.encode(PeerRolle::Server, &mut dst).unwrap();
        codec
            .encode(Request::server_type(ServerRole::Network, 4000), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], b"SERVERSERVERTYPE:NETWORK:4000");
    }

    #[tokio::test]
    async fn befehl_ueber_lesegrenzen_geht_nicht_verloren() {
        let (mut schreiber, leser) = tokio::io::duplex(64);
        let mut framed = FramedRead::new(leser, RendezvousCodec::new());

        schreiber.write_all(b"SERVERSERVERTYPE:STOR").await.unwrap();
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            Eingang::Rolle(PeerRolle::Server)
        );

        schreiber.write_all(b"AGE:7000DISCONNECT").await.unwrap();
        drop(schreiber);

        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            befehl(Request::server_type(ServerRole::Storage, 7000))
        );
        assert_eq!(framed.next().await.unwrap().unwrap(), befehl(Request::Disconnect));
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn port_ueber_lesegrenzen_wird_nicht_abgeschnitten() {
        let (mut schreiber, leser) = tokio::io::duplex(64);
        let mut framed = FramedRead::new(leser, RendezvousCodec::new());

        schreiber.write_all(b"SERVERSERVERTYPE:LOGIN:90").await.unwrap();
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            Eingang::Rolle(PeerRolle::Server)
        );

        let naechster = tokio::time::timeout(std::time::Duration::from_millis(50), framed.next()).await;
        assert!(naechster.is_err(), "Port darf nicht nach zwei Ziffern enden");

        schreiber.write_all(b"00").await.unwrap();
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            befehl(Request::server_type(ServerRole::Login, 9000))
        );

        // Am Verbindungsende gilt ein kurzer Port als vollstaendig
        schreiber.write_all(b"DROPPED:LOGIN:90").await.unwrap();
        drop(schreiber);
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            befehl(Request::dropped(ServerRole::Login, 90))
        );
        assert!(framed.next().await.is_none());
    }
}
