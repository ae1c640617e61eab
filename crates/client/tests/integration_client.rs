//! Integrationstests: RegistryClient gegen einen echten Rendezvous-Server

use soundmesh_client::{ClientError, RegistryAddress, RegistryClient};
use soundmesh_core::{BackendAddr, ServerRole};
use soundmesh_protocol::{PeerRolle, Reply};
use soundmesh_registry::{Registry, RegistryConfig};
use soundmesh_rendezvous::{RendezvousConfig, RendezvousServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

async fn server() -> (SocketAddr, Arc<Registry>, watch::Sender<bool>) {
    let registry = Registry::neu(RegistryConfig::default());
    let server = RendezvousServer::binden(
        "127.0.0.1:0".parse().unwrap(),
        Arc::clone(&registry),
        RendezvousConfig {
            signal_poll_max: Duration::from_millis(20),
            leerlauf_timeout: None,
        },
    )
    .await
    .expect("Binden fehlgeschlagen");
    let adresse = server.lokale_adresse().expect("Keine lokale Adresse");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(server.starten(shutdown_rx));
    (adresse, registry, shutdown_tx)
}

async fn verbinden(adresse: SocketAddr, rolle: PeerRolle) -> RegistryClient {
    RegistryClient::verbinden(adresse, rolle)
        .await
        .expect("Verbindung fehlgeschlagen")
        .mit_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn backend_und_client_sitzung() {
    let (adresse, registry, _shutdown) = server().await;

    let mut backend = verbinden(adresse, PeerRolle::Server).await;
    backend
        .registrieren(ServerRole::Streaming, 8100)
        .await
        .expect("Registrierung fehlgeschlagen");

    let mut client = verbinden(adresse, PeerRolle::Client).await;
    client.heartbeat().await.expect("Heartbeat fehlgeschlagen");
    let zugewiesen = client
        .server_anfordern(ServerRole::Streaming)
        .await
        .expect("Kein Streaming-Backend");
    assert_eq!(zugewiesen, BackendAddr::neu("127.0.0.1".parse().unwrap(), 8100));

    backend
        .client_getrennt(ServerRole::Streaming, 8100)
        .await
        .expect("Drop-Meldung fehlgeschlagen");
    assert!(registry.pool(ServerRole::Streaming).is_empty());

    client.trennen().await.expect("Trennen fehlgeschlagen");
    backend.trennen().await.expect("Trennen fehlgeschlagen");
}

#[tokio::test]
async fn abgelehnte_anfragen_liefern_typisierte_fehler() {
    let (adresse, _registry, _shutdown) = server().await;
    let mut client = verbinden(adresse, PeerRolle::Client).await;

    let fehler = client.server_anfordern(ServerRole::Login).await.unwrap_err();
    assert!(
        matches!(&fehler, ClientError::Abgelehnt(grund) if grund == "No server of type 'LOGIN' exists."),
        "{fehler}"
    );

    let fehler = client.server_anfordern(ServerRole::Storage).await.unwrap_err();
    assert!(matches!(&fehler, ClientError::Abgelehnt(grund) if grund == "Incorrect server type."));

    // Clients duerfen sich nicht registrieren
    let fehler = client.registrieren(ServerRole::Login, 1).await.unwrap_err();
    assert!(matches!(fehler, ClientError::UnerwarteteAntwort(Reply::MessageUnsupported)));
}

#[tokio::test]
async fn network_manager_empfaengt_skalierungssignale() {
    let (adresse, registry, _shutdown) = server().await;

    let mut network = verbinden(adresse, PeerRolle::Server).await;
    network
        .registrieren(ServerRole::Network, 5000)
        .await
        .expect("Registrierung fehlgeschlagen");

    // Drei Signale, moeglicherweise in einem Lesevorgang zusammengefasst
    assert!(registry.server_anfordern(ServerRole::Login).is_none());
    assert!(registry.server_anfordern(ServerRole::Streaming).is_none());
    assert!(registry.server_anfordern(ServerRole::Login).is_none());

    let mut empfangen = Vec::new();
    for _ in 0..3 {
        let signal = tokio::time::timeout(Duration::from_secs(5), network.naechstes_signal())
            .await
            .expect("Timeout beim Warten auf Signal")
            .expect("Signal fehlerhaft");
        empfangen.push(signal);
    }
    assert_eq!(
        empfangen,
        vec![ServerRole::Login, ServerRole::Streaming, ServerRole::Login]
    );
}

#[tokio::test]
async fn shutdown_trennt_clients() {
    let (adresse, _registry, shutdown) = server().await;
    let mut client = verbinden(adresse, PeerRolle::Client).await;
    client.heartbeat().await.expect("Heartbeat fehlgeschlagen");

    shutdown.send(true).expect("Shutdown senden");
    let fehler = tokio::time::timeout(Duration::from_secs(5), client.naechstes_signal())
        .await
        .expect("Verbindung wurde nicht geschlossen")
        .unwrap_err();
    assert!(matches!(fehler, ClientError::VerbindungGetrennt | ClientError::Io(_) | ClientError::Wire(_)));
}

#[tokio::test]
async fn adresse_aus_datei_verbinden() {
    let (adresse, _registry, _shutdown) = server().await;

    let pfad = std::env::temp_dir().join(format!("soundmesh-registry-{}.txt", adresse.port()));
    std::fs::write(&pfad, format!("IP : {}\nPORT : {}\n", adresse.ip(), adresse.port()))
        .expect("Adressdatei schreiben");

    let gelesen = RegistryAddress::aus_datei(&pfad).expect("Adressdatei lesen");
    let _ = std::fs::remove_file(&pfad);
    assert_eq!(gelesen.socket_addr(), adresse);

    let mut client = verbinden(gelesen.socket_addr(), PeerRolle::Client).await;
    client.heartbeat().await.expect("Heartbeat fehlgeschlagen");
}

#[tokio::test]
async fn geteilte_antworten_werden_vollstaendig_gelesen() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Binden fehlgeschlagen");
    let adresse = listener.local_addr().expect("Keine lokale Adresse");

    // Gegenstelle schreibt jede Antwort in zwei Teilen
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("Accept fehlgeschlagen");
        let mut puffer = [0u8; 64];
        for teile in [
            ["IP:127.0.0.1:PORT:90", "00"],
            ["ERROR:No server of type", " 'LOGIN' exists."],
            ["IP:127.0.0.1:PORT:8", ""],
        ] {
            let _ = stream.read(&mut puffer).await;
            stream.write_all(teile[0].as_bytes()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            stream.write_all(teile[1].as_bytes()).await.unwrap();
        }
        let _ = stream.read(&mut puffer).await;
    });

    let mut client = verbinden(adresse, PeerRolle::Client).await;
    let erste = client
        .server_anfordern(ServerRole::Login)
        .await
        .expect("Erste Adresse");
    assert_eq!(erste, BackendAddr::neu("127.0.0.1".parse().unwrap(), 9000));

    let fehler = client.server_anfordern(ServerRole::Login).await.unwrap_err();
    assert!(
        matches!(&fehler, ClientError::Abgelehnt(grund) if grund == "No server of type 'LOGIN' exists."),
        "{fehler}"
    );

    // Ohne Folgebytes wird der kurze Port nach der Ruhepause angenommen
    let kurz = client
        .server_anfordern(ServerRole::Login)
        .await
        .expect("Dritte Adresse");
    assert_eq!(kurz.port, 8);
}
