//! soundmesh-rendezvous – TCP-Rendezvous-Server
//!
//! Nimmt Verbindungen von Backends, Clients und dem Network-Manager an.
//! Jede Verbindung laeuft in einem eigenen tokio-Task und teilt sich die
//! `Registry` ueber einen `Arc`.
//!
//! ## Verbindungsablauf
//! ```text
//! Handshake (SERVER | CLIENT)
//!     |-- SERVER -> Server-Schleife --(SERVERTYPE:NETWORK)--> Network-Schleife
//!     |-- CLIENT -> Client-Schleife
//!     +-- DISCONNECT -> Trennend
//! ```

pub mod connection;
pub mod error;
pub mod tcp;

pub use connection::{Connection, Uebergang, VerbindungsZustand};
pub use error::{RendezvousError, RendezvousResult};
pub use tcp::{RendezvousConfig, RendezvousServer};
