//! soundmesh-client – Client fuer den Rendezvous-Server
//!
//! Wird von Backends (Registrierung, Drop-Meldungen), Endbenutzer-Clients
//! (Backend-Vermittlung) und dem Network-Manager (Skalierungssignale)
//! verwendet.

pub mod address;
pub mod client;
pub mod error;

pub use address::RegistryAddress;
pub use client::RegistryClient;
pub use error::{ClientError, ClientResult};
