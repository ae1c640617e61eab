//! soundmesh-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! SoundMesh-Crates gemeinsam genutzt werden: Server-Rollen,
//! Backend-Adressen und den zentralen Fehler-Enum.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::SoundmeshError;
pub use types::{BackendAddr, ServerRole};
