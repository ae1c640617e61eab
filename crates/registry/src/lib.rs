//! soundmesh-registry – Service-Registry und Load-Balancer
//!
//! Haelt pro Server-Rolle einen Pool registrierter Backends und eine
//! FIFO-Queue ausstehender Skalierungssignale.
//!
//! ## Locking
//! Jeder Pool und die Signal-Queue haben ein eigenes Lock. Keine Operation
//! haelt mehr als ein Lock gleichzeitig, Locks werden nie ueber ein
//! `.await` gehalten.
//!
//! ## Module
//! - [`record`] – Ein registriertes Backend samt Leases
//! - [`pool`] – Pool einer Rolle mit Auswahlstrategien
//! - [`registry`] – Die prozessweite Registry

pub mod pool;
pub mod record;
pub mod registry;

pub use pool::{Freigabe, ServerPool};
pub use record::ServerRecord;
pub use registry::{Registry, RegistryConfig, SpawnSignal};
