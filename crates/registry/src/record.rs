//! ServerRecord – Ein registriertes Backend
//!
//! Jede Zuweisung eines Clients an das Backend ist ein Lease mit
//! Erstellungszeitpunkt. Die Client-Anzahl ist die Anzahl lebender Leases.

use soundmesh_core::{BackendAddr, ServerRole};
use std::collections::VecDeque;
use std::time::Instant;

/// Ein registriertes Backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub adresse: BackendAddr,
    pub rolle: ServerRole,
    /// Lease-Zeitpunkte, aelteste zuerst
    leases: VecDeque<Instant>,
}

impl ServerRecord {
    pub fn neu(adresse: BackendAddr, rolle: ServerRole) -> Self {
        Self {
            adresse,
            rolle,
            leases: VecDeque::new(),
        }
    }

    /// Anzahl aktuell zugewiesener Clients
    pub fn clients(&self) -> u32 {
        self.leases.len() as u32
    }

    pub(crate) fn reservieren(&mut self, jetzt: Instant) {
        self.leases.push_back(jetzt);
    }

    /// Gibt das aelteste Lease frei
    ///
    /// Gibt `false` zurueck wenn kein Lease vorhanden war.
    pub(crate) fn freigeben(&mut self) -> bool {
        self.leases.pop_front().is_some()
    }

    /// Gibt alle Leases frei, die vor `grenze` erstellt wurden
    pub(crate) fn abgelaufene_freigeben(&mut self, grenze: Instant) -> usize {
        let vorher = self.leases.len();
        while self.leases.front().is_some_and(|erstellt| *erstellt < grenze) {
            self.leases.pop_front();
        }
        vorher - self.leases.len()
    }
}
