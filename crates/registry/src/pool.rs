//! ServerPool – Alle registrierten Backends einer Rolle
//!
//! Jeder Pool ist durch ein eigenes `parking_lot::Mutex` geschuetzt. Auswahl
//! und Reservierung passieren im selben gesperrten Durchlauf, es gibt
//! keine verlorenen Updates bei gleichzeitigen Anfragen.

use parking_lot::Mutex;
use rand::Rng;
use soundmesh_core::{BackendAddr, ServerRole};
use std::time::Instant;

use crate::record::ServerRecord;

/// Ergebnis einer Drop-Meldung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freigabe {
    /// Kein Backend mit dieser Adresse im Pool
    Unbekannt,
    /// Ein Client wurde freigegeben, das Backend bleibt im Pool
    Freigegeben { verbleibend: u32 },
    /// Das Backend hatte keinen offenen Lease, es bleibt unveraendert im Pool
    OhneLease,
    /// Das Backend hat keine Clients mehr und wurde entfernt
    Entfernt,
}

pub struct ServerPool {
    rolle: ServerRole,
    eintraege: Mutex<Vec<ServerRecord>>,
}

impl ServerPool {
    pub fn neu(rolle: ServerRole) -> Self {
        Self {
            rolle,
            eintraege: Mutex::new(Vec::new()),
        }
    }

    pub fn hinzufuegen(&self, adresse: BackendAddr) {
        self.eintraege
            .lock()
            .push(ServerRecord::neu(adresse, self.rolle));
    }

    /// Waehlt das am wenigsten ausgelastete Backend unter `kapazitaet` und
    /// reserviert einen Client-Platz darauf
    ///
    /// Bei Gleichstand gewinnt das zuerst registrierte Backend. Gibt eine
    /// Kopie des Records nach der Reservierung zurueck.
    pub fn reservieren(&self, kapazitaet: u32) -> Option<ServerRecord> {
        let mut eintraege = self.eintraege.lock();
        let gewaehlt = eintraege
            .iter_mut()
            .filter(|record| record.clients() < kapazitaet)
            .min_by_key(|record| record.clients())?;
        gewaehlt.reservieren(Instant::now());
        Some(gewaehlt.clone())
    }

    /// Gleichverteilte Zufallsauswahl ohne Kapazitaetspruefung
    pub fn zufaellig(&self) -> Option<ServerRecord> {
        let eintraege = self.eintraege.lock();
        if eintraege.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..eintraege.len());
        Some(eintraege[index].clone())
    }

    /// Gibt einen Client des Backends frei und entfernt es, wenn danach
    /// keine Clients mehr zugewiesen sind
    ///
    /// Nur ein tatsaechlich freigegebener Lease kann zum Entfernen fuehren.
    /// Ein Backend ohne offenen Lease bleibt registriert.
    pub fn client_getrennt(&self, adresse: &BackendAddr) -> Freigabe {
        let mut eintraege = self.eintraege.lock();
        let Some(index) = eintraege.iter().position(|r| r.adresse == *adresse) else {
            return Freigabe::Unbekannt;
        };

        if !eintraege[index].freigeben() {
            return Freigabe::OhneLease;
        }
        match eintraege[index].clients() {
            0 => {
                eintraege.remove(index);
                Freigabe::Entfernt
            }
            verbleibend => Freigabe::Freigegeben { verbleibend },
        }
    }

    /// Gibt alle Leases frei, die vor `grenze` erstellt wurden
    pub fn abgelaufene_freigeben(&self, grenze: Instant) -> usize {
        self.eintraege
            .lock()
            .iter_mut()
            .map(|record| record.abgelaufene_freigeben(grenze))
            .sum()
    }

    /// Kopie aller Records
    pub fn snapshot(&self) -> Vec<ServerRecord> {
        self.eintraege.lock().clone()
    }

    /// Aktuelle Client-Anzahl des Backends, falls registriert
    pub fn clients_von(&self, adresse: &BackendAddr) -> Option<u32> {
        self.eintraege
            .lock()
            .iter()
            .find(|r| r.adresse == *adresse)
            .map(ServerRecord::clients)
    }

    pub fn len(&self) -> usize {
        self.eintraege.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
