//! Fehlertypen fuer SoundMesh
//!
//! Zentraler Fehler-Enum fuer Parse-Fehler gemeinsamer Typen. Die
//! anderen Crates definieren eigene Fehler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoundmeshError {
    #[error("Unbekannte Server-Rolle: '{0}'")]
    UnbekannteRolle(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = SoundmeshError::UnbekannteRolle("MAIL".into());
        assert_eq!(e.to_string(), "Unbekannte Server-Rolle: 'MAIL'");
    }
}
