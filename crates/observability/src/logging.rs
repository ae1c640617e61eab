//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable, die Vorrang vor der
//! Konfigurationsdatei hat:
//! - `SM_LOG_LEVEL`: Filter-Direktive (z.B. `info` oder
//!   `soundmesh_rendezvous=debug,info`), Standard: info
//! - `SM_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Verbindungs-IDs werden als Tracing-Span-Felder propagiert.

use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "SM_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "SM_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Ungueltiges Log-Format '{0}' (erlaubt: text, json)")]
    UngueltigesFormat(String),

    #[error("Ungueltige Log-Direktive '{0}'")]
    UngueltigerFilter(String),

    /// Ein globaler Subscriber ist bereits gesetzt
    #[error("Logging bereits initialisiert: {0}")]
    BereitsInitialisiert(String),
}

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(LoggingError::UngueltigesFormat(andere.to_string())),
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `level` und `format` kommen aus der Konfiguration und werden von
/// `SM_LOG_LEVEL` / `SM_LOG_FORMAT` ueberschrieben.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<(), LoggingError> {
    let level = einstellung(std::env::var(ENV_LOG_LEVEL).ok(), level);
    let format: LogFormat = einstellung(std::env::var(ENV_LOG_FORMAT).ok(), format).parse()?;
    let filter = filter_bauen(&level)?;

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| LoggingError::BereitsInitialisiert(e.to_string()))
}

/// Umgebungsvariable vor Konfigurationswert, leere Werte zaehlen nicht
fn einstellung(aus_env: Option<String>, aus_config: &str) -> String {
    aus_env
        .map(|wert| wert.trim().to_string())
        .filter(|wert| !wert.is_empty())
        .unwrap_or_else(|| aus_config.to_string())
}

fn filter_bauen(direktive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(direktive).map_err(|_| LoggingError::UngueltigerFilter(direktive.to_string()))
}
