//! # soundmesh-observability
//!
//! Structured Logging fuer alle SoundMesh-Prozesse via tracing-subscriber,
//! als Text oder JSON.

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat, LoggingError};
