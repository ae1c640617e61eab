//! soundmesh-protocol – Rendezvous-Protokoll
//!
//! Textprotokoll ueber TCP: Befehle und Argumente werden mit `:` verbunden,
//! es gibt kein Laengenfeld und keinen Terminator.
//!
//! - [`codec`] – Umwandlung zwischen Bytes und Protokolltext
//! - [`control`] – Befehle (`Request`) und Antworten (`Reply`)
//! - [`wire`] – inkrementelles Framing als tokio-util Codecs

pub mod codec;
pub mod control;
pub mod wire;

pub use control::{PeerRolle, Reply, Request};
pub use wire::{Eingang, RendezvousCodec, ReplyCodec, WireError, RUHEPAUSE};
