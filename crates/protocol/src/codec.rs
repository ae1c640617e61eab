//! Nachrichten-Codec
//!
//! Wandelt Bytepuffer in Protokolltext um und zurueck. Der Puffer kann
//! hinter der logischen Nachricht Nullbytes oder Reste enthalten, deshalb
//! wird immer eine explizite gueltige Laenge mitgegeben.
//!
//! Kodierung ist UTF-8. Ungueltige Sequenzen werden durch U+FFFD ersetzt,
//! die Umwandlung schlaegt nie fehl.

/// Dekodiert die ersten `gueltige_laenge` Bytes eines Puffers
///
/// Ein fehlender Puffer ergibt einen leeren String. Eine Laenge groesser
/// als der Puffer wird auf die Puffergroesse begrenzt.
pub fn bytes_zu_text(puffer: Option<&[u8]>, gueltige_laenge: usize) -> String {
    match puffer {
        Some(bytes) => {
            let ende = gueltige_laenge.min(bytes.len());
            String::from_utf8_lossy(&bytes[..ende]).into_owned()
        }
        None => String::new(),
    }
}

/// Kodiert Protokolltext als Bytes
pub fn text_zu_bytes(text: Option<&str>) -> Vec<u8> {
    text.map(|t| t.as_bytes().to_vec()).unwrap_or_default()
}
