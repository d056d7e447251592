//! The 20 character payment reference that carries an entity id through Bankgirot.
//!
//! The 12 id bytes are written as unpadded base32. Bankgirot echoes the text back in its
//! reports next to free text written by people, so decoding never fails loudly.

use crate::model::EntityId;
use data_encoding::BASE32_NOPAD;

pub const TOKEN_LEN: usize = 20;

pub fn encode(id: &EntityId) -> String {
    BASE32_NOPAD.encode(id.as_bytes())
}

/// Reads a token back. Anything that is not the base32 form of exactly 12 bytes gives `None`.
pub fn decode(token: &str) -> Option<EntityId> {
    let token = token.trim().to_ascii_uppercase();
    if token.is_empty() {
        return None;
    }
    let bytes = BASE32_NOPAD.decode(token.as_bytes()).ok()?;
    let bytes: [u8; 12] = bytes.try_into().ok()?;
    Some(EntityId::from_bytes(bytes))
}

/// Decodes `token` and returns the id only if it is one of `known`.
pub fn find_reference<'a>(
    token: &str,
    known: impl IntoIterator<Item = &'a EntityId>,
) -> Option<EntityId> {
    let id = decode(token)?;
    known.into_iter().find(|k| **k == id).copied()
}
