/// Room codes.
///
/// Two formats coexist: the generated 8-character format (unambiguous
/// alphabet, no dashes) and the legacy hand-picked dash-separated format
/// from the original fixed-room deployment. Everything that reads a code
/// goes through `normalize`; generation only ever emits the new format.

use rand::Rng;

/// The single pre-existing room from before codes were user-visible. It gets
/// a write-authorization carve-out in the store rules.
pub const LEGACY_ROOM_CODE: &str = "gauthier-lea-2026-coeur";

pub const CODE_LEN: usize = 8;

/// i, l, o, 0 and 1 are excluded — codes get read out loud over the phone.
const ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

/// Canonical form of user input: trimmed, lowercased, whitespace runs
/// collapsed to a dash, everything outside `[a-z0-9-]` dropped.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            pending_dash = !out.is_empty();
            continue;
        }
        for lower in ch.to_lowercase() {
            if lower.is_ascii_lowercase() || lower.is_ascii_digit() || lower == '-' {
                if pending_dash {
                    out.push('-');
                    pending_dash = false;
                }
                out.push(lower);
            }
        }
    }
    out
}

/// A normalized, non-empty code.
pub fn is_valid(code: &str) -> bool {
    !code.is_empty() && code == normalize(code)
}

/// Fresh 8-character room code.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
