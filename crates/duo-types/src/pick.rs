/// Deterministic content selection.
///
/// Both clients must unlock the *same* love note / challenge / quiz question
/// for a given day without coordinating, so the choice is a pure function of
/// a seed string. The hash is FNV-1a over the seed's UTF-16 code units with
/// 32-bit wraparound — the exact arithmetic the original web client performed
/// with `Math.imul`, kept bit-for-bit so documents written by either
/// implementation agree.

const FNV_OFFSET_BASIS: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

/// 32-bit FNV-1a of the seed, folding in UTF-16 code units.
pub fn fnv1a_utf16(seed: &str) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for unit in seed.encode_utf16() {
        h ^= u32::from(unit);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Stable index into a list of `len` elements. `len` must be non-zero.
pub fn pick_index(len: usize, seed: &str) -> usize {
    debug_assert!(len > 0, "pick_index on an empty list");
    // The original takes |h| of the signed 32-bit hash before the modulo.
    (fnv1a_utf16(seed) as i32).unsigned_abs() as usize % len
}

/// Pick the same element for the same seed, on every client, forever.
pub fn pick<'a>(list: &[&'a str], seed: &str) -> &'a str {
    list[pick_index(list.len(), seed)]
}

/// Shared seed prefix for a given day in a given room. Each feature appends
/// its own suffix (`|LOVE`, `|CHALLENGE`, `|QUIZ`) so the three picks are
/// independent.
pub fn daily_seed(date_key: &str, target_iso: &str, room_code: &str) -> String {
    let target = if target_iso.is_empty() { "no-target" } else { target_iso };
    format!("{date_key}|{target}|ROOM:{room_code}")
}
