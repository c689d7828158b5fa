//! Invite codes for joining task lists
//!
//! Codes are 8 characters drawn uniformly from `0-9A-Z` using the thread-local
//! CSPRNG (OS-seeded ChaCha), giving roughly 41 bits per code. Uniqueness is
//! enforced by the database; callers retry on collision.

use rand::Rng;

/// Invite code length
pub const INVITE_CODE_LENGTH: usize = 8;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates a fresh uppercase base-36 invite code
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Normalizes user input for lookup: trims and uppercases
///
/// Joining is case-insensitive, so `ab12cd34` finds `AB12CD34`.
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Whether `code` has the shape of an invite code (after normalization)
pub fn is_valid_invite_code(code: &str) -> bool {
    code.len() == INVITE_CODE_LENGTH && code.bytes().all(|b| ALPHABET.contains(&b))
}
