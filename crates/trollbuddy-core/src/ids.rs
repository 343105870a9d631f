//! Identifier generation.
//!
//! Session ids are random UUIDs generated client-side. Push keys mimic the
//! realtime-database scheme: an 8 character timestamp prefix followed by 12
//! random characters, so that lexical order follows insertion time.

use uuid::Uuid;

use crate::db::unix_timestamp_millis;

/// Alphabet used for push keys. Ordered so that lexical comparison matches
/// numeric comparison of the encoded timestamp.
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Generate a new collision-resistant session id.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new time-ordered push key for a child record.
pub fn push_key() -> String {
    push_key_at(unix_timestamp_millis())
}

/// Generate a push key with an explicit timestamp prefix.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn push_key_at(timestamp_ms: i64) -> String {
    let mut key = String::with_capacity(20);

    let mut ts = timestamp_ms.max(0) as u64;
    let mut prefix = [0u8; 8];
    for slot in prefix.iter_mut().rev() {
        *slot = PUSH_CHARS[(ts % 64) as usize];
        ts /= 64;
    }
    key.extend(prefix.iter().map(|&b| b as char));

    let random = Uuid::new_v4();
    for byte in random.as_bytes().iter().take(12) {
        key.push(PUSH_CHARS[usize::from(byte & 0x3F)] as char);
    }

    key
}
