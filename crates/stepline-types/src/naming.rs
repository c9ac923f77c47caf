//! Collision-resistant step names.

use uuid::Uuid;

/// Longest name a generated step name may have. Deployed function names are
/// capped at 64 characters; one is kept free for suffixes.
pub const MAX_STEP_NAME_LEN: usize = 63;

/// Append a random UUID to `base`, truncating `base` so the result fits in
/// `max_len` characters.
///
/// The UUID itself is never truncated. If `max_len` cannot hold the UUID and a
/// separator, the bare UUID is returned.
pub fn unique_step_name(base: &str, max_len: usize) -> String {
    let unique = Uuid::new_v4().to_string();
    let room = max_len.saturating_sub(unique.len() + 1);
    let trimmed: String = base.chars().take(room).collect();
    if trimmed.is_empty() {
        unique
    } else {
        format!("{trimmed}-{unique}")
    }
}
