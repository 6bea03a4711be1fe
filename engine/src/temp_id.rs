//! Client-side placeholder ids for optimistically created entities.

use uuid::Uuid;

/// Prefix carried by every client-generated id.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Generate a fresh placeholder id.
pub fn generate_temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4().simple())
}

/// Whether `id` was generated by [`generate_temp_id`].
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}
