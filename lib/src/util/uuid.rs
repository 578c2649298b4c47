/// High-level UUID generating function.
///
/// This generates a UUID V4, which is just made of random bytes, so it can be
/// used for identifiers that must not reveal any metadata.
#[inline]
pub fn generate_uuid() -> uuid::Uuid {
    uuid::Uuid::new_v4()
}
