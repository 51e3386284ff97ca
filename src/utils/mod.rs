// Returns a new random UUID in canonical hyphenated form.
pub fn must_get_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
