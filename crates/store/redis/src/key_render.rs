/// Render a caller key into a Redis key string with the given prefix.
///
/// The format is `prefix:key`, or `key` unchanged when the prefix is empty.
pub fn render_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}:{key}")
    }
}
