//! Common types used throughout objstore.

use std::collections::HashMap;

/// User metadata attached to a stored object.
///
/// Keys are case-insensitive at the wire boundary; every backend stores and
/// returns them lowercased. An absent map is always represented as an empty
/// map, never as `None`.
pub type Metadata = HashMap<String, String>;

/// Check that `key` can name an object.
///
/// Keys are opaque byte strings except that no `/`-separated segment may be
/// `.` or `..`: HTTP backends address objects by URL path, where such
/// segments are resolved away before the request is sent.
///
/// # Preconditions
/// - `key` must be non-empty
/// - No segment of `key` may be `.` or `..`
///
/// # Errors
/// - Returns `InvalidInput` if either precondition fails
pub fn validate_key(key: &str) -> crate::Result<()> {
    if key.is_empty() {
        return Err(crate::Error::InvalidInput(
            "Object key cannot be empty".to_string(),
        ));
    }
    if key.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(crate::Error::InvalidInput(format!(
            "Object key '{}' contains a '.' or '..' segment",
            key
        )));
    }
    Ok(())
}

/// Copy `metadata` with every key folded to ASCII lowercase.
///
/// When two keys fold to the same name the lexicographically greatest
/// original key wins, so the result does not depend on map iteration order.
pub fn normalize_metadata(metadata: &Metadata) -> Metadata {
    let mut originals: Vec<(&String, &String)> = metadata.iter().collect();
    originals.sort();
    originals
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
        .collect()
}
