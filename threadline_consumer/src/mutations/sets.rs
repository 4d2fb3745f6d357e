//! Set-like operations on id lists stored as JSON arrays.

/// Appends `id` unless it is already present. Returns whether the list changed.
pub fn insert_unique(list: &mut Vec<String>, id: &str) -> bool {
    if list.iter().any(|existing| existing == id) {
        return false;
    }
    list.push(id.to_string());
    true
}

/// Removes the first occurrence of `id`. Returns whether the list changed.
pub fn remove_first(list: &mut Vec<String>, id: &str) -> bool {
    match list.iter().position(|existing| existing == id) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}
