//! JSON tree helpers shared by the local store backends.

use serde_json::{Map, Value};

use super::StoreError;

/// Characters a path segment may not contain.
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// Split a slash-delimited path into its segments.
///
/// Leading, trailing and repeated slashes are ignored; an empty path is the
/// root.
pub fn split(path: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| s.contains(FORBIDDEN)) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Canonical form of a path (segments joined by single slashes).
pub fn join(segments: &[&str]) -> String {
    segments.join("/")
}

/// Drop `null` leaves and empty objects. Returns `None` when nothing is left.
pub fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        other => Some(other),
    }
}

/// Borrow the node at `segments`.
pub fn get_at<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, seg| node.as_object()?.get(*seg))
}

/// Replace the node at `segments`, creating intermediate objects and
/// overwriting non-object ancestors. A `None` value removes the node.
pub fn set_at(root: &mut Value, segments: &[&str], value: Option<Value>) {
    let Some((last, parents)) = segments.split_last() else {
        *root = value.unwrap_or_else(|| Value::Object(Map::new()));
        return;
    };

    if value.is_none() {
        remove_at(root, segments);
        return;
    }

    let mut node = root;
    for seg in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        node = map
            .entry((*seg).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let (Value::Object(map), Some(value)) = (node, value) {
        map.insert((*last).to_string(), value);
    }
}

/// Remove the node at `segments` and prune ancestors left empty.
pub fn remove_at(root: &mut Value, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        *root = Value::Object(Map::new());
        return;
    };
    let Value::Object(map) = root else {
        return;
    };

    if rest.is_empty() {
        map.remove(*first);
        return;
    }

    let now_empty = match map.get_mut(*first) {
        Some(child) => {
            remove_at(child, rest);
            child.as_object().is_some_and(Map::is_empty)
        }
        None => false,
    };
    if now_empty {
        map.remove(*first);
    }
}

/// Flatten a value into `(path, leaf)` pairs rooted at `prefix`.
pub fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}/{key}")
                };
                flatten(&path, child, out);
            }
        }
        Value::Null => {}
        leaf => out.push((prefix.to_string(), leaf.clone())),
    }
}
