//! Path-addressed reads and writes over a `serde_json::Value` data tree.
//!
//! `null` stands for "absent": reads report it as `None`, and array holes
//! created by writing past the end of an array are filled with it.

use crate::path::{Path, Segment};
use serde_json::{Map, Value};

/// Read the value at `path`. Missing members, out-of-range indices,
/// descending through scalars and `null` values all read as `None`.
pub fn get_at<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    get_at_segments(root, path.segments())
}

pub fn get_at_segments<'a>(root: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match (current, segment) {
            (Value::Object(obj), Segment::Key(key)) => obj.get(key)?,
            (Value::Array(arr), Segment::Index(idx)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

/// Check that writing at `path` would not have to descend through an
/// existing value of the wrong container kind. Returns the offending prefix.
pub fn first_blocking_prefix(root: &Value, path: &Path) -> Option<(Path, &'static str)> {
    let mut current = Some(root);
    let mut walked = Path::root();
    for segment in path {
        let Some(node) = current.filter(|v| !v.is_null()) else {
            return None;
        };
        let next = match (node, segment) {
            (Value::Object(obj), Segment::Key(key)) => obj.get(key),
            (Value::Array(arr), Segment::Index(idx)) => arr.get(*idx),
            (_, Segment::Key(_)) => return Some((walked, "an object")),
            (_, Segment::Index(_)) => return Some((walked, "an array")),
        };
        walked.push(segment.clone());
        current = next;
    }
    None
}

/// Write `value` at `path`, creating intermediate containers as needed.
///
/// Key segments create objects, index segments create arrays; writing past
/// the end of an array pads it with `null`. Callers must run
/// [`first_blocking_prefix`] first: a scalar in the way is replaced.
pub fn set_at(root: &mut Value, path: &Path, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return;
    };
    let mut current = root;
    for (idx, segment) in parents.iter().enumerate() {
        let next_is_index = matches!(path.segments()[idx + 1], Segment::Index(_));
        current = descend_or_create(current, segment, next_is_index);
    }
    match last {
        Segment::Key(key) => {
            ensure_object(current).insert(key.clone(), value);
        }
        Segment::Index(idx) => {
            let arr = ensure_array(current);
            if arr.len() <= *idx {
                arr.resize(*idx + 1, Value::Null);
            }
            arr[*idx] = value;
        }
    }
}

fn descend_or_create<'a>(current: &'a mut Value, segment: &Segment, next_is_index: bool) -> &'a mut Value {
    let empty = || {
        if next_is_index {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    };
    let slot = match segment {
        Segment::Key(key) => ensure_object(current).entry(key.clone()).or_insert_with(empty),
        Segment::Index(idx) => {
            let arr = ensure_array(current);
            if arr.len() <= *idx {
                arr.resize(*idx + 1, Value::Null);
            }
            &mut arr[*idx]
        }
    };
    if slot.is_null() {
        *slot = empty();
    }
    slot
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(obj) => obj,
        _ => unreachable!("value was just replaced with an object"),
    }
}

fn ensure_array(value: &mut Value) -> &mut Vec<Value> {
    if !value.is_array() {
        *value = Value::Array(Vec::new());
    }
    match value {
        Value::Array(arr) => arr,
        _ => unreachable!("value was just replaced with an array"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn get_treats_null_as_absent() {
        let data = json!({"a": {"b": null, "c": [1, null]}});
        assert_eq!(get_at(&data, &path!["a", "b"]), None);
        assert_eq!(get_at(&data, &path!["a", "c", 0]), Some(&json!(1)));
        assert_eq!(get_at(&data, &path!["a", "c", 1]), None);
        assert_eq!(get_at(&data, &path!["a", "c", 9]), None);
        assert_eq!(get_at(&data, &path!["a", "c", "x"]), None);
    }

    #[test]
    fn set_creates_containers_and_pads_arrays() {
        let mut data = json!({});
        set_at(&mut data, &path!["arr", 2, "field"], json!("v"));
        assert_eq!(data, json!({"arr": [null, null, {"field": "v"}]}));

        set_at(&mut data, &path!["arr", 0, "field"], json!("w"));
        assert_eq!(data, json!({"arr": [{"field": "w"}, null, {"field": "v"}]}));
    }

    #[test]
    fn set_at_root_replaces_everything() {
        let mut data = json!({"a": 1});
        set_at(&mut data, &Path::root(), json!({"b": 2}));
        assert_eq!(data, json!({"b": 2}));
    }

    #[test]
    fn blocking_prefix_reports_scalars_in_the_way() {
        let data = json!({"name": "x", "list": [1]});
        assert_eq!(
            first_blocking_prefix(&data, &path!["name", "first"]),
            Some((path!["name"], "an object"))
        );
        assert_eq!(
            first_blocking_prefix(&data, &path!["list", 0, "k"]),
            Some((path!["list", 0], "an object"))
        );
        assert_eq!(first_blocking_prefix(&data, &path!["other", 3, "k"]), None);
    }
}
