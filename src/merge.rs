use serde_yaml::{Mapping, Value};

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a Mapping for the same key, recurse.
/// Otherwise, `overlay`'s value wins. Keys keep their first-seen position.
pub fn deep_merge(mut base: Mapping, overlay: Mapping) -> Mapping {
    for (key, overlay_val) in overlay {
        if let Some(base_val) = base.get_mut(&key) {
            merge_value(base_val, overlay_val);
        } else {
            base.insert(key, overlay_val);
        }
    }
    base
}

fn merge_value(slot: &mut Value, overlay: Value) {
    match (slot, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            *base_map = deep_merge(std::mem::take(base_map), overlay_map);
        }
        (slot, overlay) => *slot = overlay,
    }
}
