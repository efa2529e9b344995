// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Helpers for projecting typed values into output documents.
//!
//! Output documents are plain JSON objects. Absent values are never written
//! as `null`: they remove the key instead, and so do empty objects and
//! arrays. Empty strings are kept.

use serde_json::{Map, Value};

/// A JSON object used as an output document or a sub-object of one.
pub type Fields = Map<String, Value>;

/// Set `key` to `value`, or remove it when the value is absent or empty.
pub fn set(fields: &mut Fields, key: &str, value: Option<Value>) {
	match value {
		Some(value) if !is_empty_value(&value) => {
			fields.insert(key.to_string(), value);
		}
		_ => {
			fields.remove(key);
		}
	}
}

/// Set `key` to a string value when present.
pub fn set_str(fields: &mut Fields, key: &str, value: Option<&str>) {
	set(fields, key, value.map(|v| Value::String(v.to_string())));
}

/// Set `key` to a sub-object when present and non-empty.
pub fn set_object(fields: &mut Fields, key: &str, value: Option<Fields>) {
	set(fields, key, value.map(Value::Object));
}

/// Shallow-merge `value` into the object at `key`.
///
/// Keys of `value` replace same-named keys of the existing object; nested
/// objects are replaced, not merged. If `key` holds no object, this behaves
/// like [`set_object`].
pub fn update(fields: &mut Fields, key: &str, value: Option<Fields>) {
	if let Some(Value::Object(existing)) = fields.get_mut(key) {
		if let Some(value) = value {
			existing.extend(value);
		}
		return;
	}
	set_object(fields, key, value);
}

/// Recursively merge `value` into the object at `key`.
///
/// Nested objects are merged key by key; on any other collision the value
/// from `value` wins. If `key` holds no object, this behaves like
/// [`set_object`].
pub fn deep_update(fields: &mut Fields, key: &str, value: Option<Fields>) {
	if let Some(Value::Object(existing)) = fields.get_mut(key) {
		if let Some(value) = value {
			deep_merge(existing, value);
		}
		return;
	}
	set_object(fields, key, value);
}

/// Merge `source` into `target`, recursing into objects present on both sides.
pub fn deep_merge(target: &mut Fields, source: Fields) {
	for (key, value) in source {
		match (target.get_mut(&key), value) {
			(Some(Value::Object(existing)), Value::Object(incoming)) => {
				deep_merge(existing, incoming);
			}
			(_, value) => {
				target.insert(key, value);
			}
		}
	}
}

/// Write `{key: {"id": id}}` when the id is present and non-empty.
pub fn add_id(fields: &mut Fields, key: &str, id: Option<&str>) {
	if let Some(id) = id.filter(|id| !id.is_empty()) {
		let mut object = Fields::new();
		object.insert("id".to_string(), Value::String(id.to_string()));
		fields.insert(key.to_string(), Value::Object(object));
	}
}

fn is_empty_value(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Object(map) => map.is_empty(),
		Value::Array(items) => items.is_empty(),
		_ => false,
	}
}
