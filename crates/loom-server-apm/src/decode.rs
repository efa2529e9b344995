// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field-level decoding of loosely typed intake records.
//!
//! [`FieldDecoder`] never stops at the first bad field. Every accessor records
//! a [`FieldError`] and returns `None` when a value has the wrong shape, so a
//! single pass over a record reports everything that is wrong with it.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use loom_apm_core::{Frame, Stacktrace};

use crate::error::{FieldError, FieldErrorKind, FieldErrors};

/// A decoded JSON object.
pub type Object = Map<String, Value>;

#[derive(Debug, Default)]
pub struct FieldDecoder {
	scope: String,
	errors: Vec<FieldError>,
}

impl FieldDecoder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Run `f` with `name` appended to the path used in error reports.
	pub fn scoped<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> T) -> T {
		let len = self.scope.len();
		if !self.scope.is_empty() {
			self.scope.push('.');
		}
		self.scope.push_str(name);
		let out = f(self);
		self.scope.truncate(len);
		out
	}

	pub fn string(&mut self, obj: Option<&Object>, key: &str) -> Option<String> {
		match lookup(obj, key)? {
			Value::String(s) => Some(s.clone()),
			_ => self.invalid(key, "string"),
		}
	}

	pub fn bool(&mut self, obj: Option<&Object>, key: &str) -> Option<bool> {
		match lookup(obj, key)? {
			Value::Bool(b) => Some(*b),
			_ => self.invalid(key, "bool"),
		}
	}

	/// Integers, including floats without a fractional part.
	pub fn int(&mut self, obj: Option<&Object>, key: &str) -> Option<i64> {
		let value = lookup(obj, key)?;
		let int = value.as_i64().or_else(|| {
			value
				.as_f64()
				.filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
				.map(|f| f as i64)
		});
		match int {
			Some(int) => Some(int),
			None => self.invalid(key, "integer"),
		}
	}

	pub fn object<'a>(&mut self, obj: Option<&'a Object>, key: &str) -> Option<&'a Object> {
		match lookup(obj, key)? {
			Value::Object(map) => Some(map),
			_ => self.invalid(key, "object"),
		}
	}

	/// Any non-null value, passed through untouched.
	pub fn value(&mut self, obj: Option<&Object>, key: &str) -> Option<Value> {
		lookup(obj, key).cloned()
	}

	pub fn string_vec(&mut self, obj: Option<&Object>, key: &str) -> Vec<String> {
		let Some(value) = lookup(obj, key) else {
			return Vec::new();
		};
		let strings = value.as_array().and_then(|items| {
			items
				.iter()
				.map(|item| item.as_str().map(String::from))
				.collect::<Option<Vec<_>>>()
		});
		match strings {
			Some(strings) => strings,
			None => {
				self.record(key, FieldErrorKind::InvalidType {
					expected: "array of strings",
				});
				Vec::new()
			}
		}
	}

	/// Epoch microseconds.
	pub fn timestamp_micros(&mut self, obj: Option<&Object>, key: &str) -> Option<DateTime<Utc>> {
		let value = lookup(obj, key)?;
		let micros = value
			.as_i64()
			.or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64));
		match micros.and_then(DateTime::from_timestamp_micros) {
			Some(ts) => Some(ts),
			None => {
				self.record(key, FieldErrorKind::InvalidTimestamp);
				None
			}
		}
	}

	pub fn error_count(&self) -> usize {
		self.errors.len()
	}

	/// Consume the decoder, returning every recorded error.
	pub fn finish(self) -> Result<(), FieldErrors> {
		if self.errors.is_empty() {
			Ok(())
		} else {
			Err(FieldErrors(self.errors))
		}
	}

	fn invalid<T>(&mut self, key: &str, expected: &'static str) -> Option<T> {
		self.record(key, FieldErrorKind::InvalidType { expected });
		None
	}

	fn record(&mut self, key: &str, kind: FieldErrorKind) {
		let field = if self.scope.is_empty() {
			key.to_string()
		} else {
			format!("{}.{}", self.scope, key)
		};
		self.errors.push(FieldError { field, kind });
	}
}

fn lookup<'a>(obj: Option<&'a Object>, key: &str) -> Option<&'a Value> {
	obj?.get(key).filter(|v| !v.is_null())
}

/// Decode the frames under `key`.
///
/// An absent stacktrace is empty. If the value is not an array, or any frame
/// is malformed, the errors are recorded and the stacktrace is empty.
pub fn decode_stacktrace(d: &mut FieldDecoder, obj: Option<&Object>, key: &str) -> Stacktrace {
	let Some(value) = lookup(obj, key) else {
		return Stacktrace::default();
	};
	let Some(items) = value.as_array() else {
		d.invalid::<()>(key, "array");
		return Stacktrace::default();
	};

	let before = d.error_count();
	let frames: Vec<Frame> = d.scoped(key, |d| {
		items
			.iter()
			.enumerate()
			.filter_map(|(idx, item)| {
				let idx = idx.to_string();
				match item.as_object() {
					Some(frame) => Some(d.scoped(&idx, |d| decode_frame(d, frame))),
					None => d.invalid(&idx, "object"),
				}
			})
			.collect()
	});

	if d.error_count() > before {
		Stacktrace::default()
	} else {
		Stacktrace::new(frames)
	}
}

fn decode_frame(d: &mut FieldDecoder, raw: &Object) -> Frame {
	let raw = Some(raw);
	Frame {
		abs_path: d.string(raw, "abs_path"),
		filename: d.string(raw, "filename").unwrap_or_default(),
		classname: d.string(raw, "classname"),
		lineno: d.int(raw, "lineno"),
		colno: d.int(raw, "colno"),
		context_line: d.string(raw, "context_line"),
		module: d.string(raw, "module"),
		function: d.string(raw, "function"),
		library_frame: d.bool(raw, "library_frame"),
		vars: d.object(raw, "vars").cloned(),
		pre_context: d.string_vec(raw, "pre_context"),
		post_context: d.string_vec(raw, "post_context"),
		..Default::default()
	}
}
