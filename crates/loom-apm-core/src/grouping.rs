// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grouping keys for clustering operationally identical errors.

use md5::{Digest, Md5};

use crate::event::ErrorEvent;
use crate::stacktrace::Stacktrace;

/// Running digest plus whether anything has been fed into it yet.
#[derive(Debug, Clone)]
pub struct GroupingKey {
	hasher: Md5,
	empty: bool,
}

impl GroupingKey {
	pub fn new() -> Self {
		Self {
			hasher: Md5::new(),
			empty: true,
		}
	}

	/// Feed `value` if present. Returns whether anything was fed.
	pub fn add(&mut self, value: Option<&str>) -> bool {
		match value {
			Some(value) => {
				self.hasher.update(value.as_bytes());
				self.empty = false;
				true
			}
			None => false,
		}
	}

	/// Feed `value`, or `fallback` when `value` is absent.
	pub fn add_either(&mut self, value: Option<&str>, fallback: &str) {
		if !self.add(value) {
			self.add(Some(fallback));
		}
	}

	pub fn is_empty(&self) -> bool {
		self.empty
	}

	/// Hex encoding of the digest.
	pub fn finish(self) -> String {
		hex::encode(self.hasher.finalize())
	}
}

impl Default for GroupingKey {
	fn default() -> Self {
		Self::new()
	}
}

/// Compute the grouping key of an error event.
///
/// The key is built from:
/// 1. Exception type
/// 2. Log parameterized message
/// 3. Non-excluded frames of the exception stacktrace, or of the log
///    stacktrace when the exception has none: module (else filename), then
///    function (else line number)
///
/// Only if none of those contributed, the exception message (or, without an
/// exception, the log message) is used instead.
pub fn compute_grouping_key(event: &ErrorEvent) -> String {
	let mut key = GroupingKey::new();

	let mut stacktrace: Option<&Stacktrace> = None;
	if let Some(exception) = &event.exception {
		key.add(exception.exception_type.as_deref());
		stacktrace = Some(&exception.stacktrace);
	}
	if let Some(log) = &event.log {
		key.add(log.param_message.as_deref());
		if stacktrace.map_or(true, Stacktrace::is_empty) {
			stacktrace = Some(&log.stacktrace);
		}
	}

	for frame in stacktrace
		.into_iter()
		.flat_map(|st| st.frames.iter())
		.filter(|f| !f.exclude_from_grouping)
	{
		key.add_either(frame.module.as_deref(), &frame.filename);
		key.add_either(
			frame.function.as_deref(),
			&frame.lineno.unwrap_or_default().to_string(),
		);
	}

	if key.is_empty() {
		if let Some(exception) = &event.exception {
			key.add(exception.message.as_deref());
		} else if let Some(log) = &event.log {
			key.add(Some(log.message.as_str()));
		}
	}

	key.finish()
}
