// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stacktrace and frame types.

use serde_json::{Map, Value};

/// Ordered frames, outermost call first (the order agents report them in).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stacktrace {
	pub frames: Vec<Frame>,
}

impl Stacktrace {
	pub fn new(frames: Vec<Frame>) -> Self {
		Self { frames }
	}

	pub fn len(&self) -> usize {
		self.frames.len()
	}

	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Frame> {
		self.frames.iter()
	}
}

/// A single stack frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
	pub abs_path: Option<String>,
	/// Empty when the agent did not send one.
	pub filename: String,
	pub classname: Option<String>,
	pub lineno: Option<i64>,
	pub colno: Option<i64>,
	pub context_line: Option<String>,
	pub module: Option<String>,
	pub function: Option<String>,
	/// Agent-supplied, possibly overridden by the server's library pattern.
	pub library_frame: Option<bool>,
	pub vars: Option<Map<String, Value>>,
	pub pre_context: Vec<String>,
	pub post_context: Vec<String>,
	/// Set by server-side rules; excluded frames don't contribute to grouping.
	pub exclude_from_grouping: bool,
	pub sourcemap: FrameSourcemap,
	/// Values as reported by the agent, before any server-side rewrite.
	pub original: OriginalFrame,
}

impl Frame {
	/// Whether the frame belongs to third-party/vendor code.
	pub fn is_library_frame(&self) -> bool {
		self.library_frame == Some(true)
	}

	/// Whether a source map rewrite has been applied to this frame.
	pub fn is_sourcemap_applied(&self) -> bool {
		self.sourcemap.updated == Some(true)
	}
}

/// Outcome of applying a source map to a frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSourcemap {
	pub updated: Option<bool>,
	pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OriginalFrame {
	pub abs_path: Option<String>,
	pub filename: Option<String>,
	pub classname: Option<String>,
	pub lineno: Option<i64>,
	pub colno: Option<i64>,
	pub function: Option<String>,
	pub library_frame: Option<bool>,
}
