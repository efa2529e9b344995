// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Culprit resolution from source-mapped stack frames.

use crate::event::ErrorEvent;
use crate::stacktrace::{Frame, Stacktrace};

/// Overwrite the event culprit with the first source-mapped application frame.
///
/// Does nothing unless source map lookups are enabled. The log stacktrace is
/// searched before the exception stacktrace. When no frame qualifies, the
/// agent-supplied culprit is kept.
pub fn resolve_culprit(event: &mut ErrorEvent, sourcemap_enabled: bool) {
	if !sourcemap_enabled {
		return;
	}

	let culprit = event
		.log
		.as_ref()
		.and_then(|log| find_sourcemapped_app_frame(&log.stacktrace))
		.or_else(|| {
			event
				.exception
				.as_ref()
				.and_then(|ex| find_sourcemapped_app_frame(&ex.stacktrace))
		})
		.map(format_culprit);

	if culprit.is_some() {
		event.culprit = culprit;
	}
}

/// First frame that was source mapped and is not a library frame.
pub fn find_sourcemapped_app_frame(stacktrace: &Stacktrace) -> Option<&Frame> {
	stacktrace
		.iter()
		.find(|f| f.is_sourcemap_applied() && !f.is_library_frame())
}

fn format_culprit(frame: &Frame) -> String {
	match &frame.function {
		Some(function) => format!("{} in {}", frame.filename, function),
		None => frame.filename.clone(),
	}
}
