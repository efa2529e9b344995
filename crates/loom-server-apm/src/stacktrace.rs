// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side stack frame rewriting and projection.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};

use loom_apm_core::fields::{set, set_object, set_str, Fields};
use loom_apm_core::{Frame, OriginalFrame, Service, Stacktrace};

use crate::error::SourcemapError;
use crate::sourcemap::{clean_url_path, SourcemapId, SourcemapMapper};
use crate::transform::TransformContext;

const ANONYMOUS_FUNCTION: &str = "<anonymous>";

/// Rewrites frames in place and projects them into output documents.
pub trait StacktraceTransformer: Send + Sync {
	/// Apply server-side rules to `stacktrace` and return one document per
	/// frame, in the original order.
	fn transform(&self, stacktrace: &mut Stacktrace, ctx: &TransformContext<'_>) -> Vec<Value>;
}

/// Source mapping, library detection and grouping exclusion, driven by config.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTransformer;

impl StacktraceTransformer for FrameTransformer {
	#[instrument(skip(self, stacktrace, ctx), fields(frame_count = stacktrace.len()))]
	fn transform(&self, stacktrace: &mut Stacktrace, ctx: &TransformContext<'_>) -> Vec<Value> {
		let config = ctx.config;

		if let (Some(mapper), Some(service)) =
			(config.sourcemap_mapper.as_deref(), ctx.metadata.service())
		{
			// Function names shift by one frame: a frame is named after the
			// mapping of the frame it calls.
			let mut function = None;
			for frame in stacktrace.frames.iter_mut().rev() {
				function = apply_sourcemap(frame, mapper, service, function);
			}
		}

		stacktrace
			.frames
			.iter_mut()
			.map(|frame| {
				if let Some(pattern) = &config.library_pattern {
					set_library_frame(frame, pattern);
				}
				if let Some(pattern) = &config.exclude_from_grouping {
					set_exclude_from_grouping(frame, pattern);
				}
				Value::Object(frame_fields(frame))
			})
			.collect()
	}
}

/// Map one frame, returning the function name to hand to the next frame.
fn apply_sourcemap(
	frame: &mut Frame,
	mapper: &dyn SourcemapMapper,
	service: &Service,
	function: Option<String>,
) -> Option<String> {
	frame.original = OriginalFrame {
		abs_path: frame.abs_path.clone(),
		filename: Some(frame.filename.clone()),
		classname: frame.classname.clone(),
		lineno: frame.lineno,
		colno: frame.colno,
		function: frame.function.clone(),
		library_frame: frame.original.library_frame,
	};

	let position = match (frame.colno, frame.lineno, frame.abs_path.as_deref()) {
		(None, _, _) => Err(SourcemapError::MissingPosition("colno")),
		(_, None, _) => Err(SourcemapError::MissingPosition("lineno")),
		(_, _, None) => Err(SourcemapError::MissingPosition("abs_path")),
		(Some(colno), Some(lineno), Some(abs_path)) => Ok((colno, lineno, abs_path)),
	};

	let result = position.and_then(|(colno, lineno, abs_path)| {
		let id = SourcemapId {
			service_name: service.name.clone().unwrap_or_default(),
			service_version: service.version.clone().unwrap_or_default(),
			path: clean_url_path(abs_path).to_string(),
		};
		mapper.apply(&id, lineno, colno).map(|mapping| (id, mapping))
	});

	match result {
		Ok((id, mapping)) => {
			debug!(
				path = %id.path,
				lineno = mapping.lineno,
				colno = mapping.colno,
				"Applied source map to frame"
			);
			if !mapping.filename.is_empty() {
				frame.filename = mapping.filename;
			}
			frame.lineno = Some(mapping.lineno);
			frame.colno = Some(mapping.colno);
			frame.abs_path = Some(id.path);
			frame.function = Some(function.unwrap_or_else(|| ANONYMOUS_FUNCTION.to_string()));
			frame.sourcemap.updated = Some(true);
			frame.sourcemap.error = None;
			mapping.function
		}
		Err(e) => {
			debug!(error = %e, filename = %frame.filename, "Source map not applied to frame");
			frame.sourcemap.updated = Some(false);
			frame.sourcemap.error = Some(e.to_string());
			function
		}
	}
}

fn set_library_frame(frame: &mut Frame, pattern: &Regex) {
	let is_library = pattern.is_match(&frame.filename)
		|| frame.abs_path.as_deref().is_some_and(|p| pattern.is_match(p));
	frame.original.library_frame = frame.library_frame;
	frame.library_frame = Some(is_library);
}

fn set_exclude_from_grouping(frame: &mut Frame, pattern: &Regex) {
	frame.exclude_from_grouping = !frame.filename.is_empty() && pattern.is_match(&frame.filename);
}

fn frame_fields(frame: &Frame) -> Fields {
	let mut fields = Fields::new();
	fields.insert("filename".to_string(), Value::String(frame.filename.clone()));
	set_str(&mut fields, "abs_path", frame.abs_path.as_deref());
	set_str(&mut fields, "module", frame.module.as_deref());
	set_str(&mut fields, "function", frame.function.as_deref());
	set_object(&mut fields, "vars", frame.vars.clone());
	set(&mut fields, "library_frame", frame.library_frame.map(Value::Bool));
	fields.insert(
		"exclude_from_grouping".to_string(),
		Value::Bool(frame.exclude_from_grouping),
	);

	let mut context = Fields::new();
	set(&mut context, "pre", strings(&frame.pre_context));
	set(&mut context, "post", strings(&frame.post_context));
	set_object(&mut fields, "context", Some(context));

	let mut line = Fields::new();
	set(&mut line, "number", frame.lineno.map(Value::from));
	set(&mut line, "column", frame.colno.map(Value::from));
	set_str(&mut line, "context", frame.context_line.as_deref());
	set_object(&mut fields, "line", Some(line));

	let mut sourcemap = Fields::new();
	set(&mut sourcemap, "updated", frame.sourcemap.updated.map(Value::Bool));
	set_str(&mut sourcemap, "error", frame.sourcemap.error.as_deref());
	set_object(&mut fields, "sourcemap", Some(sourcemap));

	let original = &frame.original;
	let mut orig = Fields::new();
	set(&mut orig, "library_frame", original.library_frame.map(Value::Bool));
	if frame.is_sourcemap_applied() {
		set_str(&mut orig, "filename", original.filename.as_deref());
		set_str(&mut orig, "classname", original.classname.as_deref());
		set(&mut orig, "lineno", original.lineno.map(Value::from));
		set(&mut orig, "colno", original.colno.map(Value::from));
		set_str(&mut orig, "function", original.function.as_deref());
		set_str(&mut orig, "abs_path", original.abs_path.as_deref());
	}
	set_object(&mut fields, "original", Some(orig));

	fields
}

fn strings(values: &[String]) -> Option<Value> {
	if values.is_empty() {
		None
	} else {
		Some(Value::from(values.to_vec()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	use chrono::Utc;
	use serde_json::json;

	use crate::config::{ApmConfig, ApmConfigLayer};
	use crate::metadata::Metadata;
	use crate::sourcemap::{Mapping, StaticSourcemapMapper};

	fn frame(filename: &str, abs_path: Option<&str>, lineno: i64, colno: i64) -> Frame {
		Frame {
			filename: filename.to_string(),
			abs_path: abs_path.map(String::from),
			lineno: Some(lineno),
			colno: Some(colno),
			function: Some("minified".to_string()),
			..Default::default()
		}
	}

	fn service_metadata() -> Metadata {
		serde_json::from_value(json!({"service": {"name": "frontend", "version": "1.0.0"}})).unwrap()
	}

	fn mapper() -> StaticSourcemapMapper {
		let id = |path: &str| SourcemapId {
			service_name: "frontend".to_string(),
			service_version: "1.0.0".to_string(),
			path: path.to_string(),
		};
		let mut mapper = StaticSourcemapMapper::new();
		mapper.add(
			id("http://cdn/bundle.js"),
			1,
			0,
			Mapping {
				filename: "src/app.ts".to_string(),
				function: Some("render".to_string()),
				lineno: 10,
				colno: 2,
			},
		);
		mapper.add(
			id("http://cdn/bundle.js"),
			2,
			0,
			Mapping {
				filename: "src/main.ts".to_string(),
				function: Some("main".to_string()),
				lineno: 20,
				colno: 4,
			},
		);
		mapper
	}

	fn transform(stacktrace: &mut Stacktrace, config: &ApmConfig, metadata: &Metadata) -> Vec<Value> {
		let ctx = TransformContext {
			request_time: Utc::now(),
			metadata,
			config,
		};
		FrameTransformer.transform(stacktrace, &ctx)
	}

	fn plain_config() -> ApmConfig {
		ApmConfigLayer::default().finalize().unwrap()
	}

	#[test]
	fn test_projection_without_rules() {
		let mut st = Stacktrace::new(vec![Frame {
			filename: "app.py".to_string(),
			abs_path: Some("/srv/app.py".to_string()),
			module: Some("app".to_string()),
			function: Some("handler".to_string()),
			lineno: Some(12),
			context_line: Some("raise Boom()".to_string()),
			pre_context: vec!["def handler():".to_string()],
			vars: Some(json!({"x": 1}).as_object().unwrap().clone()),
			library_frame: Some(false),
			..Default::default()
		}]);

		let docs = transform(&mut st, &plain_config(), &Metadata::default());

		assert_eq!(
			docs,
			vec![json!({
				"filename": "app.py",
				"abs_path": "/srv/app.py",
				"module": "app",
				"function": "handler",
				"vars": {"x": 1},
				"library_frame": false,
				"exclude_from_grouping": false,
				"context": {"pre": ["def handler():"]},
				"line": {"number": 12, "context": "raise Boom()"}
			})]
		);
	}

	#[test]
	fn test_library_pattern_moves_agent_value_to_original() {
		let config = ApmConfigLayer {
			library_pattern: Some("node_modules".to_string()),
			..Default::default()
		}
		.finalize()
		.unwrap();
		let mut st = Stacktrace::new(vec![
			Frame {
				filename: "index.js".to_string(),
				abs_path: Some("/app/node_modules/lib/index.js".to_string()),
				library_frame: Some(false),
				..Default::default()
			},
			Frame {
				filename: "app.js".to_string(),
				..Default::default()
			},
		]);

		let docs = transform(&mut st, &config, &Metadata::default());

		assert_eq!(st.frames[0].library_frame, Some(true));
		assert_eq!(st.frames[0].original.library_frame, Some(false));
		assert_eq!(st.frames[1].library_frame, Some(false));
		assert_eq!(st.frames[1].original.library_frame, None);
		assert_eq!(docs[0]["original"], json!({"library_frame": false}));
		assert!(docs[1].get("original").is_none());
	}

	#[test]
	fn test_exclude_from_grouping_requires_filename() {
		let config = ApmConfigLayer {
			exclude_from_grouping: Some("^/webpack|^$".to_string()),
			..Default::default()
		}
		.finalize()
		.unwrap();
		let mut st = Stacktrace::new(vec![
			Frame {
				filename: "/webpack/bootstrap".to_string(),
				..Default::default()
			},
			Frame::default(),
			Frame {
				filename: "src/app.js".to_string(),
				..Default::default()
			},
		]);

		let docs = transform(&mut st, &config, &Metadata::default());

		let excluded: Vec<bool> = st.frames.iter().map(|f| f.exclude_from_grouping).collect();
		assert_eq!(excluded, vec![true, false, false]);
		assert_eq!(docs[0]["exclude_from_grouping"], json!(true));
	}

	#[test]
	fn test_sourcemap_rewrites_frames_and_shifts_function_names() {
		let config = plain_config().with_sourcemap_mapper(Arc::new(mapper()));
		let mut st = Stacktrace::new(vec![
			frame("bundle.js", Some("http://cdn/bundle.js?v=2"), 1, 5),
			frame("bundle.js", Some("http://cdn/bundle.js"), 2, 8),
		]);

		let docs = transform(&mut st, &config, &service_metadata());

		let outer = &st.frames[0];
		assert_eq!(outer.filename, "src/app.ts");
		assert_eq!(outer.lineno, Some(10));
		assert_eq!(outer.colno, Some(2));
		assert_eq!(outer.abs_path.as_deref(), Some("http://cdn/bundle.js"));
		assert_eq!(outer.function.as_deref(), Some("main"));
		assert!(outer.is_sourcemap_applied());

		let inner = &st.frames[1];
		assert_eq!(inner.filename, "src/main.ts");
		assert_eq!(inner.function.as_deref(), Some(ANONYMOUS_FUNCTION));

		assert_eq!(
			docs[0]["original"],
			json!({
				"filename": "bundle.js",
				"lineno": 1,
				"colno": 5,
				"function": "minified",
				"abs_path": "http://cdn/bundle.js?v=2"
			})
		);
		assert_eq!(docs[0]["sourcemap"], json!({"updated": true}));
	}

	#[test]
	fn test_sourcemap_failures_are_recorded_on_frame() {
		let config = plain_config().with_sourcemap_mapper(Arc::new(mapper()));
		let mut st = Stacktrace::new(vec![
			Frame {
				filename: "bundle.js".to_string(),
				lineno: Some(1),
				abs_path: Some("http://cdn/bundle.js".to_string()),
				..Default::default()
			},
			frame("other.js", Some("http://cdn/other.js"), 1, 1),
		]);

		let docs = transform(&mut st, &config, &service_metadata());

		assert_eq!(
			st.frames[0].sourcemap.error.as_deref(),
			Some("colno mandatory for sourcemapping")
		);
		assert_eq!(st.frames[0].filename, "bundle.js");
		assert_eq!(st.frames[1].sourcemap.updated, Some(false));
		assert_eq!(
			st.frames[1].sourcemap.error.as_deref(),
			Some("no sourcemap found for http://cdn/other.js")
		);
		assert_eq!(docs[1]["filename"], json!("other.js"));
		assert!(docs[1].get("original").is_none());
	}

	#[test]
	fn test_sourcemap_requires_service_metadata() {
		let config = plain_config().with_sourcemap_mapper(Arc::new(mapper()));
		let mut st = Stacktrace::new(vec![frame("bundle.js", Some("http://cdn/bundle.js"), 1, 5)]);

		transform(&mut st, &config, &Metadata::default());

		assert_eq!(st.frames[0].sourcemap.updated, None);
		assert_eq!(st.frames[0].filename, "bundle.js");
	}
}
