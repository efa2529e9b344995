// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Projection of decoded error events into output documents.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::trace;

use loom_apm_core::fields::{add_id, deep_update, set, set_object, set_str, update, Fields};
use loom_apm_core::{
	compute_grouping_key, resolve_culprit, Custom, ErrorEvent, Exception, Http, Labels, Log, Page,
	Service, Stacktrace, Url, User,
};

use crate::config::ApmConfig;
use crate::metadata::MetadataFormatter;
use crate::metrics::ErrorMetrics;
use crate::stacktrace::{FrameTransformer, StacktraceTransformer};

/// Request-scoped inputs to a transformation.
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
	/// When the intake request was received.
	pub request_time: DateTime<Utc>,
	pub metadata: &'a dyn MetadataFormatter,
	pub config: &'a ApmConfig,
}

/// A transformed error ready to be indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDocument {
	pub timestamp: DateTime<Utc>,
	pub fields: Fields,
}

impl ErrorDocument {
	pub fn into_value(self) -> Value {
		Value::Object(self.fields)
	}
}

/// Builds [`ErrorDocument`]s. Transformation never fails; fields whose
/// source value is absent are omitted.
#[derive(Clone)]
pub struct ErrorTransformer {
	metrics: Arc<ErrorMetrics>,
	stacktraces: Arc<dyn StacktraceTransformer>,
}

impl ErrorTransformer {
	pub fn new(metrics: Arc<ErrorMetrics>) -> Self {
		Self {
			metrics,
			stacktraces: Arc::new(FrameTransformer),
		}
	}

	pub fn with_stacktrace_transformer(mut self, stacktraces: Arc<dyn StacktraceTransformer>) -> Self {
		self.stacktraces = stacktraces;
		self
	}

	pub fn metrics(&self) -> &ErrorMetrics {
		&self.metrics
	}

	pub fn transform(&self, event: &mut ErrorEvent, ctx: &TransformContext<'_>) -> ErrorDocument {
		self.metrics.record_transformation();
		if let Some(exception) = &event.exception {
			self.metrics.record_stacktrace(&exception.stacktrace);
		}
		if let Some(log) = &event.log {
			self.metrics.record_stacktrace(&log.stacktrace);
		}

		let error = self.error_fields(event, ctx);

		let mut fields = Fields::new();
		fields.insert("error".to_string(), Value::Object(error));
		fields.insert("processor".to_string(), processor_fields());

		ctx.metadata.apply(&mut fields);

		let user = event.user.as_ref();
		update(&mut fields, "user", user.map(User::fields));
		deep_update(&mut fields, "client", user.map(User::client_fields));
		deep_update(&mut fields, "user_agent", user.map(User::user_agent_fields));

		let service = event.service.as_ref();
		deep_update(&mut fields, "service", service.map(Service::fields));
		deep_update(&mut fields, "agent", service.map(Service::agent_fields));

		deep_update(&mut fields, "labels", event.labels.as_ref().map(Labels::fields));

		set_object(&mut fields, "http", event.http.as_ref().map(Http::fields));
		set_object(&mut fields, "url", event.url.as_ref().map(Url::fields));
		set(&mut fields, "experimental", event.experimental.clone());

		if event.transaction_sampled.is_some()
			|| event.transaction_type.is_some()
			|| event.transaction_id.as_deref().is_some_and(|id| !id.is_empty())
		{
			let mut transaction = Fields::new();
			set_str(&mut transaction, "id", event.transaction_id.as_deref());
			set_str(&mut transaction, "type", event.transaction_type.as_deref());
			set(&mut transaction, "sampled", event.transaction_sampled.map(Value::Bool));
			set_object(&mut fields, "transaction", Some(transaction));
		}

		add_id(&mut fields, "parent", event.parent_id.as_deref());
		add_id(&mut fields, "trace", event.trace_id.as_deref());

		let timestamp = *event.timestamp.get_or_insert(ctx.request_time);
		let mut us = Fields::new();
		us.insert("us".to_string(), Value::from(timestamp.timestamp_micros()));
		fields.insert("timestamp".to_string(), Value::Object(us));

		ErrorDocument { timestamp, fields }
	}

	fn error_fields(&self, event: &mut ErrorEvent, ctx: &TransformContext<'_>) -> Fields {
		let mut error = Fields::new();
		set_str(&mut error, "id", event.id.as_deref());
		set_object(&mut error, "page", event.page.as_ref().map(Page::fields));

		if let Some(exception) = event.exception.as_mut() {
			let exception = self.exception_fields(exception, ctx);
			set(&mut error, "exception", Some(Value::Array(vec![Value::Object(exception)])));
		}
		if let Some(log) = event.log.as_mut() {
			let log = self.log_fields(log, ctx);
			set_object(&mut error, "log", Some(log));
		}

		// Frames must be rewritten before the culprit and grouping key are derived.
		resolve_culprit(event, ctx.config.sourcemap_enabled());
		set_str(&mut error, "culprit", event.culprit.as_deref());
		set_object(&mut error, "custom", event.custom.as_ref().map(Custom::fields));

		let grouping_key = compute_grouping_key(event);
		trace!(grouping_key = %grouping_key, id = ?event.id, "Computed grouping key");
		set_str(&mut error, "grouping_key", Some(grouping_key.as_str()));

		error
	}

	fn exception_fields(&self, exception: &mut Exception, ctx: &TransformContext<'_>) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "message", exception.message.as_deref());
		set_str(&mut fields, "module", exception.module.as_deref());
		set(&mut fields, "attributes", exception.attributes.clone());
		set_str(&mut fields, "type", exception.exception_type.as_deref());
		set(&mut fields, "handled", exception.handled.map(Value::Bool));
		set(
			&mut fields,
			"code",
			exception
				.code
				.as_ref()
				.and_then(|code| code.to_field())
				.map(Value::String),
		);
		set(&mut fields, "stacktrace", self.stacktrace(&mut exception.stacktrace, ctx));
		fields
	}

	fn log_fields(&self, log: &mut Log, ctx: &TransformContext<'_>) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "message", Some(log.message.as_str()));
		set_str(&mut fields, "param_message", log.param_message.as_deref());
		set_str(&mut fields, "logger_name", log.logger_name.as_deref());
		set_str(&mut fields, "level", log.level.as_deref());
		set(&mut fields, "stacktrace", self.stacktrace(&mut log.stacktrace, ctx));
		fields
	}

	fn stacktrace(&self, stacktrace: &mut Stacktrace, ctx: &TransformContext<'_>) -> Option<Value> {
		if stacktrace.is_empty() {
			return None;
		}
		Some(Value::Array(self.stacktraces.transform(stacktrace, ctx)))
	}
}

fn processor_fields() -> Value {
	let mut processor = Fields::new();
	processor.insert("name".to_string(), Value::from("error"));
	processor.insert("event".to_string(), Value::from("error"));
	Value::Object(processor)
}
