// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decoding of intake records into [`ErrorEvent`]s.

use std::sync::Arc;

use serde_json::Value;

use loom_apm_core::{ErrorEvent, Exception, ExceptionCode, Log};

use crate::config::ApmConfig;
use crate::context::{ContextDecoder, IntakeContextDecoder};
use crate::decode::{decode_stacktrace, FieldDecoder};
use crate::error::DecodeError;

/// Decodes raw error records.
///
/// Context decoding failures abort immediately. Every other field is always
/// attempted, and all field errors are returned together.
#[derive(Clone)]
pub struct ErrorEventDecoder {
	context: Arc<dyn ContextDecoder>,
}

impl Default for ErrorEventDecoder {
	fn default() -> Self {
		Self::new()
	}
}

impl ErrorEventDecoder {
	pub fn new() -> Self {
		Self::with_context_decoder(Arc::new(IntakeContextDecoder))
	}

	pub fn with_context_decoder(context: Arc<dyn ContextDecoder>) -> Self {
		Self { context }
	}

	pub fn decode(&self, input: Option<&Value>, config: &ApmConfig) -> Result<ErrorEvent, DecodeError> {
		let input = input.ok_or(DecodeError::MissingInput)?;
		let raw = input.as_object().ok_or(DecodeError::InvalidType)?;

		let ctx = self.context.decode(raw, config)?;

		let mut d = FieldDecoder::new();
		let root = Some(raw);
		let transaction = d.object(root, "transaction");

		let mut event = ErrorEvent {
			id: d.string(root, "id"),
			culprit: d.string(root, "culprit"),
			timestamp: d.timestamp_micros(root, "timestamp"),
			transaction_id: d.string(root, "transaction_id"),
			parent_id: d.string(root, "parent_id"),
			trace_id: d.string(root, "trace_id"),
			transaction_sampled: d.scoped("transaction", |d| d.bool(transaction, "sampled")),
			transaction_type: d.scoped("transaction", |d| d.string(transaction, "type")),
			user: ctx.user,
			labels: ctx.labels,
			page: ctx.page,
			http: ctx.http,
			url: ctx.url,
			custom: ctx.custom,
			service: ctx.service,
			experimental: ctx.experimental,
			exception: None,
			log: None,
		};

		let ex = d.object(root, "exception");
		event.exception = d.scoped("exception", |d| {
			let message = d.string(ex, "message");
			let exception_type = d.string(ex, "type");
			if message.is_none() && exception_type.is_none() {
				return None;
			}
			Some(Exception {
				message,
				exception_type,
				code: d.value(ex, "code").map(ExceptionCode::from),
				module: d.string(ex, "module"),
				attributes: d.value(ex, "attributes"),
				handled: d.bool(ex, "handled"),
				stacktrace: decode_stacktrace(d, ex, "stacktrace"),
			})
		});

		let log = d.object(root, "log");
		event.log = d.scoped("log", |d| {
			let message = d.string(log, "message")?;
			Some(Log {
				message,
				param_message: d.string(log, "param_message"),
				level: d.string(log, "level"),
				logger_name: d.string(log, "logger_name"),
				stacktrace: decode_stacktrace(d, log, "stacktrace"),
			})
		});

		d.finish()?;
		Ok(event)
	}
}
