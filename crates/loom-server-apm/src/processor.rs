// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decode-then-transform pipeline for intake error records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ApmConfig;
use crate::decoder::ErrorEventDecoder;
use crate::error::DecodeError;
use crate::metadata::MetadataFormatter;
use crate::metrics::ErrorMetrics;
use crate::transform::{ErrorDocument, ErrorTransformer, TransformContext};

/// Runs the error pipeline for records of one or many intake requests.
///
/// Holds no per-request state, so one processor can be shared by all request
/// handlers.
#[derive(Clone)]
pub struct ErrorProcessor {
	config: Arc<ApmConfig>,
	decoder: ErrorEventDecoder,
	transformer: ErrorTransformer,
}

impl ErrorProcessor {
	pub fn new(config: Arc<ApmConfig>, metrics: Arc<ErrorMetrics>) -> Self {
		Self::from_parts(config, ErrorEventDecoder::new(), ErrorTransformer::new(metrics))
	}

	pub fn from_parts(config: Arc<ApmConfig>, decoder: ErrorEventDecoder, transformer: ErrorTransformer) -> Self {
		Self {
			config,
			decoder,
			transformer,
		}
	}

	pub fn config(&self) -> &ApmConfig {
		&self.config
	}

	pub fn metrics(&self) -> &ErrorMetrics {
		self.transformer.metrics()
	}

	/// Decode and transform one record. A decode error rejects only this record.
	#[instrument(skip_all, fields(request_time = %request_time))]
	pub fn process(
		&self,
		record: Option<&Value>,
		request_time: DateTime<Utc>,
		metadata: &dyn MetadataFormatter,
	) -> Result<ErrorDocument, DecodeError> {
		let mut event = match self.decoder.decode(record, &self.config) {
			Ok(event) => event,
			Err(e) => {
				debug!(error = %e, "Rejected error record");
				return Err(e);
			}
		};

		let ctx = TransformContext {
			request_time,
			metadata,
			config: &self.config,
		};
		Ok(self.transformer.transform(&mut event, &ctx))
	}

	/// Process every record of one intake request, in order.
	#[instrument(skip_all, fields(record_count = records.len()))]
	pub fn process_batch(
		&self,
		records: &[Value],
		request_time: DateTime<Utc>,
		metadata: &dyn MetadataFormatter,
	) -> Vec<Result<ErrorDocument, DecodeError>> {
		let results: Vec<_> = records
			.iter()
			.map(|record| self.process(Some(record), request_time, metadata))
			.collect();

		let rejected = results.iter().filter(|r| r.is_err()).count();
		if rejected > 0 {
			debug!(rejected, accepted = results.len() - rejected, "Processed error batch");
		}
		results
	}
}
