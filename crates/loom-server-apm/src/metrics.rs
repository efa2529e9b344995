// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide counters for the error pipeline.

use std::fmt;

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use loom_apm_core::Stacktrace;

use crate::error::Result;

/// Counters incremented by the transformer and read by metrics reporting.
///
/// Create one per process and share it behind an `Arc`.
#[derive(Clone)]
pub struct ErrorMetrics {
	registry: Registry,

	pub transformations: IntCounter,
	pub stacktraces: IntCounter,
	pub frames: IntCounter,
}

impl fmt::Debug for ErrorMetrics {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ErrorMetrics")
			.field("snapshot", &self.snapshot())
			.finish()
	}
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorMetricsSnapshot {
	pub transformations: u64,
	pub stacktraces: u64,
	pub frames: u64,
}

impl ErrorMetrics {
	pub fn new() -> Result<Self> {
		Self::with_registry(Registry::new())
	}

	/// Register the counters with an existing registry.
	pub fn with_registry(registry: Registry) -> Result<Self> {
		let transformations = IntCounter::new(
			"loom_apm_error_transformations_total",
			"Total error events transformed",
		)?;
		registry.register(Box::new(transformations.clone()))?;

		let stacktraces = IntCounter::new(
			"loom_apm_error_stacktraces_total",
			"Total non-empty stacktraces in transformed error events",
		)?;
		registry.register(Box::new(stacktraces.clone()))?;

		let frames = IntCounter::new(
			"loom_apm_error_frames_total",
			"Total stack frames in transformed error events",
		)?;
		registry.register(Box::new(frames.clone()))?;

		Ok(Self {
			registry,
			transformations,
			stacktraces,
			frames,
		})
	}

	pub fn record_transformation(&self) {
		self.transformations.inc();
	}

	/// Count a stacktrace and its frames. Empty stacktraces are not counted.
	pub fn record_stacktrace(&self, stacktrace: &Stacktrace) {
		if !stacktrace.is_empty() {
			self.stacktraces.inc();
			self.frames.inc_by(stacktrace.len() as u64);
		}
	}

	pub fn snapshot(&self) -> ErrorMetricsSnapshot {
		ErrorMetricsSnapshot {
			transformations: self.transformations.get(),
			stacktraces: self.stacktraces.get(),
			frames: self.frames.get(),
		}
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Prometheus text exposition of the counters.
	pub fn encode(&self) -> Result<String> {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		let mut buffer = Vec::new();
		encoder.encode(&metric_families, &mut buffer)?;
		Ok(String::from_utf8(buffer)?)
	}
}
