// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for APM event processing.

use std::fmt;

use thiserror::Error;

/// Errors that reject an intake record.
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("input missing for decoding error event")]
	MissingInput,

	#[error("invalid type for error event")]
	InvalidType,

	#[error(transparent)]
	Context(#[from] ContextError),

	#[error(transparent)]
	Fields(#[from] FieldErrors),
}

/// Errors raised by a context decoder. Always fatal to the record.
#[derive(Debug, Error)]
pub enum ContextError {
	#[error("invalid type for context")]
	InvalidType,

	#[error("invalid context: {0}")]
	Invalid(#[from] serde_json::Error),
}

/// A single field whose value could not be coerced to its expected type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {kind}")]
pub struct FieldError {
	/// Dotted path of the offending value, e.g. `exception.stacktrace.2.lineno`.
	pub field: String,
	pub kind: FieldErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldErrorKind {
	#[error("invalid type, expected {expected}")]
	InvalidType { expected: &'static str },

	#[error("invalid timestamp")]
	InvalidTimestamp,
}

/// Every field error found in one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
	pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Whether an error was recorded for `field`.
	pub fn contains(&self, field: &str) -> bool {
		self.0.iter().any(|e| e.field == field)
	}
}

impl fmt::Display for FieldErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "failed to decode error event: ")?;
		for (i, err) in self.0.iter().enumerate() {
			if i > 0 {
				write!(f, "; ")?;
			}
			write!(f, "{err}")?;
		}
		Ok(())
	}
}

impl std::error::Error for FieldErrors {}

/// Errors returned by a source map lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourcemapError {
	#[error("no sourcemap found for {path}")]
	NotFound { path: String },

	#[error("no mapping found for line {line}, column {column}")]
	NoMapping { line: i64, column: i64 },

	#[error("{0} mandatory for sourcemapping")]
	MissingPosition(&'static str),
}

/// Errors from server-side setup (configuration, metrics).
#[derive(Debug, Error)]
pub enum ApmServerError {
	#[error("invalid pattern for {field}: {source}")]
	InvalidPattern {
		field: &'static str,
		#[source]
		source: regex::Error,
	},

	#[error("metrics error: {0}")]
	Metrics(#[from] prometheus::Error),

	#[error("metrics encoding error: {0}")]
	MetricsEncoding(#[from] std::string::FromUtf8Error),
}

/// Result type for server-side setup operations.
pub type Result<T> = std::result::Result<T, ApmServerError>;
