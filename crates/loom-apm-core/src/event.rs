// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error event types.

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};

use crate::context::{Custom, Http, Labels, Page, Service, Url, User};
use crate::stacktrace::Stacktrace;

/// One reported error occurrence.
///
/// Built once per decoded record, mutated in place while it is transformed,
/// then dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorEvent {
	pub id: Option<String>,
	pub transaction_id: Option<String>,
	pub trace_id: Option<String>,
	pub parent_id: Option<String>,

	/// Falls back to the request time when the document is built.
	pub timestamp: Option<DateTime<Utc>>,

	pub culprit: Option<String>,

	pub user: Option<User>,
	pub labels: Option<Labels>,
	pub page: Option<Page>,
	pub http: Option<Http>,
	pub url: Option<Url>,
	pub custom: Option<Custom>,
	pub service: Option<Service>,

	pub exception: Option<Exception>,
	pub log: Option<Log>,

	/// Absent for errors captured outside a transaction and for older agents.
	pub transaction_sampled: Option<bool>,
	pub transaction_type: Option<String>,

	pub experimental: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exception {
	pub message: Option<String>,
	pub module: Option<String>,
	pub exception_type: Option<String>,
	pub code: Option<ExceptionCode>,
	pub attributes: Option<Value>,
	pub handled: Option<bool>,
	pub stacktrace: Stacktrace,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Log {
	pub message: String,
	pub param_message: Option<String>,
	pub level: Option<String>,
	pub logger_name: Option<String>,
	pub stacktrace: Stacktrace,
}

/// Exception code as sent by the agent.
///
/// Kept lossless until the output document is built.
#[derive(Debug, Clone, PartialEq)]
pub enum ExceptionCode {
	Int(i64),
	Float(f64),
	Str(String),
	/// Numeric literal that does not fit the other variants, in canonical form.
	Decimal(String),
	/// Any other JSON shape; never emitted.
	Other(Value),
}

impl ExceptionCode {
	/// Normalize to the string written to output documents.
	///
	/// Returns `None` for shapes that have no string form.
	pub fn to_field(&self) -> Option<String> {
		match self {
			Self::Int(code) => Some(code.to_string()),
			Self::Float(code) => Some(format!("{code:.0}")),
			Self::Str(code) => Some(code.clone()),
			Self::Decimal(code) => Some(code.clone()),
			Self::Other(_) => None,
		}
	}
}

impl From<Value> for ExceptionCode {
	fn from(value: Value) -> Self {
		match value {
			Value::String(s) => Self::Str(s),
			Value::Number(n) => Self::from(n),
			other => Self::Other(other),
		}
	}
}

impl From<Number> for ExceptionCode {
	fn from(n: Number) -> Self {
		if let Some(code) = n.as_i64() {
			return Self::Int(code);
		}
		// Integer literals outside i64 keep their exact digits.
		let literal = n.to_string();
		if is_integer_literal(&literal) {
			return Self::Decimal(literal);
		}
		match n.as_f64() {
			Some(code) => Self::Float(code),
			None => Self::Decimal(literal),
		}
	}
}

fn is_integer_literal(s: &str) -> bool {
	let digits = s.strip_prefix('-').unwrap_or(s);
	!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn code_normalization() {
		assert_eq!(ExceptionCode::Int(7).to_field().as_deref(), Some("7"));
		assert_eq!(ExceptionCode::Float(7.0).to_field().as_deref(), Some("7"));
		assert_eq!(
			ExceptionCode::Str("ABC".to_string()).to_field().as_deref(),
			Some("ABC")
		);
		assert_eq!(
			ExceptionCode::Decimal("18446744073709551615".to_string())
				.to_field()
				.as_deref(),
			Some("18446744073709551615")
		);
		assert_eq!(ExceptionCode::Other(json!({"a": 1})).to_field(), None);
	}

	#[test]
	fn code_from_json() {
		assert_eq!(ExceptionCode::from(json!(7)), ExceptionCode::Int(7));
		assert_eq!(ExceptionCode::from(json!(-3)), ExceptionCode::Int(-3));
		assert_eq!(ExceptionCode::from(json!(7.5)), ExceptionCode::Float(7.5));
		assert_eq!(
			ExceptionCode::from(json!(u64::MAX)),
			ExceptionCode::Decimal(u64::MAX.to_string())
		);
		assert_eq!(
			ExceptionCode::from(json!("E42")),
			ExceptionCode::Str("E42".to_string())
		);
		assert_eq!(ExceptionCode::from(json!(true)), ExceptionCode::Other(json!(true)));
	}

	#[test]
	fn big_integer_code_keeps_every_digit() {
		let value: Value = serde_json::from_str("123456789012345678901234").unwrap();
		let code = ExceptionCode::from(value);

		assert_eq!(code, ExceptionCode::Decimal("123456789012345678901234".to_string()));
		assert_eq!(code.to_field().as_deref(), Some("123456789012345678901234"));

		let value: Value = serde_json::from_str("-98765432109876543210").unwrap();
		assert_eq!(
			ExceptionCode::from(value),
			ExceptionCode::Decimal("-98765432109876543210".to_string())
		);
	}

	#[test]
	fn fractional_literal_is_float() {
		let value: Value = serde_json::from_str("1.5e3").unwrap();
		assert_eq!(ExceptionCode::from(value), ExceptionCode::Float(1500.0));
	}
}
