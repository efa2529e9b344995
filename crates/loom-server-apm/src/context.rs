// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decoding of the shared `context` section of intake records.

use serde::Deserialize;
use serde_json::Value;

use loom_apm_core::{Context, Custom, Http, HttpRequest, HttpResponse, Labels, Page, Service, Url, User};

use crate::config::ApmConfig;
use crate::decode::Object;
use crate::error::ContextError;

/// Produces the [`Context`] bundle for a raw record.
pub trait ContextDecoder: Send + Sync {
	fn decode(&self, raw: &Object, config: &ApmConfig) -> Result<Context, ContextError>;
}

/// Decodes the `context` object of the v2 intake format.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntakeContextDecoder;

#[derive(Debug, Default, Deserialize)]
struct RawContext {
	#[serde(default)]
	user: Option<User>,
	#[serde(default)]
	tags: Option<Labels>,
	#[serde(default)]
	page: Option<Page>,
	#[serde(default)]
	request: Option<RawRequest>,
	#[serde(default)]
	response: Option<HttpResponse>,
	#[serde(default)]
	custom: Option<Custom>,
	#[serde(default)]
	service: Option<Service>,
	#[serde(default)]
	experimental: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRequest {
	#[serde(default)]
	http_version: Option<String>,
	#[serde(default)]
	url: Option<RawUrl>,
	#[serde(flatten)]
	request: HttpRequest,
}

#[derive(Debug, Default, Deserialize)]
struct RawUrl {
	#[serde(default)]
	raw: Option<String>,
	#[serde(default)]
	protocol: Option<String>,
	#[serde(default)]
	full: Option<String>,
	#[serde(default)]
	hostname: Option<String>,
	#[serde(default)]
	port: Option<Value>,
	#[serde(default)]
	pathname: Option<String>,
	#[serde(default)]
	search: Option<String>,
	#[serde(default)]
	hash: Option<String>,
}

impl ContextDecoder for IntakeContextDecoder {
	fn decode(&self, raw: &Object, config: &ApmConfig) -> Result<Context, ContextError> {
		let raw_context = match raw.get("context") {
			None | Some(Value::Null) => return Ok(Context::default()),
			Some(Value::Object(_)) => RawContext::deserialize(&raw["context"])?,
			Some(_) => return Err(ContextError::InvalidType),
		};

		let mut user = raw_context.user;
		let mut http = None;
		let mut url = None;

		if let Some(request) = raw_context.request {
			let remote_address = request
				.request
				.socket
				.as_ref()
				.and_then(|s| s.remote_address.clone());
			let user_agent = request.request.headers.as_ref().and_then(user_agent_header);
			if remote_address.is_some() || user_agent.is_some() {
				let user = user.get_or_insert_with(User::default);
				if user.ip.is_none() {
					user.ip = remote_address;
				}
				if user.user_agent.is_none() {
					user.user_agent = user_agent;
				}
			}

			url = request.url.map(decode_url);
			http = Some(Http {
				version: request.http_version,
				request: Some(request.request),
				response: None,
			});
		}

		if let Some(response) = raw_context.response {
			http.get_or_insert_with(Http::default).response = Some(response);
		}

		Ok(Context {
			user,
			labels: raw_context.tags,
			page: raw_context.page,
			http,
			url,
			custom: raw_context.custom,
			service: raw_context.service,
			experimental: raw_context.experimental.filter(|_| config.experimental),
		})
	}
}

fn user_agent_header(headers: &serde_json::Map<String, Value>) -> Option<String> {
	let value = headers
		.iter()
		.find(|(name, _)| name.eq_ignore_ascii_case("user-agent"))
		.map(|(_, value)| value)?;
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Array(items) => items.first().and_then(Value::as_str).map(String::from),
		_ => None,
	}
}

fn decode_url(raw: RawUrl) -> Url {
	Url {
		original: raw.raw,
		scheme: raw.protocol.map(|p| p.trim_end_matches(':').to_string()),
		full: raw.full,
		domain: raw.hostname,
		port: raw.port.and_then(|port| match port {
			Value::Number(n) => n.as_i64(),
			Value::String(s) => s.parse().ok(),
			_ => None,
		}),
		path: raw.pathname,
		query: raw.search.map(|s| s.trim_start_matches('?').to_string()),
		fragment: raw.hash.map(|h| h.trim_start_matches('#').to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ApmConfigLayer;
	use serde_json::json;

	fn object(value: Value) -> Object {
		match value {
			Value::Object(map) => map,
			_ => panic!("expected object"),
		}
	}

	fn config(experimental: bool) -> ApmConfig {
		ApmConfigLayer {
			experimental: Some(experimental),
			..Default::default()
		}
		.finalize()
		.unwrap()
	}

	#[test]
	fn test_missing_context_is_empty() {
		let ctx = IntakeContextDecoder
			.decode(&object(json!({"id": "x"})), &config(false))
			.unwrap();
		assert_eq!(ctx, Context::default());
	}

	#[test]
	fn test_context_must_be_object() {
		let err = IntakeContextDecoder
			.decode(&object(json!({"context": "nope"})), &config(false))
			.unwrap_err();
		assert!(matches!(err, ContextError::InvalidType));
	}

	#[test]
	fn test_invalid_shape_is_rejected() {
		let err = IntakeContextDecoder
			.decode(
				&object(json!({"context": {"user": {"email": 5}}})),
				&config(false),
			)
			.unwrap_err();
		assert!(matches!(err, ContextError::Invalid(_)));
	}

	#[test]
	fn test_full_context() {
		let raw = object(json!({
			"context": {
				"user": {"id": 99, "email": "a@b.c", "username": "ab"},
				"tags": {"team": "payments"},
				"page": {"url": "http://shop/cart", "referer": "http://shop/"},
				"custom": {"cart_size": 3},
				"service": {"name": "shop", "agent": {"name": "js-base", "version": "4.0"}},
				"request": {
					"method": "GET",
					"http_version": "1.1",
					"headers": {"User-Agent": "Mozilla/5.0"},
					"socket": {"remote_address": "192.0.2.1", "encrypted": true},
					"url": {
						"raw": "/cart?x=1#top",
						"protocol": "https:",
						"full": "https://shop:8080/cart?x=1#top",
						"hostname": "shop",
						"port": "8080",
						"pathname": "/cart",
						"search": "?x=1",
						"hash": "#top"
					}
				},
				"response": {"status_code": 404, "finished": true}
			}
		}));

		let ctx = IntakeContextDecoder.decode(&raw, &config(false)).unwrap();

		let user = ctx.user.unwrap();
		assert_eq!(user.id.as_deref(), Some("99"));
		assert_eq!(user.ip.as_deref(), Some("192.0.2.1"));
		assert_eq!(user.user_agent.as_deref(), Some("Mozilla/5.0"));

		assert_eq!(ctx.labels.unwrap().0["team"], json!("payments"));
		assert_eq!(ctx.page.unwrap().referer.as_deref(), Some("http://shop/"));
		assert_eq!(ctx.custom.unwrap().0["cart_size"], json!(3));
		assert_eq!(ctx.service.unwrap().name.as_deref(), Some("shop"));

		let http = ctx.http.unwrap();
		assert_eq!(http.version.as_deref(), Some("1.1"));
		assert_eq!(http.request.unwrap().method.as_deref(), Some("GET"));
		assert_eq!(http.response.unwrap().status_code, Some(404));

		let url = ctx.url.unwrap();
		assert_eq!(
			url,
			Url {
				original: Some("/cart?x=1#top".to_string()),
				scheme: Some("https".to_string()),
				full: Some("https://shop:8080/cart?x=1#top".to_string()),
				domain: Some("shop".to_string()),
				port: Some(8080),
				path: Some("/cart".to_string()),
				query: Some("x=1".to_string()),
				fragment: Some("top".to_string()),
			}
		);
		assert!(ctx.experimental.is_none());
	}

	#[test]
	fn test_client_supplied_ip_wins() {
		let raw = object(json!({
			"context": {
				"user": {"ip": "10.1.1.1"},
				"request": {"socket": {"remote_address": "192.0.2.1"}}
			}
		}));
		let ctx = IntakeContextDecoder.decode(&raw, &config(false)).unwrap();
		assert_eq!(ctx.user.unwrap().ip.as_deref(), Some("10.1.1.1"));
	}

	#[test]
	fn test_response_only_http() {
		let raw = object(json!({"context": {"response": {"status_code": 500}}}));
		let ctx = IntakeContextDecoder.decode(&raw, &config(false)).unwrap();
		let http = ctx.http.unwrap();
		assert!(http.request.is_none());
		assert_eq!(http.response.unwrap().status_code, Some(500));
		assert!(ctx.url.is_none());
	}

	#[test]
	fn test_experimental_requires_flag() {
		let raw = object(json!({"context": {"experimental": {"a": 1}}}));

		let ctx = IntakeContextDecoder.decode(&raw, &config(false)).unwrap();
		assert!(ctx.experimental.is_none());

		let ctx = IntakeContextDecoder.decode(&raw, &config(true)).unwrap();
		assert_eq!(ctx.experimental, Some(json!({"a": 1})));
	}
}
