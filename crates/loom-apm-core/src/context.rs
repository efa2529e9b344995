// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared request context attached to events (user, service, page, HTTP, URL,
//! custom data, labels).
//!
//! The [`Context`] bundle is produced by a context decoder and then moved into
//! the event it belongs to. Each type knows how to project itself into output
//! document fields.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::fields::{set, set_object, set_str, Fields};

/// Pre-decoded attributes shared by every event kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
	pub user: Option<User>,
	pub labels: Option<Labels>,
	pub page: Option<Page>,
	pub http: Option<Http>,
	pub url: Option<Url>,
	pub custom: Option<Custom>,
	pub service: Option<Service>,
	/// Opaque payload, only populated when the server enables it.
	pub experimental: Option<Value>,
}

/// User context at the time of the error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
	#[serde(default, deserialize_with = "string_or_number")]
	pub id: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub username: Option<String>,
	/// Client address; not part of `user` in output documents.
	#[serde(default)]
	pub ip: Option<String>,
	/// Raw user agent string; not part of `user` in output documents.
	#[serde(default, rename = "user-agent")]
	pub user_agent: Option<String>,
}

impl User {
	pub fn fields(&self) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "id", self.id.as_deref());
		set_str(&mut fields, "email", self.email.as_deref());
		set_str(&mut fields, "name", self.username.as_deref());
		fields
	}

	pub fn client_fields(&self) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "ip", self.ip.as_deref());
		fields
	}

	pub fn user_agent_fields(&self) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "original", self.user_agent.as_deref());
		fields
	}
}

/// Name/version pair used for languages, runtimes, frameworks and agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedVersion {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub version: Option<String>,
}

impl NamedVersion {
	pub fn fields(&self) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "name", self.name.as_deref());
		set_str(&mut fields, "version", self.version.as_deref());
		fields
	}
}

/// Service node identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
	#[serde(default)]
	pub configured_name: Option<String>,
}

/// The instrumented service that reported the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub language: Option<NamedVersion>,
	#[serde(default)]
	pub runtime: Option<NamedVersion>,
	#[serde(default)]
	pub framework: Option<NamedVersion>,
	#[serde(default)]
	pub agent: Option<NamedVersion>,
	#[serde(default)]
	pub node: Option<ServiceNode>,
}

impl Service {
	pub fn fields(&self) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "name", self.name.as_deref());
		set_str(&mut fields, "version", self.version.as_deref());
		set_str(&mut fields, "environment", self.environment.as_deref());
		set_object(&mut fields, "language", self.language.as_ref().map(NamedVersion::fields));
		set_object(&mut fields, "runtime", self.runtime.as_ref().map(NamedVersion::fields));
		set_object(&mut fields, "framework", self.framework.as_ref().map(NamedVersion::fields));

		let node_name = self.node.as_ref().and_then(|n| n.configured_name.as_deref());
		let mut node = Fields::new();
		set_str(&mut node, "name", node_name);
		set_object(&mut fields, "node", Some(node));
		fields
	}

	pub fn agent_fields(&self) -> Fields {
		self.agent.as_ref().map(NamedVersion::fields).unwrap_or_default()
	}
}

/// Browser page the error happened on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub referer: Option<String>,
}

impl Page {
	pub fn fields(&self) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "url", self.url.as_deref());
		set_str(&mut fields, "referer", self.referer.as_deref());
		fields
	}
}

/// Socket details of an HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Socket {
	#[serde(default)]
	pub remote_address: Option<String>,
	#[serde(default)]
	pub encrypted: Option<bool>,
}

/// HTTP request captured with the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
	#[serde(default)]
	pub method: Option<String>,
	#[serde(default)]
	pub headers: Option<Map<String, Value>>,
	#[serde(default)]
	pub env: Option<Map<String, Value>>,
	#[serde(default)]
	pub cookies: Option<Map<String, Value>>,
	#[serde(default)]
	pub body: Option<Value>,
	#[serde(default)]
	pub socket: Option<Socket>,
}

/// HTTP response captured with the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
	#[serde(default)]
	pub status_code: Option<i64>,
	#[serde(default)]
	pub headers: Option<Map<String, Value>>,
	#[serde(default)]
	pub finished: Option<bool>,
	#[serde(default)]
	pub headers_sent: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Http {
	pub version: Option<String>,
	pub request: Option<HttpRequest>,
	pub response: Option<HttpResponse>,
}

impl Http {
	pub fn fields(&self) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "version", self.version.as_deref());

		if let Some(req) = &self.request {
			let mut request = Fields::new();
			set_str(&mut request, "method", req.method.as_deref().map(str::to_lowercase).as_deref());
			set_object(&mut request, "headers", req.headers.clone());
			set_object(&mut request, "env", req.env.clone());
			set_object(&mut request, "cookies", req.cookies.clone());
			set(&mut request, "body", req.body.clone());
			if let Some(socket) = &req.socket {
				let mut s = Fields::new();
				set_str(&mut s, "remote_address", socket.remote_address.as_deref());
				set(&mut s, "encrypted", socket.encrypted.map(Value::Bool));
				set_object(&mut request, "socket", Some(s));
			}
			set_object(&mut fields, "request", Some(request));
		}

		if let Some(resp) = &self.response {
			let mut response = Fields::new();
			set(&mut response, "status_code", resp.status_code.map(Value::from));
			set_object(&mut response, "headers", resp.headers.clone());
			set(&mut response, "finished", resp.finished.map(Value::Bool));
			set(&mut response, "headers_sent", resp.headers_sent.map(Value::Bool));
			set_object(&mut fields, "response", Some(response));
		}
		fields
	}
}

/// Request URL split into its components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Url {
	pub original: Option<String>,
	pub scheme: Option<String>,
	pub full: Option<String>,
	pub domain: Option<String>,
	pub port: Option<i64>,
	pub path: Option<String>,
	pub query: Option<String>,
	pub fragment: Option<String>,
}

impl Url {
	pub fn fields(&self) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "original", self.original.as_deref());
		set_str(&mut fields, "scheme", self.scheme.as_deref());
		set_str(&mut fields, "full", self.full.as_deref());
		set_str(&mut fields, "domain", self.domain.as_deref());
		set(&mut fields, "port", self.port.map(Value::from));
		set_str(&mut fields, "path", self.path.as_deref());
		set_str(&mut fields, "query", self.query.as_deref());
		set_str(&mut fields, "fragment", self.fragment.as_deref());
		fields
	}
}

/// Free-form custom data supplied by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Custom(pub Map<String, Value>);

impl Custom {
	pub fn fields(&self) -> Fields {
		self.0.clone()
	}
}

/// Key/value labels used for filtering and grouping in the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(pub Map<String, Value>);

impl Labels {
	pub fn fields(&self) -> Fields {
		self.0.clone()
	}
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<Value>::deserialize(deserializer)? {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(s)) => Ok(Some(s)),
		Some(Value::Number(n)) => Ok(Some(n.to_string())),
		Some(other) => Err(serde::de::Error::custom(format!(
			"expected string or number, got {other}"
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn user_id_accepts_numbers() {
		let user: User = serde_json::from_value(json!({"id": 42, "username": "ada"})).unwrap();
		assert_eq!(user.id.as_deref(), Some("42"));
		assert_eq!(
			Value::Object(user.fields()),
			json!({"id": "42", "name": "ada"})
		);
	}

	#[test]
	fn user_splits_client_and_user_agent() {
		let user = User {
			ip: Some("10.0.0.1".to_string()),
			user_agent: Some("curl/8".to_string()),
			..Default::default()
		};
		assert!(user.fields().is_empty());
		assert_eq!(Value::Object(user.client_fields()), json!({"ip": "10.0.0.1"}));
		assert_eq!(
			Value::Object(user.user_agent_fields()),
			json!({"original": "curl/8"})
		);
	}

	#[test]
	fn service_fields_omit_empty_sections() {
		let service: Service = serde_json::from_value(json!({
			"name": "checkout",
			"language": {"name": "go"},
			"runtime": {},
			"agent": {"name": "go", "version": "1.2.0"},
			"node": {}
		}))
		.unwrap();

		assert_eq!(
			Value::Object(service.fields()),
			json!({"name": "checkout", "language": {"name": "go"}})
		);
		assert_eq!(
			Value::Object(service.agent_fields()),
			json!({"name": "go", "version": "1.2.0"})
		);
	}

	#[test]
	fn http_fields_lowercase_method() {
		let http = Http {
			version: Some("1.1".to_string()),
			request: Some(HttpRequest {
				method: Some("POST".to_string()),
				socket: Some(Socket {
					remote_address: Some("127.0.0.1".to_string()),
					encrypted: Some(true),
				}),
				..Default::default()
			}),
			response: Some(HttpResponse {
				status_code: Some(500),
				..Default::default()
			}),
		};

		assert_eq!(
			Value::Object(http.fields()),
			json!({
				"version": "1.1",
				"request": {
					"method": "post",
					"socket": {"remote_address": "127.0.0.1", "encrypted": true}
				},
				"response": {"status_code": 500}
			})
		);
	}

	#[test]
	fn url_fields_include_numeric_port() {
		let url = Url {
			full: Some("https://example.com:8443/a?b#c".to_string()),
			port: Some(8443),
			..Default::default()
		};
		assert_eq!(
			Value::Object(url.fields()),
			json!({"full": "https://example.com:8443/a?b#c", "port": 8443})
		);
	}
}
