// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stream-level metadata shared by every event of an intake request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use loom_apm_core::fields::{set, set_object, set_str, Fields};
use loom_apm_core::{Labels, Service, User};

/// Writes the shared metadata fields into an output document.
pub trait MetadataFormatter: Send + Sync {
	/// Write the baseline fields. Event-specific fields are overlaid afterwards.
	fn apply(&self, fields: &mut Fields);

	/// Service used to look up source maps.
	fn service(&self) -> Option<&Service>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Process {
	#[serde(default)]
	pub pid: Option<i64>,
	#[serde(default)]
	pub ppid: Option<i64>,
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub argv: Option<Vec<String>>,
}

impl Process {
	pub fn fields(&self) -> Fields {
		let mut fields = Fields::new();
		set(&mut fields, "pid", self.pid.map(Value::from));
		set(&mut fields, "ppid", self.ppid.map(Value::from));
		set_str(&mut fields, "title", self.title.as_deref());
		set(&mut fields, "args", self.argv.clone().map(Value::from));
		fields
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct System {
	#[serde(default)]
	pub hostname: Option<String>,
	#[serde(default)]
	pub architecture: Option<String>,
	#[serde(default)]
	pub platform: Option<String>,
}

impl System {
	pub fn fields(&self) -> Fields {
		let mut fields = Fields::new();
		set_str(&mut fields, "hostname", self.hostname.as_deref());
		set_str(&mut fields, "architecture", self.architecture.as_deref());
		let mut os = Fields::new();
		set_str(&mut os, "platform", self.platform.as_deref());
		set_object(&mut fields, "os", Some(os));
		fields
	}
}

/// Metadata sent once per intake stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
	#[serde(default)]
	pub service: Option<Service>,
	#[serde(default)]
	pub process: Option<Process>,
	#[serde(default)]
	pub system: Option<System>,
	#[serde(default)]
	pub user: Option<User>,
	#[serde(default)]
	pub labels: Option<Labels>,
}

impl MetadataFormatter for Metadata {
	fn apply(&self, fields: &mut Fields) {
		if let Some(service) = &self.service {
			set_object(fields, "service", Some(service.fields()));
			set_object(fields, "agent", Some(service.agent_fields()));
		}
		set_object(fields, "process", self.process.as_ref().map(Process::fields));
		set_object(fields, "host", self.system.as_ref().map(System::fields));
		if let Some(user) = &self.user {
			set_object(fields, "user", Some(user.fields()));
			set_object(fields, "client", Some(user.client_fields()));
			set_object(fields, "user_agent", Some(user.user_agent_fields()));
		}
		set_object(fields, "labels", self.labels.as_ref().map(Labels::fields));
	}

	fn service(&self) -> Option<&Service> {
		self.service.as_ref()
	}
}
