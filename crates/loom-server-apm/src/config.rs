// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! APM intake configuration.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ApmServerError, Result};
use crate::sourcemap::SourcemapMapper;

/// Partial configuration; later layers override earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApmConfigLayer {
	/// Pass `context.experimental` through to output documents.
	pub experimental: Option<bool>,
	/// Frames whose filename or abs_path match are library frames.
	pub library_pattern: Option<String>,
	/// Frames whose filename matches don't contribute to grouping keys.
	pub exclude_from_grouping: Option<String>,
}

impl ApmConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.experimental.is_some() {
			self.experimental = other.experimental;
		}
		if other.library_pattern.is_some() {
			self.library_pattern = other.library_pattern;
		}
		if other.exclude_from_grouping.is_some() {
			self.exclude_from_grouping = other.exclude_from_grouping;
		}
	}

	pub fn finalize(self) -> Result<ApmConfig> {
		Ok(ApmConfig {
			experimental: self.experimental.unwrap_or(false),
			library_pattern: compile("library_pattern", self.library_pattern)?,
			exclude_from_grouping: compile("exclude_from_grouping", self.exclude_from_grouping)?,
			sourcemap_mapper: None,
		})
	}
}

fn compile(field: &'static str, pattern: Option<String>) -> Result<Option<Regex>> {
	pattern
		.filter(|p| !p.is_empty())
		.map(|p| Regex::new(&p).map_err(|source| ApmServerError::InvalidPattern { field, source }))
		.transpose()
}

/// Immutable configuration shared by every request.
#[derive(Clone, Default)]
pub struct ApmConfig {
	pub experimental: bool,
	pub library_pattern: Option<Regex>,
	pub exclude_from_grouping: Option<Regex>,
	/// Present iff source map lookups are configured.
	pub sourcemap_mapper: Option<Arc<dyn SourcemapMapper>>,
}

impl ApmConfig {
	pub fn with_sourcemap_mapper(mut self, mapper: Arc<dyn SourcemapMapper>) -> Self {
		self.sourcemap_mapper = Some(mapper);
		self
	}

	pub fn sourcemap_enabled(&self) -> bool {
		self.sourcemap_mapper.is_some()
	}
}

impl fmt::Debug for ApmConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ApmConfig")
			.field("experimental", &self.experimental)
			.field("library_pattern", &self.library_pattern)
			.field("exclude_from_grouping", &self.exclude_from_grouping)
			.field("sourcemap_enabled", &self.sourcemap_enabled())
			.finish()
	}
}
