// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Source map lookup capability.
//!
//! The pipeline only needs to ask "where does this generated position come
//! from". Fetching, caching and parsing source maps is the job of whoever
//! implements [`SourcemapMapper`].

use std::collections::HashMap;

use crate::error::SourcemapError;

/// Identifies the source map for one bundle of one service release.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcemapId {
	pub service_name: String,
	pub service_version: String,
	/// Bundle path with query string and fragment removed.
	pub path: String,
}

/// Original location for a generated position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
	pub filename: String,
	pub function: Option<String>,
	pub lineno: i64,
	pub colno: i64,
}

/// Resolves generated positions to original source positions.
pub trait SourcemapMapper: Send + Sync {
	fn apply(&self, id: &SourcemapId, lineno: i64, colno: i64) -> Result<Mapping, SourcemapError>;
}

/// Mapper over a fixed set of pre-registered mappings.
///
/// Within a source map, a lookup picks the mapping on the same generated line
/// with the greatest generated column not past the requested one.
#[derive(Debug, Default)]
pub struct StaticSourcemapMapper {
	maps: HashMap<SourcemapId, Vec<GeneratedMapping>>,
}

#[derive(Debug, Clone)]
struct GeneratedMapping {
	line: i64,
	column: i64,
	mapping: Mapping,
}

impl StaticSourcemapMapper {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `mapping` for the generated position `line:column` of `id`.
	pub fn add(&mut self, id: SourcemapId, line: i64, column: i64, mapping: Mapping) {
		let entries = self.maps.entry(id).or_default();
		entries.push(GeneratedMapping {
			line,
			column,
			mapping,
		});
		entries.sort_by_key(|m| (m.line, m.column));
	}
}

impl SourcemapMapper for StaticSourcemapMapper {
	fn apply(&self, id: &SourcemapId, lineno: i64, colno: i64) -> Result<Mapping, SourcemapError> {
		let entries = self.maps.get(id).ok_or_else(|| SourcemapError::NotFound {
			path: id.path.clone(),
		})?;

		entries
			.iter()
			.filter(|m| m.line == lineno && m.column <= colno)
			.last()
			.map(|m| m.mapping.clone())
			.ok_or(SourcemapError::NoMapping {
				line: lineno,
				column: colno,
			})
	}
}

/// Strip query string and fragment from a bundle URL or path.
pub fn clean_url_path(path: &str) -> &str {
	let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
	&path[..end]
}
