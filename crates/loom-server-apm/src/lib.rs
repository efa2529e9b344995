// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! APM error event processing for Loom.
//!
//! This crate turns raw error records sent by APM agents into documents for
//! the search backend:
//!
//! - Field-by-field decoding that reports every malformed field at once
//! - Context decoding for user, service, HTTP and URL data
//! - Stack frame rewriting (source maps, library frames, grouping exclusion)
//! - Document projection with metadata overlay rules
//! - Prometheus counters for transformed events, stacktraces and frames
//!
//! The domain types and the grouping/culprit algorithms live in
//! `loom-apm-core`.

pub mod config;
pub mod context;
pub mod decode;
pub mod decoder;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod processor;
pub mod sourcemap;
pub mod stacktrace;
pub mod transform;

pub use config::{ApmConfig, ApmConfigLayer};
pub use context::{ContextDecoder, IntakeContextDecoder};
pub use decoder::ErrorEventDecoder;
pub use error::{
	ApmServerError, ContextError, DecodeError, FieldError, FieldErrorKind, FieldErrors, Result,
	SourcemapError,
};
pub use metadata::{Metadata, MetadataFormatter, Process, System};
pub use metrics::{ErrorMetrics, ErrorMetricsSnapshot};
pub use processor::ErrorProcessor;
pub use sourcemap::{Mapping, SourcemapId, SourcemapMapper, StaticSourcemapMapper};
pub use stacktrace::{FrameTransformer, StacktraceTransformer};
pub use transform::{ErrorDocument, ErrorTransformer, TransformContext};
