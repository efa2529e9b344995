// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom APM error event pipeline.
//!
//! This crate provides the typed domain model for error events reported by
//! instrumented applications, together with the pure algorithms that run on
//! it. It is used by `loom-server-apm`, which decodes intake records into
//! these types and transforms them into output documents.
//!
//! # Overview
//!
//! - [`ErrorEvent`] with at most one [`Exception`] and at most one [`Log`]
//! - [`Stacktrace`] frames with library/source-map capability queries
//! - [`Context`] bundle shared by all event kinds (user, service, labels, ...)
//! - [`compute_grouping_key`] to cluster recurring errors
//! - [`resolve_culprit`] to blame a source-mapped application frame
//! - [`fields`] helpers implementing the output document presence rules

pub mod context;
pub mod culprit;
pub mod event;
pub mod fields;
pub mod grouping;
pub mod stacktrace;

pub use context::{
	Context, Custom, Http, HttpRequest, HttpResponse, Labels, NamedVersion, Page, Service,
	ServiceNode, Socket, Url, User,
};
pub use culprit::{find_sourcemapped_app_frame, resolve_culprit};
pub use event::{ErrorEvent, Exception, ExceptionCode, Log};
pub use fields::Fields;
pub use grouping::{compute_grouping_key, GroupingKey};
pub use stacktrace::{Frame, FrameSourcemap, OriginalFrame, Stacktrace};
