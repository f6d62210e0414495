//! FleetBatch Server Library
//!
//! Asynchronous batch import/export service for vehicle records.
//!
//! # Overview
//!
//! - **Batch API**: queue CSV imports and filtered exports, download finished
//!   export artifacts, inspect job status
//! - **Job Queue**: PostgreSQL-backed queue with per-job retry policies,
//!   claimed with `FOR UPDATE SKIP LOCKED`
//! - **Worker Pool**: fixed number of tokio tasks processing import and
//!   export jobs
//! - **Notifications**: broadcast fan-out of job outcomes over WebSocket
//!
//! # Architecture
//!
//! HTTP handlers only validate and enqueue; all heavy work happens in the
//! worker pool. Features are organized as vertical slices (commands, queries,
//! routes) under [`features`].
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP routing, multipart upload, WebSocket upgrade
//! - **SQLx**: PostgreSQL pool, migrations and runtime-checked queries
//! - **Tower**: tracing and CORS middleware

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod jobs;
pub mod notify;
pub mod worker;
