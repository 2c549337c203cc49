// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! Provides mock collaborators for fast, deterministic, CI-runnable
//! tests without external services.
//!
//! # Components
//!
//! - [`MemoryStore`] - In-memory [`StateStore`] with scripted write failures
//! - [`MockTransport`] - Subject transport capturing outbound messages
//! - [`MockUpstream`] - Upstream sink capturing forwarded utterances
//! - [`MockRecordSink`] - Durable record sink capturing session events

pub mod memory_store;
pub mod mock_record_sink;
pub mod mock_transport;
pub mod mock_upstream;

pub use memory_store::MemoryStore;
pub use mock_record_sink::MockRecordSink;
pub use mock_transport::MockTransport;
pub use mock_upstream::MockUpstream;
