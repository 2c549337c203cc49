// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams for external collaborators.
//!
//! The orchestrator consumes its collaborators (state store, subject
//! transport, durable record sink, upstream channel) through these
//! traits. All use `#[async_trait]` for dynamic dispatch.

pub mod records;
pub mod store;
pub mod transport;
pub mod upstream;

pub use records::RecordSink;
pub use store::StateStore;
pub use transport::SubjectTransport;
pub use upstream::UpstreamSink;
