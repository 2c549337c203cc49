// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types, error taxonomy, and trait seams for the Switchboard
//! conversation session orchestrator.
//!
//! Everything the component crates share lives here: the session data
//! model, the observer-facing event vocabulary, the retry policy used
//! by both the upstream bridge and the store writer, and the traits
//! through which external collaborators (subject transport, durable
//! record sink, state store) are consumed.

pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::SwitchboardError;
pub use retry::RetryPolicy;
pub use traits::{RecordSink, StateStore, SubjectTransport, UpstreamSink};
