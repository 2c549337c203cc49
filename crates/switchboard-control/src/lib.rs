// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle and AI-vs-human control arbitration.
//!
//! Each live conversation is owned by one [`actor::SessionActor`]; all
//! mutations of a session flow through its mailbox and are applied in
//! arrival order. The [`arbiter::ControlArbiter`] is the front door:
//! it spawns actors, enforces the tenant boundary on every command,
//! and runs the inactivity sweep.
//!
//! Control-state transitions persist before they become observable:
//! a `join` or control end that cannot be written durably is aborted
//! and reported, never applied in memory only.

pub mod actor;
pub mod arbiter;
pub mod registry;

pub use actor::{SessionCommand, StatusView};
pub use arbiter::{ControlArbiter, JoinRequest, LeaveRequest};
pub use registry::SessionRegistry;
