// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules over the single-writer [`Database`](crate::database::Database).

pub mod kv;
pub mod lists;
pub mod tasks;
pub mod windows;
