// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subject-facing transport trait (SMS/voice provider).

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::DeliveryReceipt;

/// Outbound delivery to the customer, bypassing the realtime channel.
///
/// Used for human-authored sends and for AI-authored sends that must
/// reach the subject outside the live voice session (SMS continuation).
#[async_trait]
pub trait SubjectTransport: Send + Sync {
    /// Deliver `body` to the subject identified by `subject_id`.
    async fn send_message(
        &self,
        subject_id: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, SwitchboardError>;
}
