// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock subject-facing transport capturing outbound messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use switchboard_core::types::{DeliveryReceipt, DeliveryStatus};
use switchboard_core::{SubjectTransport, SwitchboardError};

/// One captured outbound delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub subject_id: String,
    pub body: String,
}

/// Subject transport that records everything it is asked to deliver.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentMessage>>,
    fail_sends: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every send fails as if the provider were down.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Everything delivered so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubjectTransport for MockTransport {
    async fn send_message(
        &self,
        subject_id: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, SwitchboardError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SwitchboardError::Internal(
                "scripted transport failure".into(),
            ));
        }
        self.sent.lock().unwrap().push(SentMessage {
            subject_id: subject_id.to_string(),
            body: body.to_string(),
        });
        Ok(DeliveryReceipt {
            delivery_id: uuid::Uuid::new_v4().to_string(),
            status: DeliveryStatus::Sent,
        })
    }
}
