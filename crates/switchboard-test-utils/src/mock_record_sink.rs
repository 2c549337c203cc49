// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock durable record sink capturing recorded session events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use switchboard_core::types::{SessionEvent, SessionId};
use switchboard_core::{RecordSink, SwitchboardError};

/// Record sink that keeps every event it is offered.
#[derive(Default)]
pub struct MockRecordSink {
    recorded: Mutex<Vec<SessionEvent>>,
    fail_records: AtomicBool,
}

impl MockRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every record call fails as if the sink were down.
    pub fn set_fail_records(&self, fail: bool) {
        self.fail_records.store(fail, Ordering::SeqCst);
    }

    /// Everything recorded so far, in order.
    pub fn recorded(&self) -> Vec<SessionEvent> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MockRecordSink {
    async fn record(
        &self,
        _session_id: &SessionId,
        event: &SessionEvent,
    ) -> Result<(), SwitchboardError> {
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(SwitchboardError::Internal("scripted sink failure".into()));
        }
        self.recorded.lock().unwrap().push(event.clone());
        Ok(())
    }
}
