// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock upstream sink capturing forwarded utterances and hints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use switchboard_core::{SwitchboardError, UpstreamSink};

/// Upstream sink recording what the arbiter forwards to the AI.
pub struct MockUpstream {
    utterances: Mutex<Vec<String>>,
    hints: Mutex<Vec<String>>,
    tool_results: Mutex<Vec<(String, serde_json::Value)>>,
    connected: AtomicBool,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self {
            utterances: Mutex::new(Vec::new()),
            hints: Mutex::new(Vec::new()),
            tool_results: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Subject utterances forwarded so far, in order.
    pub fn utterances(&self) -> Vec<String> {
        self.utterances.lock().unwrap().clone()
    }

    pub fn hints(&self) -> Vec<String> {
        self.hints.lock().unwrap().clone()
    }

    pub fn tool_results(&self) -> Vec<(String, serde_json::Value)> {
        self.tool_results.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamSink for MockUpstream {
    async fn send_subject_utterance(&self, text: &str) -> Result<(), SwitchboardError> {
        if self.is_connected() {
            self.utterances.lock().unwrap().push(text.to_string());
        }
        Ok(())
    }

    async fn send_context_hint(&self, hint: &str) -> Result<(), SwitchboardError> {
        if self.is_connected() {
            self.hints.lock().unwrap().push(hint.to_string());
        }
        Ok(())
    }

    async fn send_tool_result(
        &self,
        tool_call_id: &str,
        result: serde_json::Value,
    ) -> Result<(), SwitchboardError> {
        if self.is_connected() {
            self.tool_results
                .lock()
                .unwrap()
                .push((tool_call_id.to_string(), result));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
