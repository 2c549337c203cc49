// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed accessor over the state store for session and control-session
//! records.
//!
//! No business rules live here. The control arbiter is the only writer
//! of `control_owner`/`control_session_id`, which prevents lost updates
//! by construction (single writer per field, not optimistic locking).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use switchboard_core::types::{ControlSession, Session, SessionId};
use switchboard_core::{StateStore, SwitchboardError};

/// Sessions expire from the store this long after their last write.
/// Live sessions are refreshed on every touch, so only abandoned
/// records actually age out.
const SESSION_TTL: Duration = Duration::from_secs(24 * 3600);

/// Lookup/update layer over the store keyed by session id.
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn StateStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    fn session_key(id: &SessionId) -> String {
        format!("session:{id}")
    }

    fn control_key(id: &SessionId) -> String {
        format!("control:{id}")
    }

    pub async fn get(&self, id: &SessionId) -> Result<Option<Session>, SwitchboardError> {
        match self.store.get(&Self::session_key(id)).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SwitchboardError::Persistence { source: Box::new(e) }),
            None => Ok(None),
        }
    }

    pub async fn upsert(&self, session: &Session) -> Result<(), SwitchboardError> {
        let value = serde_json::to_value(session)
            .map_err(|e| SwitchboardError::Persistence { source: Box::new(e) })?;
        self.store
            .set_with_expiry(&Self::session_key(&session.session_id), value, SESSION_TTL)
            .await
    }

    /// Refresh the stored session's activity timestamp, leaving every
    /// other field as last written. Touching an absent session is a
    /// no-op.
    pub async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), SwitchboardError> {
        if let Some(mut session) = self.get(id).await? {
            session.last_activity_at = at;
            self.upsert(&session).await?;
        }
        Ok(())
    }

    /// Remove the session and any control-session record with it.
    pub async fn delete(&self, id: &SessionId) -> Result<(), SwitchboardError> {
        self.store.delete(&Self::session_key(id)).await?;
        self.store.delete(&Self::control_key(id)).await
    }

    pub async fn get_control(
        &self,
        id: &SessionId,
    ) -> Result<Option<ControlSession>, SwitchboardError> {
        match self.store.get(&Self::control_key(id)).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SwitchboardError::Persistence { source: Box::new(e) }),
            None => Ok(None),
        }
    }

    pub async fn upsert_control(
        &self,
        control: &ControlSession,
    ) -> Result<(), SwitchboardError> {
        let value = serde_json::to_value(control)
            .map_err(|e| SwitchboardError::Persistence { source: Box::new(e) })?;
        self.store
            .set_with_expiry(&Self::control_key(&control.session_id), value, SESSION_TTL)
            .await
    }
}
