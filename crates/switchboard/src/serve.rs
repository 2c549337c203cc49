// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve` command implementation.
//!
//! Wires the full orchestrator: SQLite state store, broadcast hub,
//! control arbiter with its inactivity sweep, rate limiter, task
//! sweeper, session launcher, and the gateway control plane. Supports
//! graceful shutdown via signal handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn};

use switchboard_bridge::EventLogSettings;
use switchboard_config::model::SwitchboardConfig;
use switchboard_control::ControlArbiter;
use switchboard_core::types::{DeliveryReceipt, DeliveryStatus, SessionEvent, SessionId};
use switchboard_core::{RecordSink, StateStore, SubjectTransport, SwitchboardError};
use switchboard_gateway::{AuthConfig, GatewayState, ServerConfig};
use switchboard_hub::BroadcastHub;
use switchboard_limiter::RateLimiter;
use switchboard_store::{SqliteStore, TaskSweeper};

use crate::launcher::SessionLauncher;
use crate::shutdown;
use crate::tasks::DeliveryExecutor;

/// Subject transport used until a provider integration is wired in.
///
/// The provider seam is [`SubjectTransport`]; this stand-in logs the
/// delivery and reports it queued so the rest of the pipeline is fully
/// exercised.
struct LoggingTransport;

#[async_trait]
impl SubjectTransport for LoggingTransport {
    async fn send_message(
        &self,
        subject_id: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, SwitchboardError> {
        info!(subject_id, chars = body.len(), "outbound subject message");
        Ok(DeliveryReceipt {
            delivery_id: uuid::Uuid::new_v4().to_string(),
            status: DeliveryStatus::Queued,
        })
    }
}

/// Durable record sink keeping a capped per-session event trail in the
/// state store. A CRM or billing integration replaces this by
/// implementing [`RecordSink`] against its own backend.
struct StoreRecordSink {
    store: Arc<dyn StateStore>,
    cap: usize,
    ttl: Duration,
}

#[async_trait]
impl RecordSink for StoreRecordSink {
    async fn record(
        &self,
        session_id: &SessionId,
        event: &SessionEvent,
    ) -> Result<(), SwitchboardError> {
        let entry = serde_json::to_value(event)
            .map_err(|e| SwitchboardError::Internal(format!("event not serializable: {e}")))?;
        self.store
            .append_to_list(&format!("records:{session_id}"), entry, self.cap, self.ttl)
            .await
    }
}

/// Runs the `switchboard serve` command.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.orchestrator.log_level);

    info!(name = config.orchestrator.name.as_str(), "starting switchboard serve");

    // Fail-closed: refuse to start the control plane without auth.
    if config.gateway.bearer_token.is_none() {
        return Err(SwitchboardError::Config(
            "gateway has no authentication configured; set gateway.bearer_token".into(),
        ));
    }

    let store: Arc<dyn StateStore> = Arc::new(SqliteStore::open(&config.store).await?);
    info!(path = config.store.database_path.as_str(), "state store ready");

    let hub = Arc::new(BroadcastHub::new(
        config.hub.observer_buffer,
        Duration::from_secs(config.hub.liveness_interval_secs),
    ));
    let records = Arc::new(StoreRecordSink {
        store: store.clone(),
        cap: config.store.event_log_cap,
        ttl: Duration::from_secs(config.store.event_log_ttl_hours * 3600),
    });
    let arbiter = Arc::new(
        ControlArbiter::new(
            store.clone(),
            hub.clone(),
            config.control.mailbox_depth,
            Duration::from_secs(config.control.inactivity_timeout_mins * 60),
        )
        .with_session_idle_timeout(Duration::from_secs(
            config.control.session_idle_timeout_mins * 60,
        ))
        .with_record_sink(records),
    );
    let limiter = Arc::new(RateLimiter::new(store.clone(), config.limits.clone()));
    let transport: Arc<dyn SubjectTransport> = Arc::new(LoggingTransport);

    let launcher = Arc::new(SessionLauncher::new(
        config.upstream.clone(),
        store.clone(),
        arbiter.clone(),
        transport.clone(),
        EventLogSettings {
            cap: config.store.event_log_cap,
            ttl: Duration::from_secs(config.store.event_log_ttl_hours * 3600),
        },
    ));

    // Install signal handler.
    let cancel = shutdown::install_signal_handler();

    // Observer liveness ticks.
    {
        let hub = hub.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { hub.run_liveness(cancel).await });
    }

    // Inactivity sweep over live control sessions and idle conversations.
    {
        let arbiter = arbiter.clone();
        let cancel = cancel.clone();
        let interval = Duration::from_secs(config.control.sweep_interval_mins * 60);
        tokio::spawn(async move { arbiter.run_sweep(interval, cancel).await });
        info!(
            interval_mins = config.control.sweep_interval_mins,
            timeout_mins = config.control.inactivity_timeout_mins,
            session_idle_mins = config.control.session_idle_timeout_mins,
            "inactivity sweep started"
        );
    }

    // Deferred-task sweep (scheduled subject deliveries).
    {
        let sweeper = TaskSweeper::new(
            store.clone(),
            Arc::new(DeliveryExecutor::new(transport.clone(), limiter.clone())),
            Duration::from_secs(config.store.task_poll_secs),
        );
        let cancel = cancel.clone();
        tokio::spawn(async move { sweeper.run(cancel).await });
        info!(poll_secs = config.store.task_poll_secs, "task sweeper started");
    }

    // Gateway control plane; serves until the cancel token fires.
    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
        bearer_token: config.gateway.bearer_token.clone(),
    };
    let state = GatewayState {
        arbiter: arbiter.clone(),
        hub,
        limiter,
        launcher,
        auth: AuthConfig {
            bearer_token: config.gateway.bearer_token.clone(),
        },
        start_time: Instant::now(),
    };
    let result = switchboard_gateway::start_server(&server_config, state, cancel.clone()).await;

    // Shutdown: stop every bridge; the actors drain and flush.
    arbiter.shutdown();
    if let Err(err) = &result {
        warn!(error = %err, "gateway exited with error");
    }
    info!("switchboard serve shutdown complete");
    result
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
