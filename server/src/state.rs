use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use gw2map_shared::{ChannelSettings, ConnectionState, MapContext, PlayerSummary};
use tokio::sync::{RwLock, broadcast, mpsc, watch};

use crate::config::{COMMAND_QUEUE, event_buffer};
use crate::services::reconciler::ReconcilerCommand;

/// SSE event serialized once by the reconciler and shared by every client.
#[derive(Debug, Clone)]
pub enum PreSerializedEvent {
    Snapshot { seq: u64, json: Arc<Bytes> },
    Update { seq: u64, json: Arc<Bytes> },
}

/// Latest published view of the registry.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    pub seq: u64,
    pub context: MapContext,
    pub updated_at: DateTime<Utc>,
    pub players: Vec<PlayerSummary>,
    pub snapshot_json: Arc<Bytes>,
    pub players_json: Arc<Bytes>,
    pub markers_json: Arc<Bytes>,
    /// Off-screen moves skipped by the markers currently tracked.
    pub skipped_moves: u64,
}

impl LiveSnapshot {
    pub fn empty(context: MapContext) -> Self {
        Self {
            seq: 0,
            context,
            updated_at: Utc::now(),
            players: Vec::new(),
            snapshot_json: Arc::new(Bytes::new()),
            players_json: Arc::new(Bytes::from_static(b"[]")),
            markers_json: Arc::new(Bytes::from_static(b"[]")),
            skipped_moves: 0,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub live_snapshot: Arc<RwLock<LiveSnapshot>>,
    pub next_seq: Arc<AtomicU64>,
    pub event_tx: broadcast::Sender<PreSerializedEvent>,
    pub command_tx: mpsc::Sender<ReconcilerCommand>,
    /// Published by the transport, forwarded to clients unchanged.
    pub connection: Arc<watch::Sender<ConnectionState>>,
    /// Topic the transport should be subscribed to. `None` means no shared
    /// topic for the current channel and context.
    pub topic: Arc<watch::Sender<Option<String>>>,
    pub channel_settings: Arc<ChannelSettings>,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    payloads_received_total: AtomicU64,
    payloads_rejected_total: AtomicU64,
    markers_created_total: AtomicU64,
    markers_deleted_total: AtomicU64,
    markers_expired_total: AtomicU64,
    context_switches_total: AtomicU64,
    transport_reconnects_total: AtomicU64,
    live_requests_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObservabilitySnapshot {
    pub payloads_received_total: u64,
    pub payloads_rejected_total: u64,
    pub markers_created_total: u64,
    pub markers_deleted_total: u64,
    pub markers_expired_total: u64,
    pub context_switches_total: u64,
    pub transport_reconnects_total: u64,
    pub live_requests_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            payloads_received_total: self.payloads_received_total.load(Ordering::Relaxed),
            payloads_rejected_total: self.payloads_rejected_total.load(Ordering::Relaxed),
            markers_created_total: self.markers_created_total.load(Ordering::Relaxed),
            markers_deleted_total: self.markers_deleted_total.load(Ordering::Relaxed),
            markers_expired_total: self.markers_expired_total.load(Ordering::Relaxed),
            context_switches_total: self.context_switches_total.load(Ordering::Relaxed),
            transport_reconnects_total: self.transport_reconnects_total.load(Ordering::Relaxed),
            live_requests_total: self.live_requests_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_payload(&self) {
        self.payloads_received_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_payload(&self) {
        self.payloads_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_marker_created(&self) {
        self.markers_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_marker_deleted(&self) {
        self.markers_deleted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_markers_expired(&self, count: u64) {
        self.markers_expired_total
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_context_switch(&self) {
        self.context_switches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_reconnect(&self) {
        self.transport_reconnects_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_live_request(&self) {
        self.live_requests_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    /// Build the shared state and the command queue the reconciler drains.
    pub fn new(
        settings: ChannelSettings,
        context: MapContext,
    ) -> (Self, mpsc::Receiver<ReconcilerCommand>) {
        let (event_tx, _) = broadcast::channel(event_buffer());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (connection, _) = watch::channel(ConnectionState::Unknown);
        let (topic, _) = watch::channel(settings.topic(context));

        let state = Self {
            live_snapshot: Arc::new(RwLock::new(LiveSnapshot::empty(context))),
            next_seq: Arc::new(AtomicU64::new(0)),
            event_tx,
            command_tx,
            connection: Arc::new(connection),
            topic: Arc::new(topic),
            channel_settings: Arc::new(settings),
            observability: Arc::new(ObservabilityCounters::default()),
        };
        (state, command_rx)
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.connection.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    pub fn current_topic(&self) -> Option<String> {
        self.topic.borrow().clone()
    }
}
