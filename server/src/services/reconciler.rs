use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use gw2map_client::{LiveRegistry, TileViewport};
use gw2map_shared::{ConnectionState, LiveEvent, MapContext, PlayerSummary, Vector2};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{info, warn};

use crate::config::{frame_interval, local_account, marker_tuning, sweep_interval};
use crate::state::{AppState, PreSerializedEvent};

/// Visible region in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldRect {
    pub min: Vector2,
    pub max: Vector2,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcilerCommand {
    SwitchContext(MapContext),
    /// `None` treats the whole map as visible.
    SetViewport(Option<WorldRect>),
}

#[derive(Serialize)]
struct SnapshotPayload<'a> {
    seq: u64,
    context: MapContext,
    connection: ConnectionState,
    players: &'a [PlayerSummary],
}

pub async fn run(
    state: AppState,
    payloads: mpsc::Receiver<Bytes>,
    commands: mpsc::Receiver<ReconcilerCommand>,
) {
    let context = state.live_snapshot.read().await.context;
    let registry = LiveRegistry::new(TileViewport::for_context(context), context, marker_tuning())
        .with_local_account(local_account());
    run_with(state, registry, payloads, commands, frame_interval(), sweep_interval()).await;
}

/// The single task that owns the registry. Payloads, frame ticks, expiry
/// sweeps and commands are handled strictly one at a time.
pub(crate) async fn run_with(
    state: AppState,
    registry: LiveRegistry<TileViewport>,
    mut payloads: mpsc::Receiver<Bytes>,
    mut commands: mpsc::Receiver<ReconcilerCommand>,
    frame_every: Duration,
    sweep_every: Duration,
) {
    let mut frames = interval(frame_every);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sweeps = interval_at(Instant::now() + sweep_every, sweep_every);
    let mut connection = state.connection.subscribe();

    let mut reconciler = Reconciler {
        state,
        registry,
        dirty: true,
        resync: false,
    };
    let mut payloads_open = true;
    let mut commands_open = true;

    info!(
        frame_ms = frame_every.as_millis() as u64,
        sweep_secs = sweep_every.as_secs(),
        context = ?reconciler.registry.context(),
        "live reconciler started"
    );

    loop {
        tokio::select! {
            payload = payloads.recv(), if payloads_open => match payload {
                Some(payload) => reconciler.handle_payload(&payload),
                None => {
                    info!("live payload source closed; markers will age out");
                    payloads_open = false;
                }
            },
            _ = frames.tick() => {
                reconciler.handle_frame();
                reconciler.publish().await;
            }
            _ = sweeps.tick() => {
                reconciler.handle_sweep();
                reconciler.publish().await;
            }
            command = commands.recv(), if commands_open => match command {
                Some(command) => {
                    reconciler.handle_command(command);
                    reconciler.publish().await;
                }
                None => commands_open = false,
            },
            changed = connection.changed() => {
                if changed.is_err() {
                    warn!("connection state publisher dropped; stopping live reconciler");
                    return;
                }
                let current = *connection.borrow_and_update();
                reconciler.emit(&LiveEvent::Connection { state: current });
                reconciler.dirty = true;
            }
        }
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

struct Reconciler {
    state: AppState,
    registry: LiveRegistry<TileViewport>,
    /// Players or primitives changed since the last publish.
    dirty: bool,
    /// Broadcast the next published snapshot so clients replace their list.
    resync: bool,
}

impl Reconciler {
    fn handle_payload(&mut self, payload: &[u8]) {
        self.state.observability.record_payload();
        match self.registry.handle_payload(payload, now()) {
            Ok(Some(event)) => {
                match &event {
                    LiveEvent::Created { .. } => self.state.observability.record_marker_created(),
                    LiveEvent::Removed { .. } => self.state.observability.record_marker_deleted(),
                    _ => {}
                }
                self.emit(&event);
                self.dirty = true;
            }
            // Keepalives move `last_message_at` without an event.
            Ok(None) => self.dirty = true,
            Err(_) => self.state.observability.record_rejected_payload(),
        }
    }

    fn handle_frame(&mut self) {
        if self.registry.advance(now()) > 0 {
            self.dirty = true;
        }
    }

    fn handle_sweep(&mut self) {
        let events = self.registry.sweep(now());
        if events.is_empty() {
            return;
        }
        self.state
            .observability
            .record_markers_expired(events.len() as u64);
        for event in &events {
            self.emit(event);
        }
        self.dirty = true;
    }

    fn handle_command(&mut self, command: ReconcilerCommand) {
        match command {
            ReconcilerCommand::SwitchContext(context) => {
                let events = self.registry.switch_context(context);
                if events.is_empty() {
                    return;
                }
                self.state.observability.record_context_switch();
                let topic = self.state.channel_settings.topic(context);
                self.state.topic.send_replace(topic);
                for event in &events {
                    self.emit(event);
                }
                self.dirty = true;
                self.resync = true;
            }
            ReconcilerCommand::SetViewport(Some(rect)) => {
                self.registry
                    .surface_mut()
                    .set_visible_world_rect(rect.min, rect.max);
            }
            ReconcilerCommand::SetViewport(None) => {
                self.registry.surface_mut().clear_bounds();
            }
        }
    }

    fn emit(&self, event: &LiveEvent) {
        let json = match serde_json::to_vec(event) {
            Ok(json) => Arc::new(Bytes::from(json)),
            Err(e) => {
                warn!("failed to serialize live event: {e}");
                return;
            }
        };
        let seq = self.state.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.state.event_tx.send(PreSerializedEvent::Update { seq, json });
    }

    async fn publish(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let seq = self.state.next_seq.load(Ordering::Relaxed);
        let context = self.registry.context();
        let players = self.registry.players();
        let snapshot = SnapshotPayload {
            seq,
            context,
            connection: self.state.connection_state(),
            players: &players,
        };

        let (snapshot_json, players_json, markers_json) = match (
            serde_json::to_vec(&snapshot),
            serde_json::to_vec(&players),
            serde_json::to_vec(&self.registry.markers()),
        ) {
            (Ok(snapshot), Ok(players), Ok(markers)) => (snapshot, players, markers),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                warn!("failed to serialize live snapshot: {e}");
                return;
            }
        };

        let snapshot_json = Arc::new(Bytes::from(snapshot_json));
        {
            let mut current = self.state.live_snapshot.write().await;
            current.seq = seq;
            current.context = context;
            current.updated_at = Utc::now();
            current.players = players;
            current.snapshot_json = Arc::clone(&snapshot_json);
            current.players_json = Arc::new(Bytes::from(players_json));
            current.markers_json = Arc::new(Bytes::from(markers_json));
            current.skipped_moves = self.registry.skipped_moves();
        }

        if std::mem::take(&mut self.resync) {
            let _ = self.state.event_tx.send(PreSerializedEvent::Snapshot {
                seq,
                json: snapshot_json,
            });
        }
    }
}
