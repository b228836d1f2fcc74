use std::collections::HashMap;
use std::time::Instant;

use gw2map_shared::{
    LiveEvent, LiveMessage, MapContext, PlayerSummary, Rejection, RemovalReason, Vector2,
    decode_or_reject,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::layer::{CanvasMarker, MarkerId};
use crate::marker::{LiveMarker, MarkerTuning};
use crate::viewport::MapSurface;

/// A rendered primitive together with the account it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMarker {
    pub account_name: String,
    pub id: MarkerId,
    #[serde(flatten)]
    pub primitive: CanvasMarker,
}

/// Owns every tracked character for one map context and the surface their
/// primitives live on.
///
/// Only movement messages create entries. State, keepalive and delete
/// messages for an account that is not tracked are logged and dropped.
#[derive(Debug)]
pub struct LiveRegistry<S: MapSurface> {
    surface: S,
    markers: HashMap<String, LiveMarker>,
    context: MapContext,
    local_account: Option<String>,
    tuning: MarkerTuning,
}

impl<S: MapSurface> LiveRegistry<S> {
    pub fn new(surface: S, context: MapContext, tuning: MarkerTuning) -> Self {
        Self {
            surface,
            markers: HashMap::new(),
            context,
            local_account: None,
            tuning,
        }
    }

    /// Mark `account` as the viewer's own account.
    pub fn with_local_account(mut self, account: Option<String>) -> Self {
        self.local_account = account.filter(|a| !a.is_empty());
        self
    }

    /// Decode and apply one raw payload. Rejected payloads are logged and
    /// leave the registry untouched.
    pub fn handle_payload(
        &mut self,
        payload: &[u8],
        now: Instant,
    ) -> Result<Option<LiveEvent>, Rejection> {
        match decode_or_reject(payload) {
            Ok(message) => Ok(self.apply(message, now)),
            Err(rejection) => {
                match &rejection {
                    Rejection::Malformed(reason) => {
                        warn!(error = %reason, "dropping malformed live payload");
                    }
                    Rejection::UnknownType(kind) => {
                        debug!(kind = %kind, "ignoring unknown live message type");
                    }
                    Rejection::InvalidFields { kind, reason } => {
                        warn!(
                            kind = %kind,
                            error = %reason,
                            "dropping live message with invalid fields"
                        );
                    }
                }
                Err(rejection)
            }
        }
    }

    pub fn apply(&mut self, message: LiveMessage, now: Instant) -> Option<LiveEvent> {
        match message {
            LiveMessage::UpsertCharacterMovement(movement) => {
                if !movement.map_position.is_finite() {
                    warn!(
                        account = %movement.account_name,
                        "dropping movement with non-finite position"
                    );
                    return None;
                }
                if let Some(marker) = self.markers.get_mut(&movement.account_name) {
                    marker.update_position(&mut self.surface, &movement, now);
                    return Some(LiveEvent::Updated {
                        account_name: movement.account_name,
                    });
                }

                let is_self =
                    self.local_account.as_deref() == Some(movement.account_name.as_str());
                let marker =
                    LiveMarker::create(&mut self.surface, &movement, is_self, now, self.tuning);
                debug!(account = %movement.account_name, "tracking new character");
                self.markers.insert(movement.account_name.clone(), marker);
                Some(LiveEvent::Created {
                    account_name: movement.account_name,
                })
            }
            LiveMessage::UpdateCharacterState(state) => {
                let Some(marker) = self.markers.get_mut(&state.account_name) else {
                    debug!(account = %state.account_name, "ignoring state for untracked character");
                    return None;
                };
                marker.update_classification(&mut self.surface, &state, now);
                Some(LiveEvent::Updated {
                    account_name: state.account_name,
                })
            }
            LiveMessage::UpdateCharacterKeepAlive(keepalive) => {
                match self.markers.get_mut(&keepalive.account_name) {
                    Some(marker) => marker.refresh_last_seen(now),
                    None => {
                        debug!(
                            account = %keepalive.account_name,
                            "ignoring keepalive for untracked character"
                        );
                    }
                }
                None
            }
            LiveMessage::DeleteCharacterData(deletion) => {
                let Some(mut marker) = self.markers.remove(&deletion.account_name) else {
                    debug!(
                        account = %deletion.account_name,
                        "ignoring delete for untracked character"
                    );
                    return None;
                };
                marker.destroy(&mut self.surface);
                Some(LiveEvent::Removed {
                    account_name: deletion.account_name,
                    reason: RemovalReason::Deleted,
                })
            }
        }
    }

    /// Drive every marker's animations. Returns how many primitives changed.
    pub fn advance(&mut self, now: Instant) -> usize {
        let surface = &mut self.surface;
        self.markers
            .values_mut()
            .map(|marker| marker.advance(surface, now))
            .filter(|changed| *changed)
            .count()
    }

    /// Remove every marker whose liveness lapsed.
    pub fn sweep(&mut self, now: Instant) -> Vec<LiveEvent> {
        let mut expired: Vec<String> = self
            .markers
            .iter()
            .filter(|(_, marker)| marker.should_expire(now))
            .map(|(account, _)| account.clone())
            .collect();
        expired.sort();

        let mut events = Vec::with_capacity(expired.len());
        for account in expired {
            if let Some(mut marker) = self.markers.remove(&account) {
                marker.destroy(&mut self.surface);
                events.push(LiveEvent::Removed {
                    account_name: account,
                    reason: RemovalReason::Expired,
                });
            }
        }
        if !events.is_empty() {
            info!(
                expired = events.len(),
                remaining = self.markers.len(),
                "expired stale live markers"
            );
        }
        events
    }

    /// Move to another map. Every tracked character is dropped.
    pub fn switch_context(&mut self, context: MapContext) -> Vec<LiveEvent> {
        if context == self.context {
            return Vec::new();
        }
        let mut events = self.clear(RemovalReason::ContextSwitched);
        self.context = context;
        self.surface.set_context(context);
        info!(?context, "switched live map context");
        events.push(LiveEvent::ContextChanged { context });
        events
    }

    pub fn clear(&mut self, reason: RemovalReason) -> Vec<LiveEvent> {
        let mut drained: Vec<(String, LiveMarker)> = self.markers.drain().collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        drained
            .into_iter()
            .map(|(account_name, mut marker)| {
                marker.destroy(&mut self.surface);
                LiveEvent::Removed {
                    account_name,
                    reason,
                }
            })
            .collect()
    }

    /// The "who's online" listing, ordered by account name.
    pub fn players(&self) -> Vec<PlayerSummary> {
        let mut players: Vec<PlayerSummary> =
            self.markers.values().map(LiveMarker::summary).collect();
        players.sort_by(|a, b| a.account_name.cmp(&b.account_name));
        players
    }

    /// Newest reported position of a tracked account, for panning or following.
    pub fn locate(&self, account: &str) -> Option<Vector2> {
        self.markers.get(account).map(LiveMarker::position)
    }

    pub fn markers(&self) -> Vec<RenderedMarker> {
        let mut rendered: Vec<RenderedMarker> = self
            .markers
            .values()
            .filter_map(|marker| {
                let id = marker.primitive()?;
                let primitive = self.surface.primitive(id)?;
                Some(RenderedMarker {
                    account_name: marker.account_name().to_string(),
                    id,
                    primitive: primitive.clone(),
                })
            })
            .collect();
        rendered.sort_by(|a, b| a.account_name.cmp(&b.account_name));
        rendered
    }

    /// Moves dropped because the marker stayed off screen, summed over every
    /// tracked marker.
    pub fn skipped_moves(&self) -> u64 {
        self.markers.values().map(LiveMarker::skipped_moves).sum()
    }

    pub fn get(&self, account: &str) -> Option<&LiveMarker> {
        self.markers.get(account)
    }

    pub fn contains(&self, account: &str) -> bool {
        self.markers.contains_key(account)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn context(&self) -> MapContext {
        self.context
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}
