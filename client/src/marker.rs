use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gw2map_shared::{CharacterMovement, CharacterState, Classification, PlayerSummary, Vector2};

use crate::animation::Track;
use crate::geometry::{AnglePath, heading_of};
use crate::icons;
use crate::interpolator::{CurveInterpolator, CurveTuning, FrameSequence};
use crate::layer::{CanvasMarker, MarkerId};
use crate::viewport::MapSurface;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerTuning {
    pub curve: CurveTuning,
    /// Micro-steps per heading change.
    pub heading_steps: u32,
    pub heading_step: Duration,
    /// Liveness timeout checked by the registry sweep.
    pub expiry: Duration,
}

impl Default for MarkerTuning {
    fn default() -> Self {
        Self {
            curve: CurveTuning::default(),
            heading_steps: 180,
            heading_step: Duration::from_millis(1),
            expiry: Duration::from_secs(40),
        }
    }
}

impl MarkerTuning {
    pub fn frame_cadence(&self) -> Duration {
        Duration::try_from_secs_f64(self.curve.frame_ms / 1000.0).unwrap_or(Duration::ZERO)
    }
}

/// One tracked character and the canvas primitive drawn for it.
///
/// Position and heading run as two independent tracks. A new sample replaces
/// the running position track, and a new heading replaces the running
/// heading track; neither waits on the other.
#[derive(Debug)]
pub struct LiveMarker {
    account_name: String,
    character_name: String,
    is_self: bool,
    map_id: u32,
    classification: Classification,
    interpolator: CurveInterpolator,
    position_track: Option<Track<FrameSequence>>,
    heading_track: Option<Track<AnglePath>>,
    /// Target heading from the newest forward vector.
    heading: f64,
    rendered_heading: f64,
    rendered_position: Vector2,
    primitive: Option<MarkerId>,
    last_seen: Instant,
    last_message_at: DateTime<Utc>,
    skipped_moves: u64,
    tuning: MarkerTuning,
}

impl LiveMarker {
    /// Place a new marker at the movement's position and attach it to the
    /// surface's layer.
    pub fn create<S: MapSurface>(
        surface: &mut S,
        movement: &CharacterMovement,
        is_self: bool,
        now: Instant,
        tuning: MarkerTuning,
    ) -> Self {
        let heading = heading_of(movement.character_forward).unwrap_or(0.0);
        let mut interpolator = CurveInterpolator::new(tuning.curve);
        interpolator.push_sample(movement.map_position, now);

        let mut marker = Self {
            account_name: movement.account_name.clone(),
            character_name: movement.character_name.clone(),
            is_self,
            map_id: movement.map_id,
            classification: Classification::default(),
            interpolator,
            position_track: None,
            heading_track: None,
            heading,
            rendered_heading: heading,
            rendered_position: movement.map_position,
            primitive: None,
            last_seen: now,
            last_message_at: Utc::now(),
            skipped_moves: 0,
            tuning,
        };
        let primitive = marker.build_primitive(surface);
        marker.primitive = Some(surface.attach(primitive));
        marker
    }

    fn build_primitive<S: MapSurface>(&self, surface: &S) -> CanvasMarker {
        CanvasMarker {
            position: surface.project(self.rendered_position),
            rotation: self.rendered_heading,
            icon: icons::marker_icon(self.is_self),
            overlays: icons::overlays_for(&self.classification),
            tooltip: icons::tooltip(&self.character_name, &self.account_name),
        }
    }

    /// Feed a new sample. Starts a fresh frame sequence (or moves directly
    /// while the window is still filling) and a fresh heading path.
    pub fn update_position<S: MapSurface>(
        &mut self,
        surface: &mut S,
        movement: &CharacterMovement,
        now: Instant,
    ) {
        self.refresh_last_seen(now);
        self.character_name.clone_from(&movement.character_name);
        self.map_id = movement.map_id;

        self.interpolator.push_sample(movement.map_position, now);
        if let Some(mut stale) = self.position_track.take() {
            stale.cancel();
        }
        match self.interpolator.produce_frames() {
            Some(frames) => {
                self.position_track = Some(Track::new(frames, now, self.tuning.frame_cadence()));
            }
            None => {
                self.move_to(surface, movement.map_position);
            }
        }

        // A forward vector with no planar extent keeps the previous heading.
        let heading = heading_of(movement.character_forward).unwrap_or(self.heading);
        if let Some(mut stale) = self.heading_track.take() {
            stale.cancel();
        }
        self.heading_track = Some(Track::new(
            AnglePath::new(self.rendered_heading, heading, self.tuning.heading_steps),
            now,
            self.tuning.heading_step,
        ));
        self.heading = heading;
    }

    /// Replace the classification and rebuild the primitive in place so its
    /// overlays match. Position and rotation carry over.
    pub fn update_classification<S: MapSurface>(
        &mut self,
        surface: &mut S,
        state: &CharacterState,
        now: Instant,
    ) {
        self.refresh_last_seen(now);
        self.classification = state.classification();
        self.character_name.clone_from(&state.character_name);

        let Some(old) = self.primitive.take() else {
            return;
        };
        let replacement = self.build_primitive(surface);
        surface.detach(old);
        self.primitive = Some(surface.attach(replacement));
    }

    pub fn refresh_last_seen(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
        self.last_message_at = Utc::now();
    }

    pub fn should_expire(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > self.tuning.expiry
    }

    /// Cancel both tracks and detach the primitive. Returns whether a
    /// primitive was detached; later calls do nothing.
    pub fn destroy<S: MapSurface>(&mut self, surface: &mut S) -> bool {
        if let Some(mut track) = self.position_track.take() {
            track.cancel();
        }
        if let Some(mut track) = self.heading_track.take() {
            track.cancel();
        }
        match self.primitive.take() {
            Some(id) => {
                surface.detach(id);
                true
            }
            None => false,
        }
    }

    /// Apply every frame due at `now`. Returns whether the primitive changed.
    pub fn advance<S: MapSurface>(&mut self, surface: &mut S, now: Instant) -> bool {
        let Some(id) = self.primitive else {
            return false;
        };
        let mut changed = false;

        let frame = self.position_track.as_mut().and_then(|track| track.advance(now));
        if let Some(frame) = frame {
            changed |= self.move_to(surface, frame);
        }
        if self.position_track.as_mut().is_some_and(Track::is_finished) {
            self.position_track = None;
        }

        let rotation = self.heading_track.as_mut().and_then(|track| track.advance(now));
        if let Some(rotation) = rotation {
            self.rendered_heading = rotation;
            if let Some(primitive) = surface.primitive_mut(id) {
                primitive.rotation = rotation;
                changed = true;
            }
        }
        if self.heading_track.as_mut().is_some_and(Track::is_finished) {
            self.heading_track = None;
        }

        changed
    }

    /// Moves are skipped only while both the rendered and the target
    /// position are off screen.
    fn move_to<S: MapSurface>(&mut self, surface: &mut S, target: Vector2) -> bool {
        let Some(id) = self.primitive else {
            return false;
        };
        let target_latlng = surface.project(target);
        let rendered_latlng = surface.project(self.rendered_position);
        if !surface.is_visible(target_latlng) && !surface.is_visible(rendered_latlng) {
            self.skipped_moves += 1;
            return false;
        }

        let Some(primitive) = surface.primitive_mut(id) else {
            return false;
        };
        primitive.position = target_latlng;
        self.rendered_position = target;
        true
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    pub fn is_self(&self) -> bool {
        self.is_self
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Newest reported position.
    pub fn position(&self) -> Vector2 {
        self.interpolator.latest().unwrap_or(self.rendered_position)
    }

    pub fn rendered_position(&self) -> Vector2 {
        self.rendered_position
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn rendered_heading(&self) -> f64 {
        self.rendered_heading
    }

    pub fn interpolator(&self) -> &CurveInterpolator {
        &self.interpolator
    }

    pub fn is_animating(&self) -> bool {
        self.position_track.is_some() || self.heading_track.is_some()
    }

    pub fn is_moving(&self) -> bool {
        self.position_track.is_some()
    }

    pub fn primitive(&self) -> Option<MarkerId> {
        self.primitive
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn skipped_moves(&self) -> u64 {
        self.skipped_moves
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            account_name: self.account_name.clone(),
            character_name: self.character_name.clone(),
            is_self: self.is_self,
            map_id: self.map_id,
            position: self.position(),
            heading: self.heading,
            classification: self.classification,
            last_message_at: self.last_message_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use gw2map_shared::{CharacterMovement, CharacterState, Mount, Profession, Vector2, Vector3};

    use super::{LiveMarker, MarkerTuning};
    use crate::viewport::{MapSurface, TileViewport};

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn movement(x: f64, y: f64, forward: Vector3) -> CharacterMovement {
        CharacterMovement {
            account_name: "alice.1234".to_string(),
            character_name: "Alice".to_string(),
            map_position: Vector2::new(x, y),
            character_forward: forward,
            map_id: 15,
        }
    }

    fn forward_at(degrees: f64) -> Vector3 {
        let radians = degrees.to_radians();
        Vector3::new(radians.cos(), radians.sin(), 0.0)
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn create_attaches_a_snapped_marker() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let marker = LiveMarker::create(
            &mut viewport,
            &movement(100.0, 200.0, Vector3::X_AXIS),
            false,
            start,
            MarkerTuning::default(),
        );

        assert_eq!(marker.heading(), 0.0);
        assert_eq!(marker.interpolator().len(), 1);
        assert!(marker.interpolator().produce_frames().is_none());
        assert!(!marker.is_animating());

        let id = marker.primitive().expect("primitive attached");
        let primitive = viewport.primitive(id).expect("primitive resolves");
        assert_eq!(primitive.position, viewport.project(Vector2::new(100.0, 200.0)));
        assert_eq!(primitive.tooltip, "Alice (alice.1234)");
        assert_eq!(primitive.icon.url, "/assets/global_player_dot.png");
        assert_eq!(viewport.layer().len(), 1);
    }

    #[test]
    fn warm_up_samples_move_the_marker_directly() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(0.0, 0.0, Vector3::X_AXIS),
            false,
            start,
            MarkerTuning::default(),
        );

        marker.update_position(
            &mut viewport,
            &movement(10.0, 0.0, Vector3::X_AXIS),
            start + ms(100),
        );
        assert_eq!(marker.rendered_position(), Vector2::new(10.0, 0.0));
        assert!(!marker.is_moving());
    }

    #[test]
    fn interpolated_frames_progress_toward_the_newest_sample() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(0.0, 0.0, Vector3::X_AXIS),
            false,
            start,
            MarkerTuning::default(),
        );
        for (i, x) in [10.0, 20.0, 30.0].into_iter().enumerate() {
            let at = start + ms(100 * (i as u64 + 1));
            marker.update_position(&mut viewport, &movement(x, 0.0, Vector3::X_AXIS), at);
        }
        assert!(marker.is_moving());
        assert_eq!(marker.rendered_position(), Vector2::new(20.0, 0.0));

        let mut now = start + ms(300);
        let mut trail = vec![marker.rendered_position().x];
        for _ in 0..100 {
            marker.advance(&mut viewport, now);
            trail.push(marker.rendered_position().x);
            if !marker.is_moving() {
                break;
            }
            now += ms(15);
        }

        assert!(!marker.is_moving());
        assert!(trail.len() > 3, "expected intermediate frames, got {trail:?}");
        assert!(trail.windows(2).all(|pair| pair[1] >= pair[0]), "{trail:?}");
        assert!(trail.iter().any(|x| *x > 20.0 && *x < 30.0));
        assert_close(marker.rendered_position().x, 30.0);
    }

    #[test]
    fn a_new_sample_supersedes_running_frames() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(0.0, 0.0, Vector3::X_AXIS),
            false,
            start,
            MarkerTuning::default(),
        );
        for (i, x) in [10.0, 20.0, 30.0].into_iter().enumerate() {
            let at = start + ms(100 * (i as u64 + 1));
            marker.update_position(&mut viewport, &movement(x, 0.0, Vector3::X_AXIS), at);
        }

        marker.advance(&mut viewport, start + ms(360));
        let before = marker.rendered_position().x;
        assert!(before > 20.0 && before < 30.0);

        marker.update_position(
            &mut viewport,
            &movement(40.0, 0.0, Vector3::X_AXIS),
            start + ms(400),
        );
        assert_eq!(marker.interpolator().len(), 4);

        let mut now = start + ms(400);
        let mut last = before;
        for _ in 0..100 {
            marker.advance(&mut viewport, now);
            let x = marker.rendered_position().x;
            assert!(x >= last - 1e-9, "moved backward from {last} to {x}");
            last = x;
            if !marker.is_moving() {
                break;
            }
            now += ms(15);
        }
        assert_close(last, 40.0);
    }

    #[test]
    fn heading_turns_through_micro_steps() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(0.0, 0.0, Vector3::X_AXIS),
            false,
            start,
            MarkerTuning::default(),
        );

        marker.update_position(&mut viewport, &movement(0.0, 0.0, forward_at(-90.0)), start);
        assert_close(marker.heading(), 90.0);
        assert_eq!(marker.rendered_heading(), 0.0);

        marker.advance(&mut viewport, start + ms(89));
        assert_close(marker.rendered_heading(), 45.0);

        marker.advance(&mut viewport, start + ms(500));
        assert_close(marker.rendered_heading(), 90.0);
        let id = marker.primitive().expect("primitive attached");
        assert_close(viewport.primitive(id).expect("resolves").rotation, 90.0);
        assert!(!marker.is_animating());
    }

    #[test]
    fn heading_wraps_across_the_seam() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(0.0, 0.0, forward_at(-170.0)),
            false,
            start,
            MarkerTuning::default(),
        );
        assert_close(marker.heading(), 170.0);

        marker.update_position(&mut viewport, &movement(0.0, 0.0, forward_at(170.0)), start);
        let mut now = start;
        while marker.is_animating() {
            marker.advance(&mut viewport, now);
            assert!(marker.rendered_heading().abs() >= 170.0 - 1e-6);
            now += ms(15);
        }
        assert_close(marker.rendered_heading(), -170.0);
    }

    #[test]
    fn zero_forward_vector_keeps_the_previous_heading() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(0.0, 0.0, forward_at(-45.0)),
            false,
            start,
            MarkerTuning::default(),
        );
        marker.update_position(
            &mut viewport,
            &movement(1.0, 0.0, Vector3::new(0.0, 0.0, 1.0)),
            start,
        );
        assert_close(marker.heading(), 45.0);
    }

    #[test]
    fn off_screen_moves_are_skipped_but_still_sampled() {
        let mut viewport = TileViewport::default();
        viewport.set_visible_world_rect(Vector2::new(0.0, 0.0), Vector2::new(100.0, 100.0));
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(500.0, 500.0, Vector3::X_AXIS),
            false,
            start,
            MarkerTuning::default(),
        );

        marker.update_position(
            &mut viewport,
            &movement(600.0, 500.0, Vector3::X_AXIS),
            start + ms(100),
        );
        assert_eq!(marker.rendered_position(), Vector2::new(500.0, 500.0));
        assert_eq!(marker.skipped_moves(), 1);
        assert_eq!(marker.interpolator().len(), 2);
        assert_eq!(marker.position(), Vector2::new(600.0, 500.0));

        marker.update_position(
            &mut viewport,
            &movement(50.0, 50.0, Vector3::X_AXIS),
            start + ms(200),
        );
        assert_eq!(marker.rendered_position(), Vector2::new(50.0, 50.0));
        let id = marker.primitive().expect("primitive attached");
        assert_eq!(
            viewport.primitive(id).expect("resolves").position,
            viewport.project(Vector2::new(50.0, 50.0))
        );
    }

    #[test]
    fn classification_rebuilds_the_primitive_in_place() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(100.0, 200.0, forward_at(-30.0)),
            false,
            start,
            MarkerTuning::default(),
        );
        let old = marker.primitive().expect("primitive attached");

        let state = CharacterState {
            account_name: "alice.1234".to_string(),
            character_name: "Alice Alt".to_string(),
            is_commander: true,
            mount: Mount::Warclaw,
            profession: Profession::Guardian,
            specialisation: 27,
        };
        marker.update_classification(&mut viewport, &state, start + ms(50));

        let new = marker.primitive().expect("primitive reattached");
        assert_ne!(old, new);
        assert!(viewport.primitive(old).is_none());
        assert_eq!(viewport.layer().len(), 1);

        let primitive = viewport.primitive(new).expect("resolves");
        assert_eq!(primitive.position, viewport.project(Vector2::new(100.0, 200.0)));
        assert_close(primitive.rotation, 30.0);
        assert_eq!(primitive.overlays.len(), 1);
        assert_eq!(primitive.tooltip, "Alice Alt (alice.1234)");
        assert_eq!(marker.classification().mount, Mount::Warclaw);
        assert_eq!(marker.last_seen(), start + ms(50));
    }

    #[test]
    fn expiry_is_strictly_after_the_timeout() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(0.0, 0.0, Vector3::X_AXIS),
            false,
            start,
            MarkerTuning::default(),
        );

        assert!(!marker.should_expire(start + Duration::from_secs(40)));
        assert!(marker.should_expire(start + Duration::from_secs(40) + ms(1)));

        marker.refresh_last_seen(start + Duration::from_secs(30));
        assert!(!marker.should_expire(start + Duration::from_secs(60)));

        marker.refresh_last_seen(start);
        assert_eq!(marker.last_seen(), start + Duration::from_secs(30));
    }

    #[test]
    fn destroy_detaches_once_and_stops_animating() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let mut marker = LiveMarker::create(
            &mut viewport,
            &movement(0.0, 0.0, Vector3::X_AXIS),
            true,
            start,
            MarkerTuning::default(),
        );
        marker.update_position(&mut viewport, &movement(5.0, 0.0, forward_at(90.0)), start);
        assert!(marker.is_animating());

        assert!(marker.destroy(&mut viewport));
        assert!(!marker.destroy(&mut viewport));
        assert!(!marker.is_animating());
        assert!(viewport.layer().is_empty());

        assert!(!marker.advance(&mut viewport, start + ms(100)));
        marker.update_position(
            &mut viewport,
            &movement(6.0, 0.0, Vector3::X_AXIS),
            start + ms(200),
        );
        assert!(viewport.layer().is_empty());
    }

    #[test]
    fn summary_reports_the_newest_position() {
        let mut viewport = TileViewport::default();
        let start = Instant::now();
        let marker = LiveMarker::create(
            &mut viewport,
            &movement(12.0, 34.0, Vector3::X_AXIS),
            true,
            start,
            MarkerTuning::default(),
        );
        let summary = marker.summary();
        assert_eq!(summary.account_name, "alice.1234");
        assert!(summary.is_self);
        assert_eq!(summary.map_id, 15);
        assert_eq!(summary.position, Vector2::new(12.0, 34.0));
    }
}
