use gw2map_shared::{MapContext, Vector2};
use serde::{Deserialize, Serialize};

use crate::layer::{CanvasMarker, MarkerId, MarkerLayer};

/// Geographic-style coordinate of the tiled map widget.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned box in [`LatLng`] space. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    /// Bounds containing every finite coordinate.
    pub const EVERYTHING: LatLngBounds = LatLngBounds {
        south_west: LatLng::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        north_east: LatLng::new(f64::INFINITY, f64::INFINITY),
    };

    /// Build bounds from two arbitrary corners.
    pub fn from_corners(a: LatLng, b: LatLng) -> Self {
        Self {
            south_west: LatLng::new(a.lat.min(b.lat), a.lng.min(b.lng)),
            north_east: LatLng::new(a.lat.max(b.lat), a.lng.max(b.lng)),
        }
    }

    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }
}

/// Translation layer between map coordinates and the hosting map widget.
///
/// `project` turns a map (continent) position into the widget's [`LatLng`],
/// `unproject` reverses it. The surface also owns the shared render layer:
/// primitives are attached, looked up and detached through it.
pub trait MapSurface {
    fn project(&self, world: Vector2) -> LatLng;

    fn unproject(&self, position: LatLng) -> Vector2;

    /// Currently visible region.
    fn current_bounds(&self) -> LatLngBounds;

    fn attach(&mut self, marker: CanvasMarker) -> MarkerId;

    fn detach(&mut self, id: MarkerId) -> Option<CanvasMarker>;

    fn primitive(&self, id: MarkerId) -> Option<&CanvasMarker>;

    fn primitive_mut(&mut self, id: MarkerId) -> Option<&mut CanvasMarker>;

    /// The widget switched to another map.
    fn set_context(&mut self, _context: MapContext) {}

    fn is_visible(&self, position: LatLng) -> bool {
        self.current_bounds().contains(position)
    }
}

/// Headless stand-in for the tiled map widget.
///
/// Uses the simple CRS the map tiles are cut with: at the map's maximum
/// zoom one map unit is one pixel, and latitude grows upward.
#[derive(Debug)]
pub struct TileViewport {
    max_zoom: u8,
    bounds: LatLngBounds,
    layer: MarkerLayer,
}

impl Default for TileViewport {
    fn default() -> Self {
        Self::for_context(MapContext::default())
    }
}

impl TileViewport {
    pub fn for_context(context: MapContext) -> Self {
        Self {
            max_zoom: context.max_zoom(),
            bounds: LatLngBounds::EVERYTHING,
            layer: MarkerLayer::new(),
        }
    }

    fn scale(&self) -> f64 {
        f64::from(1u32 << self.max_zoom.min(31))
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn set_bounds(&mut self, bounds: LatLngBounds) {
        self.bounds = bounds;
    }

    /// Set the visible region from a map-coordinate rectangle.
    pub fn set_visible_world_rect(&mut self, min: Vector2, max: Vector2) {
        self.bounds = LatLngBounds::from_corners(self.project(min), self.project(max));
    }

    /// Treat the whole map as visible.
    pub fn clear_bounds(&mut self) {
        self.bounds = LatLngBounds::EVERYTHING;
    }

    pub fn layer(&self) -> &MarkerLayer {
        &self.layer
    }
}

impl MapSurface for TileViewport {
    fn project(&self, world: Vector2) -> LatLng {
        let scale = self.scale();
        LatLng::new(-world.y / scale, world.x / scale)
    }

    fn unproject(&self, position: LatLng) -> Vector2 {
        let scale = self.scale();
        Vector2::new(position.lng * scale, -position.lat * scale)
    }

    fn current_bounds(&self) -> LatLngBounds {
        self.bounds
    }

    fn attach(&mut self, marker: CanvasMarker) -> MarkerId {
        self.layer.insert(marker)
    }

    fn detach(&mut self, id: MarkerId) -> Option<CanvasMarker> {
        self.layer.remove(id)
    }

    fn primitive(&self, id: MarkerId) -> Option<&CanvasMarker> {
        self.layer.get(id)
    }

    fn primitive_mut(&mut self, id: MarkerId) -> Option<&mut CanvasMarker> {
        self.layer.get_mut(id)
    }

    fn set_context(&mut self, context: MapContext) {
        self.max_zoom = context.max_zoom();
        self.bounds = LatLngBounds::EVERYTHING;
    }
}

#[cfg(test)]
mod tests {
    use gw2map_shared::{MapContext, Vector2};

    use super::{LatLng, MapSurface, TileViewport};

    #[test]
    fn project_and_unproject_are_inverse() {
        let viewport = TileViewport::for_context(MapContext::Tyria);
        let world = Vector2::new(40_960.0, 30_720.0);
        let latlng = viewport.project(world);
        assert_eq!(latlng, LatLng::new(-240.0, 320.0));
        assert_eq!(viewport.unproject(latlng), world);
    }

    #[test]
    fn mists_uses_its_own_zoom() {
        let viewport = TileViewport::for_context(MapContext::Mists);
        assert_eq!(viewport.project(Vector2::new(64.0, 0.0)).lng, 1.0);
    }

    #[test]
    fn visible_rect_limits_visibility() {
        let mut viewport = TileViewport::default();
        assert!(viewport.is_visible(viewport.project(Vector2::new(1e9, -1e9))));

        viewport.set_visible_world_rect(Vector2::new(0.0, 0.0), Vector2::new(1000.0, 500.0));
        assert!(viewport.is_visible(viewport.project(Vector2::new(500.0, 250.0))));
        assert!(viewport.is_visible(viewport.project(Vector2::new(1000.0, 500.0))));
        assert!(!viewport.is_visible(viewport.project(Vector2::new(1500.0, 250.0))));
        assert!(!viewport.is_visible(viewport.project(Vector2::new(500.0, -10.0))));

        viewport.clear_bounds();
        assert!(viewport.is_visible(viewport.project(Vector2::new(1500.0, 250.0))));
    }

    #[test]
    fn switching_context_resets_bounds() {
        let mut viewport = TileViewport::for_context(MapContext::Tyria);
        viewport.set_visible_world_rect(Vector2::new(0.0, 0.0), Vector2::new(1.0, 1.0));
        viewport.set_context(MapContext::Mists);
        assert_eq!(viewport.max_zoom(), 6);
        assert!(viewport.is_visible(LatLng::new(-5_000.0, 5_000.0)));
    }
}
