use serde::Serialize;

use crate::viewport::LatLng;

/// Generational handle to a primitive in a [`MarkerLayer`]. A handle to a
/// removed primitive never resolves to a later occupant of the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MarkerId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerIcon {
    pub url: &'static str,
    pub size: [u32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayAnchor {
    Top,
    Bottom,
}

/// Decorative icon drawn relative to the marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IconOverlay {
    pub url: &'static str,
    pub anchor: OverlayAnchor,
    pub size: [u32; 2],
    pub offset: [i32; 2],
}

/// One rotatable canvas marker. Its overlay set is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanvasMarker {
    pub position: LatLng,
    pub rotation: f64,
    pub icon: MarkerIcon,
    pub overlays: Vec<IconOverlay>,
    pub tooltip: String,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    marker: Option<CanvasMarker>,
}

/// The drawing collection shared by every live marker.
#[derive(Debug, Default)]
pub struct MarkerLayer {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl MarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, marker: CanvasMarker) -> MarkerId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.marker = Some(marker);
            return MarkerId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            marker: Some(marker),
        });
        MarkerId {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, id: MarkerId) -> Option<CanvasMarker> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let marker = slot.marker.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(marker)
    }

    pub fn get(&self, id: MarkerId) -> Option<&CanvasMarker> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.marker.as_ref())
    }

    pub fn get_mut(&mut self, id: MarkerId) -> Option<&mut CanvasMarker> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.marker.as_mut())
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{CanvasMarker, MarkerIcon, MarkerLayer};
    use crate::viewport::LatLng;

    fn marker(tooltip: &str) -> CanvasMarker {
        CanvasMarker {
            position: LatLng::new(0.0, 0.0),
            rotation: 0.0,
            icon: MarkerIcon {
                url: "/assets/global_player_dot.png",
                size: [32, 32],
            },
            overlays: Vec::new(),
            tooltip: tooltip.to_string(),
        }
    }

    #[test]
    fn stale_handles_do_not_reach_reused_slots() {
        let mut layer = MarkerLayer::new();
        let first = layer.insert(marker("a"));
        assert!(layer.remove(first).is_some());

        let second = layer.insert(marker("b"));
        assert_ne!(first, second);
        assert!(layer.get(first).is_none());
        assert!(layer.remove(first).is_none());
        assert_eq!(layer.get(second).map(|m| m.tooltip.as_str()), Some("b"));
        assert_eq!(layer.len(), 1);
    }

    #[test]
    fn double_remove_is_harmless() {
        let mut layer = MarkerLayer::new();
        let id = layer.insert(marker("a"));
        assert!(layer.remove(id).is_some());
        assert!(layer.remove(id).is_none());
        assert!(layer.is_empty());
    }
}
