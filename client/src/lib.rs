//! Live player markers for the map viewer.
//!
//! Inbound relay messages are routed by [`registry::LiveRegistry`] to one
//! [`marker::LiveMarker`] per account. Each marker eases its canvas
//! primitive toward new positions and headings, and the registry expires
//! markers that stop reporting. Everything is driven by explicit
//! [`std::time::Instant`]s; the host decides when to tick.

pub mod animation;
pub mod geometry;
pub mod icons;
pub mod interpolator;
pub mod layer;
pub mod marker;
pub mod registry;
pub mod viewport;

pub use layer::{CanvasMarker, MarkerId, MarkerLayer};
pub use marker::{LiveMarker, MarkerTuning};
pub use registry::{LiveRegistry, RenderedMarker};
pub use viewport::{LatLng, LatLngBounds, MapSurface, TileViewport};
