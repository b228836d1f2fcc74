pub mod channel;
pub mod classification;
pub mod live;
pub mod messages;
pub mod vector;

pub use channel::{Channel, ChannelSettings, MapContext};
pub use classification::{Classification, Mount, Profession};
pub use live::*;
pub use messages::*;
pub use vector::{Vector2, Vector3};
