pub mod reconciler;
pub mod transport;
