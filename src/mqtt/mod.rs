pub mod context;
pub mod publisher;
pub mod types;

pub use publisher::MqttPublisher;
pub use types::{CatalogStatus, Derived, Sensor};
