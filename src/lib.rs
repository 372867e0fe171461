//! Enpal to MQTT Bridge
//!
//! Polls the local status page of an Enpal installation, turns its cards into
//! typed sensor records, derives DC energy counters and publishes everything
//! to MQTT.

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod derived;
pub mod enpal;
pub mod errors;
pub mod mqtt;
pub mod poller;
pub mod state;
pub mod wallbox;

pub use bridge::Bridge;
pub use catalog::SensorCatalog;
pub use config::Config;
pub use enpal::client::EnpalClient;
pub use mqtt::publisher::MqttPublisher;
pub use poller::Poller;
