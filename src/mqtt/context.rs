//! Topic scoping and payload encoding for retained publishes

use chrono::{DateTime, SecondsFormat, Utc};
use rumqttc::{Client, QoS};

use crate::errors::MqttError;

/// Text form of a value as it goes on the wire
pub trait MqttPayload {
    fn to_payload(&self) -> String;
}

macro_rules! display_payload {
    ($($ty:ty),*) => {
        $(impl MqttPayload for $ty {
            fn to_payload(&self) -> String {
                self.to_string()
            }
        })*
    };
}

display_payload!(String, bool, f64, u64);

/// Whole seconds: the device page has no sub-second resolution.
impl MqttPayload for DateTime<Utc> {
    fn to_payload(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// `None` clears the retained value with an empty payload.
impl<T: MqttPayload> MqttPayload for Option<T> {
    fn to_payload(&self) -> String {
        self.as_ref().map(MqttPayload::to_payload).unwrap_or_default()
    }
}

/// A topic prefix bound to a client; everything published through it is
/// retained with QoS 1.
pub struct PublishContext<'a> {
    client: &'a Client,
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
}

impl<'a> PublishContext<'a> {
    pub fn new(client: &'a Client, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
            qos: QoS::AtLeastOnce,
            retain: true,
        }
    }

    /// Context for a sub-topic, e.g. `sensor` → `sensor/{identifier}`.
    pub fn child(&self, topic: &str) -> PublishContext<'a> {
        PublishContext {
            client: self.client,
            topic: self.full_topic(topic),
            qos: self.qos,
            retain: self.retain,
        }
    }

    pub fn full_topic(&self, topic: &str) -> String {
        if self.topic.is_empty() {
            topic.to_string()
        } else {
            format!("{}/{}", self.topic, topic)
        }
    }

    pub fn publish<T: MqttPayload>(&self, topic: &str, payload: &T) -> Result<(), MqttError> {
        let full_topic = self.full_topic(topic);
        self.client
            .publish(&full_topic, self.qos, self.retain, payload.to_payload())
            .map_err(|e| MqttError::PublishFailed {
                topic: full_topic,
                reason: e.to_string(),
            })
    }
}
