use crate::config::MqttConfig;
use crate::errors::MqttError;
use crate::mqtt::context::PublishContext;
use crate::mqtt::{CatalogStatus, Derived, Sensor};
use crate::wallbox::WallboxStatus;
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use std::thread;
use std::time::Duration;

pub struct MqttPublisher {
    client: Client,
    root_topic: String,
}

macro_rules! publish_if_changed {
    ($context:expr, $src:ident , $old:ident, $field:ident) => {
        if $old.as_ref().map_or(true, |o| o.$field != $src.$field) {
            $context.publish(stringify!($field), &$src.$field)?;
        }
    };
}

impl MqttPublisher {
    pub fn new(config: &MqttConfig) -> Result<Self, MqttError> {
        let client_id = config.client_id.clone();

        let mut mqtt_options = if let Some(socket_path) = &config.socket {
            // Unix domain socket connection
            tracing::info!("Using MQTT Unix socket: {}", socket_path);
            MqttOptions::new(client_id, socket_path, 0)
        } else {
            let host = config
                .host
                .as_ref()
                .ok_or_else(|| MqttError::ClientError("MQTT host or socket must be configured".to_string()))?;

            tracing::info!("Using MQTT TCP connection: {}:{}", host, config.port);
            MqttOptions::new(client_id, host, config.port)
        };

        if !config.username.is_empty() {
            mqtt_options.set_credentials(&config.username, &config.password);
        }

        mqtt_options.set_keep_alive(Duration::from_secs(60));

        // Last will: online=false when the connection drops
        let online_topic = format!("{}/online", config.root);
        mqtt_options.set_last_will(rumqttc::LastWill {
            topic: online_topic,
            message: b"false".to_vec().into(),
            qos: QoS::AtLeastOnce,
            retain: true,
        });

        let (client, mut connection) = Client::new(mqtt_options, 10);

        thread::spawn(move || {
            for notification in connection.iter() {
                match notification {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("MQTT connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // Let it crash; the supervisor restarts us
                        tracing::error!("MQTT connection error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            }
        });

        Ok(Self {
            client,
            root_topic: config.root.clone(),
        })
    }

    fn root(&self) -> PublishContext<'_> {
        PublishContext::new(&self.client, self.root_topic.as_str())
    }

    pub fn context(&self, topic: &str) -> PublishContext<'_> {
        self.root().child(topic)
    }

    pub fn publish_online_status(&self, online: bool) -> Result<(), MqttError> {
        self.root().publish("online", &online)
    }

    /// Availability and freshness of the catalog
    pub fn publish_status(
        &self,
        status: &CatalogStatus,
        old: Option<&CatalogStatus>,
    ) -> Result<(), MqttError> {
        let context = self.context("status");
        publish_if_changed!(context, status, old, available);
        publish_if_changed!(context, status, old, stale);
        publish_if_changed!(context, status, old, records);
        publish_if_changed!(context, status, old, updated_at);

        Ok(())
    }

    /// Publish parsed records, only values and attributes that changed
    pub fn publish_sensors(&self, sensors: &[Sensor], old: &[Sensor]) -> Result<(), MqttError> {
        let parent = self.context("sensor");
        for sensor in sensors {
            let old_sensor = old.iter().find(|s| s.identifier == sensor.identifier);
            let context = parent.child(&sensor.identifier);
            publish_if_changed!(context, sensor, old_sensor, value);
            publish_if_changed!(context, sensor, old_sensor, attributes);
        }
        Ok(())
    }

    pub fn publish_derived(&self, derived: &[Derived], old: &[Derived]) -> Result<(), MqttError> {
        let parent = self.context("derived");
        for sensor in derived {
            let old_sensor = old.iter().find(|s| s.identifier == sensor.identifier);
            let context = parent.child(&sensor.identifier);
            publish_if_changed!(context, sensor, old_sensor, value);
            publish_if_changed!(context, sensor, old_sensor, attributes);
        }
        Ok(())
    }

    pub fn publish_wallbox(
        &self,
        wallbox: &WallboxStatus,
        old: Option<&WallboxStatus>,
    ) -> Result<(), MqttError> {
        let context = self.context("wallbox");
        publish_if_changed!(context, wallbox, old, mode);
        publish_if_changed!(context, wallbox, old, status);

        Ok(())
    }
}
