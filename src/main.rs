use std::cmp::{max, min};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use clap::Parser;
use enpal_mqtt_rs::config::Config;
use enpal_mqtt_rs::mqtt::{self, MqttPublisher};
use enpal_mqtt_rs::state::StateStore;
use enpal_mqtt_rs::wallbox::{WallboxClient, WallboxStatus};
use enpal_mqtt_rs::{Bridge, EnpalClient, Poller};
use tracing::{debug, error, info, warn};

/// Enpal MQTT Bridge - Publishes Enpal device page data to MQTT
#[derive(Parser)]
#[command(name = "enpal-mqtt-rs")]
#[command(version)]
#[command(about = "Enpal MQTT Bridge - Publishes Enpal device page data to MQTT", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

/// Next interval boundary after `time`
/// Example: 12:00:37 with a 60s interval -> 12:01:00
fn next_interval(time: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let duration_since_last_interval = Duration::seconds(time.timestamp() % interval.num_seconds());
    time - duration_since_last_interval + interval
}

/// Sleep until `deadline`, waking early when shutdown is requested.
fn sleep_until(deadline: DateTime<Utc>, running: &AtomicBool) {
    let step = Duration::milliseconds(250);
    while running.load(Ordering::SeqCst) {
        let remaining = deadline - Utc::now();
        if remaining <= Duration::zero() {
            break;
        }
        if let Ok(duration) = min(remaining, step).to_std() {
            std::thread::sleep(duration);
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration first (to get log level)
    let config_path = cli.config;
    let config = Config::from_file(&config_path)?;

    // Initialize tracing with log level from config
    let app_log_level = config.default.log_level.as_str();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("enpal_mqtt_rs={}", app_log_level).parse()?),
        )
        .init();

    let interval = Duration::from_std(config.enpal.interval)?;
    let wallbox_interval = Duration::from_std(config.wallbox.interval)?;

    info!("Configuration loaded from: {}", config_path);
    info!("Log level: {}", config.default.log_level);
    debug!("Debug logging is enabled");

    info!("Configuration loaded successfully!");
    info!("  Enpal URL: {}", config.enpal.url);
    info!("  MQTT Root: {}", config.mqtt.root);
    info!("  Interval: {:?}", interval);
    info!("  State file: {}", config.state.path.display());
    if config.wallbox.enabled {
        info!("  Wallbox: {} every {:?}", config.wallbox.url, wallbox_interval);
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("Shutdown requested");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let enpal_client = EnpalClient::new(
        config.enpal.url.clone(),
        &config.enpal.groups,
        config.enpal.timeout,
    )?;
    let mut bridge = Bridge::new(
        enpal_client,
        &config.enpal.dc_power_candidates,
        config.enpal.interval,
        StateStore::new(&config.state.path),
    );

    let mut wallbox = if config.wallbox.enabled {
        Some(Poller::new(WallboxClient::new(
            &config.wallbox.url,
            config.wallbox.timeout,
        )?))
    } else {
        None
    };

    // Create MQTT publisher (blocking)
    info!("Creating MQTT publisher...");
    let mqtt_publisher = MqttPublisher::new(&config.mqtt)?;
    info!("✓ MQTT publisher created successfully!");

    // Give MQTT a moment to connect
    std::thread::sleep(Duration::milliseconds(500).to_std()?);

    mqtt_publisher.publish_online_status(true)?;
    info!("✓ Published online status");

    let mut next_loop = Utc::now();
    let mut next_wallbox_loop = Utc::now();

    let mut last_status: Option<mqtt::CatalogStatus> = None;
    let mut last_sensors: Vec<mqtt::Sensor> = Vec::new();
    let mut last_derived: Vec<mqtt::Derived> = Vec::new();
    let mut last_wallbox: Option<WallboxStatus> = None;
    info!("Starting main loop...");

    while running.load(Ordering::SeqCst) {
        let now = Utc::now();
        if now >= next_loop {
            if let Err(e) = bridge.tick(Local::now()) {
                error!("Update failed: {}", e);
            }
            // Computed after the tick so an overrun skips to the next boundary
            next_loop = next_interval(Utc::now(), interval);

            let catalog = bridge.catalog();
            let status = mqtt::CatalogStatus::from_catalog(catalog);
            if let Err(e) = mqtt_publisher.publish_status(&status, last_status.as_ref()) {
                error!("Failed to publish status: {:?}", e);
                // Let it crash on MQTT errors
                return Err(e.into());
            }
            last_status = Some(status);

            if catalog.is_available() {
                let sensors = mqtt::types::sensors_from_catalog(catalog)?;
                mqtt_publisher.publish_sensors(&sensors, &last_sensors)?;
                last_sensors = sensors;

                let derived = mqtt::types::derived_from_catalog(catalog)?;
                mqtt_publisher.publish_derived(&derived, &last_derived)?;
                last_derived = derived;

                info!(
                    "Published {} sensors: Total={:.3}kWh Today={:.3}kWh",
                    last_sensors.len(),
                    catalog.cumulative_energy_kwh().unwrap_or_default(),
                    catalog.daily_energy_kwh().unwrap_or_default()
                );
            }
        }

        if let Some(poller) = wallbox.as_mut() {
            if now >= next_wallbox_loop {
                match poller.tick() {
                    Ok(polled) => {
                        mqtt_publisher.publish_wallbox(polled.data, last_wallbox.as_ref())?;
                        debug!(
                            "Wallbox: mode={} status={} ({:?})",
                            polled.data.mode, polled.data.status, polled.freshness
                        );
                        last_wallbox = Some(polled.data.clone());
                    }
                    Err(e) => warn!("Wallbox update failed: {}", e),
                }
                next_wallbox_loop = next_interval(Utc::now(), wallbox_interval);
            }
        }

        let wake_up = if wallbox.is_some() {
            min(next_loop, next_wallbox_loop)
        } else {
            next_loop
        };
        sleep_until(max(wake_up, Utc::now() + Duration::milliseconds(100)), &running);
    }

    info!("Shutting down...");
    match bridge.persist() {
        Ok(()) => info!("✓ State saved to {}", config.state.path.display()),
        Err(e) => error!("Failed to save state: {}", e),
    }
    mqtt_publisher.publish_online_status(false)?;
    // Give the event loop a moment to flush
    std::thread::sleep(Duration::milliseconds(500).to_std()?);

    Ok(())
}
