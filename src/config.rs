//! Runtime configuration read from environment variables, with defaults for local development.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bon::Builder;

use crate::sensor::SensorOptions;
use crate::vehicle::{LineFilter, VehicleId};

pub const DEFAULT_RELAY_URL: &str = "https://localhost:4443";

/// An environment variable was set to something unusable.
#[derive(Debug, thiserror::Error)]
#[error("invalid {key}={value:?}: {reason}")]
pub struct InvalidSetting {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

fn env_or(key: &'static str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        tracing::trace!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn env_parse<T>(key: &'static str, default: T) -> Result<T, InvalidSetting>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| InvalidSetting {
            key,
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &'static str, default_ms: u64) -> Result<Duration, InvalidSetting> {
    env_parse(key, default_ms).map(Duration::from_millis)
}

fn env_flag(key: &'static str, default: bool) -> bool {
    std::env::var(key).map_or(default, |value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Where the driver's positions come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoSourceKind {
    /// Follow the demo route for the driver's line.
    Simulated,
    /// Replay a recorded `lat,lng[,heading]` trace.
    Replay(PathBuf),
}

impl FromStr for GeoSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("simulated") => Ok(Self::Simulated),
            Some((kind, path)) if kind.eq_ignore_ascii_case("replay") && !path.is_empty() => {
                Ok(Self::Replay(PathBuf::from(path)))
            }
            _ => Err("expected `simulated` or `replay:<path>`".to_string()),
        }
    }
}

#[derive(Debug, Clone, Builder)]
pub struct DriverConfig {
    #[builder(default = DEFAULT_RELAY_URL.to_string())]
    pub relay_url: String,

    #[builder(into, default = VehicleId::from("BUS_CH_001"))]
    pub vehicle_id: VehicleId,

    #[builder(into, default = "L01".to_string())]
    pub line_id: String,

    #[builder(into)]
    pub label: Option<String>,

    #[builder(default = GeoSourceKind::Simulated)]
    pub geo_source: GeoSourceKind,

    /// Interval between sensor samples.
    #[builder(default = Duration::from_secs(1))]
    pub sample_period: Duration,

    #[builder(default)]
    pub sensor: SensorOptions,

    /// Begin tracking without waiting for a `start` command.
    #[builder(default = false)]
    pub auto_start: bool,

    /// Also render the driver's own position locally.
    #[builder(default = true)]
    pub local_echo: bool,
}

impl DriverConfig {
    pub fn from_env() -> Result<Self, InvalidSetting> {
        let sensor = SensorOptions::builder()
            .high_accuracy(env_flag("HIGH_ACCURACY", true))
            .max_cache_age(env_millis("MAX_CACHE_AGE_MS", 0)?)
            .timeout(env_millis("SENSOR_TIMEOUT_MS", 5_000)?)
            .build();

        Ok(Self::builder()
            .relay_url(env_or("RELAY_URL", DEFAULT_RELAY_URL))
            .vehicle_id(env_or("VEHICLE_ID", "BUS_CH_001"))
            .line_id(env_or("LINE_ID", "L01"))
            .maybe_label(std::env::var("VEHICLE_LABEL").ok())
            .geo_source(env_parse("GEO_SOURCE", GeoSourceKind::Simulated)?)
            .sample_period(env_millis("SAMPLE_MS", 1_000)?)
            .sensor(sensor)
            .auto_start(env_flag("AUTO_START", false))
            .local_echo(env_flag("LOCAL_ECHO", true))
            .build())
    }
}

#[derive(Debug, Clone, Builder)]
pub struct HubConfig {
    #[builder(default = DEFAULT_RELAY_URL.to_string())]
    pub relay_url: String,

    /// How often the full fleet is republished for late joiners.
    #[builder(default = Duration::from_secs(5))]
    pub snapshot_interval: Duration,
}

impl HubConfig {
    pub fn from_env() -> Result<Self, InvalidSetting> {
        Ok(Self::builder()
            .relay_url(env_or("RELAY_URL", DEFAULT_RELAY_URL))
            .snapshot_interval(env_millis("SNAPSHOT_INTERVAL_MS", 5_000)?)
            .build())
    }
}

#[derive(Debug, Clone, Builder)]
pub struct OperatorConfig {
    #[builder(default = DEFAULT_RELAY_URL.to_string())]
    pub relay_url: String,

    #[builder(default)]
    pub line_filter: LineFilter,

    /// Delay before reconnecting after the hub feed drops.
    #[builder(default = Duration::from_secs(2))]
    pub retry_delay: Duration,
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self, InvalidSetting> {
        Ok(Self::builder()
            .relay_url(env_or("RELAY_URL", DEFAULT_RELAY_URL))
            .line_filter(env_parse("LINE_FILTER", LineFilter::All)?)
            .retry_delay(env_millis("RETRY_MS", 2_000)?)
            .build())
    }
}

#[derive(Debug, Clone, Builder)]
pub struct SimulatorConfig {
    #[builder(default = Duration::from_millis(200))]
    pub tick: Duration,

    #[builder(default)]
    pub line_filter: LineFilter,
}

impl SimulatorConfig {
    pub fn from_env() -> Result<Self, InvalidSetting> {
        let tick = env_millis("TICK_MS", 200)?;
        if tick.is_zero() {
            return Err(InvalidSetting {
                key: "TICK_MS",
                value: "0".to_string(),
                reason: "tick must be positive".to_string(),
            });
        }

        Ok(Self::builder()
            .tick(tick)
            .line_filter(env_parse("LINE_FILTER", LineFilter::All)?)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_source_parsing() {
        assert_eq!(
            "simulated".parse::<GeoSourceKind>(),
            Ok(GeoSourceKind::Simulated)
        );
        assert_eq!(
            "replay:/tmp/l01.csv".parse::<GeoSourceKind>(),
            Ok(GeoSourceKind::Replay(PathBuf::from("/tmp/l01.csv")))
        );
        assert!("replay:".parse::<GeoSourceKind>().is_err());
        assert!("gps".parse::<GeoSourceKind>().is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let driver = DriverConfig::builder().build();
        assert_eq!(driver.relay_url, DEFAULT_RELAY_URL);
        assert_eq!(driver.vehicle_id.as_str(), "BUS_CH_001");
        assert_eq!(driver.line_id, "L01");
        assert_eq!(driver.geo_source, GeoSourceKind::Simulated);
        assert!(driver.sensor.high_accuracy);
        assert_eq!(driver.sensor.max_cache_age, Duration::ZERO);
        assert_eq!(driver.sensor.timeout, Duration::from_secs(5));
        assert!(!driver.auto_start);

        let simulator = SimulatorConfig::builder().build();
        assert_eq!(simulator.tick, Duration::from_millis(200));
        assert_eq!(simulator.line_filter, LineFilter::All);
    }

    #[test]
    fn test_invalid_setting_message() {
        let err = InvalidSetting {
            key: "TICK_MS",
            value: "fast".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid TICK_MS=\"fast\": invalid digit found in string"
        );
    }
}
