//! Home-Assistant MQTT discovery and state messages.

use serde_json::{json, Value};

use crate::topics::{Topics, AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE};
use crate::types::FanStatePayload;

pub const DEVICE_MODEL: &str = "M5Stack Atom";
pub const DEVICE_MANUFACTURER: &str = "SmartHome-Assistant.info";

/// Sent on the temperature topic while the sensor has no usable reading;
/// Home Assistant shows the entity as unknown instead of the last value.
pub const UNKNOWN_STATE: &str = "None";

/// Device health published on the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDiagnostics {
    pub uptime_s: u64,
    pub wifi_rssi_dbm: Option<i8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

impl OutboundMessage {
    fn retained(topic: String, payload: String) -> Self {
        Self {
            topic,
            payload,
            retain: true,
        }
    }
}

fn device_block(topics: &Topics, device_name: &str) -> Value {
    json!({
        "identifiers": [topics.device_id()],
        "name": device_name,
        "model": DEVICE_MODEL,
        "manufacturer": DEVICE_MANUFACTURER,
        "sw_version": env!("CARGO_PKG_VERSION"),
    })
}

fn entity(topics: &Topics, device_name: &str, object_id: &str, label: &str, extra: Value) -> Value {
    let mut config = json!({
        "unique_id": format!("{}_{}", topics.device_id(), object_id),
        "name": format!("{} {}", device_name, label),
        "availability_topic": topics.status(),
        "payload_available": AVAILABILITY_ONLINE,
        "payload_not_available": AVAILABILITY_OFFLINE,
        "device": device_block(topics, device_name),
    });
    if let (Some(config), Value::Object(extra)) = (config.as_object_mut(), extra) {
        config.extend(extra);
    }
    config
}

/// Retained discovery configs for every entity the controller exposes.
pub fn discovery_messages(topics: &Topics, device_name: &str) -> Vec<OutboundMessage> {
    let entities = [
        (
            "sensor",
            "temperature",
            "Temperature",
            json!({
                "state_topic": topics.temperature(),
                "unit_of_measurement": "°C",
                "device_class": "temperature",
                "state_class": "measurement",
            }),
        ),
        (
            "sensor",
            "fan_speed",
            "Fan Speed",
            json!({
                "state_topic": topics.fan_speed(),
                "unit_of_measurement": "%",
                "icon": "mdi:fan",
                "state_class": "measurement",
            }),
        ),
        (
            "sensor",
            "wifi_signal",
            "WiFi",
            json!({
                "state_topic": topics.wifi_signal(),
                "unit_of_measurement": "dBm",
                "device_class": "signal_strength",
                "state_class": "measurement",
                "entity_category": "diagnostic",
            }),
        ),
        (
            "sensor",
            "uptime",
            "Uptime",
            json!({
                "state_topic": topics.uptime(),
                "unit_of_measurement": "s",
                "device_class": "duration",
                "state_class": "total_increasing",
                "entity_category": "diagnostic",
            }),
        ),
        (
            "select",
            "mode",
            "Mode",
            json!({
                "state_topic": topics.mode_state(),
                "command_topic": topics.mode_set(),
                "options": ["AUTO", "MANUAL"],
                "icon": "mdi:fan-auto",
            }),
        ),
        (
            "switch",
            "auto_pwm",
            "Auto PWM",
            json!({
                "state_topic": topics.auto_state(),
                "command_topic": topics.auto_set(),
                "payload_on": "ON",
                "payload_off": "OFF",
                "icon": "mdi:thermometer-auto",
            }),
        ),
        (
            "button",
            "restart",
            "Restart",
            json!({
                "command_topic": topics.restart(),
                "device_class": "restart",
                "entity_category": "config",
            }),
        ),
    ];

    entities
        .into_iter()
        .map(|(component, object_id, label, extra)| {
            let config = entity(topics, device_name, object_id, label, extra);
            OutboundMessage::retained(topics.discovery(component, object_id), config.to_string())
        })
        .collect()
}

/// Per-entity state topics plus the JSON snapshot.
pub fn state_messages(topics: &Topics, state: &FanStatePayload) -> Vec<OutboundMessage> {
    let mut messages = Vec::with_capacity(5);

    messages.push(OutboundMessage::retained(
        topics.temperature(),
        state
            .temp
            .map_or_else(|| UNKNOWN_STATE.to_string(), |temp| format!("{:.1}", temp)),
    ));
    messages.push(OutboundMessage::retained(
        topics.fan_speed(),
        format!("{:.1}", state.fan_speed),
    ));
    messages.push(OutboundMessage::retained(
        topics.mode_state(),
        state.mode.to_string(),
    ));
    messages.push(OutboundMessage::retained(
        topics.auto_state(),
        if state.auto_enabled { "ON" } else { "OFF" }.to_string(),
    ));
    messages.push(OutboundMessage::retained(
        topics.state(),
        serde_json::to_string(state).unwrap_or_else(|_| "{}".to_string()),
    ));

    messages
}

/// Uptime and, when connected to an access point, signal strength. Not
/// retained: a stale uptime is worse than none.
pub fn diagnostic_messages(topics: &Topics, diagnostics: &DeviceDiagnostics) -> Vec<OutboundMessage> {
    let mut messages = vec![OutboundMessage {
        topic: topics.uptime(),
        payload: diagnostics.uptime_s.to_string(),
        retain: false,
    }];
    if let Some(rssi) = diagnostics.wifi_rssi_dbm {
        messages.push(OutboundMessage {
            topic: topics.wifi_signal(),
            payload: rssi.to_string(),
            retain: false,
        });
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn topics() -> Topics {
        Topics::new("homeassistant/esp32", "1D_E2_0F")
    }

    #[test]
    fn discovery_covers_every_entity() {
        let messages = discovery_messages(&topics(), "Dryer Fan");
        let names: Vec<_> = messages.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "homeassistant/sensor/1D_E2_0F/temperature/config",
                "homeassistant/sensor/1D_E2_0F/fan_speed/config",
                "homeassistant/sensor/1D_E2_0F/wifi_signal/config",
                "homeassistant/sensor/1D_E2_0F/uptime/config",
                "homeassistant/select/1D_E2_0F/mode/config",
                "homeassistant/switch/1D_E2_0F/auto_pwm/config",
                "homeassistant/button/1D_E2_0F/restart/config",
            ]
        );
        assert!(messages.iter().all(|m| m.retain));
    }

    #[test]
    fn discovery_payload_shape() {
        let messages = discovery_messages(&topics(), "Dryer Fan");
        let select: Value = serde_json::from_str(&messages[4].payload).expect("json");

        assert_eq!(select["unique_id"], "1D_E2_0F_mode");
        assert_eq!(select["name"], "Dryer Fan Mode");
        assert_eq!(select["command_topic"], "homeassistant/esp32/1D_E2_0F/mode/set");
        assert_eq!(select["options"], json!(["AUTO", "MANUAL"]));
        assert_eq!(select["availability_topic"], "homeassistant/esp32/1D_E2_0F/status");
        assert_eq!(select["device"]["identifiers"], json!(["1D_E2_0F"]));
        assert_eq!(select["device"]["model"], DEVICE_MODEL);
    }

    #[test]
    fn diagnostic_sensors_are_announced() {
        let messages = discovery_messages(&topics(), "Dryer Fan");
        let wifi: Value = serde_json::from_str(&messages[2].payload).expect("json");
        let uptime: Value = serde_json::from_str(&messages[3].payload).expect("json");

        assert_eq!(wifi["state_topic"], "homeassistant/esp32/1D_E2_0F/sensor/wifi_signal");
        assert_eq!(wifi["unit_of_measurement"], "dBm");
        assert_eq!(wifi["entity_category"], "diagnostic");
        assert_eq!(uptime["state_topic"], "homeassistant/esp32/1D_E2_0F/sensor/uptime");
        assert_eq!(uptime["device_class"], "duration");
        assert_eq!(uptime["entity_category"], "diagnostic");
    }

    #[test]
    fn diagnostics_skip_missing_rssi() {
        let online = diagnostic_messages(
            &topics(),
            &DeviceDiagnostics {
                uptime_s: 3_725,
                wifi_rssi_dbm: Some(-61),
            },
        );
        let payloads: Vec<_> = online
            .iter()
            .map(|m| (m.topic.as_str(), m.payload.as_str(), m.retain))
            .collect();
        assert_eq!(
            payloads,
            vec![
                ("homeassistant/esp32/1D_E2_0F/sensor/uptime", "3725", false),
                ("homeassistant/esp32/1D_E2_0F/sensor/wifi_signal", "-61", false),
            ]
        );

        let wired = diagnostic_messages(
            &topics(),
            &DeviceDiagnostics {
                uptime_s: 5,
                wifi_rssi_dbm: None,
            },
        );
        assert_eq!(wired.len(), 1);
    }

    #[test]
    fn state_messages_format_values() {
        let state = FanStatePayload {
            temp: Some(55.04),
            fan_speed: 50.2,
            duty: 128,
            mode: "AUTO",
            auto_enabled: true,
            sensor_ready: true,
        };
        let messages = state_messages(&topics(), &state);
        let pairs: Vec<_> = messages
            .iter()
            .take(4)
            .map(|m| (m.topic.rsplit_once("1D_E2_0F/").map(|(_, t)| t).unwrap_or(""), m.payload.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("sensor/temperature", "55.0"),
                ("sensor/fan_speed", "50.2"),
                ("mode/state", "AUTO"),
                ("auto/state", "ON"),
            ]
        );

        let snapshot: Value = serde_json::from_str(&messages[4].payload).expect("json");
        assert_eq!(snapshot["duty"], 128);
        assert_eq!(snapshot["mode"], "AUTO");
    }

    #[test]
    fn state_without_reading_clears_temperature() {
        let state = FanStatePayload {
            temp: None,
            fan_speed: 0.0,
            duty: 0,
            mode: "MANUAL",
            auto_enabled: false,
            sensor_ready: false,
        };
        let messages = state_messages(&topics(), &state);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].topic, "homeassistant/esp32/1D_E2_0F/sensor/temperature");
        assert_eq!(messages[0].payload, UNKNOWN_STATE);
        assert!(messages[0].retain);
        assert_eq!(messages[3].payload, "OFF");
    }
}
