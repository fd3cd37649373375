use crate::command::CommandKind;

pub const DISCOVERY_PREFIX: &str = "homeassistant";
pub const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

pub const AVAILABILITY_ONLINE: &str = "online";
pub const AVAILABILITY_OFFLINE: &str = "offline";

/// Device id derived from the last three MAC bytes, e.g. `DD_EE_FF`.
pub fn device_id_from_mac(mac: [u8; 6]) -> String {
    format!("{:02X}_{:02X}_{:02X}", mac[3], mac[4], mac[5])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundTopic {
    Command(CommandKind),
    Restart,
}

/// MQTT topic names for one device, rooted at `<prefix>/<device_id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    device_id: String,
    base: String,
}

impl Topics {
    pub fn new(prefix: &str, device_id: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        Self {
            device_id: device_id.to_string(),
            base: format!("{}/{}", prefix, device_id),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn sub(&self, suffix: &str) -> String {
        format!("{}/{}", self.base, suffix)
    }

    pub fn status(&self) -> String {
        self.sub("status")
    }

    pub fn state(&self) -> String {
        self.sub("state")
    }

    pub fn temperature(&self) -> String {
        self.sub("sensor/temperature")
    }

    pub fn fan_speed(&self) -> String {
        self.sub("sensor/fan_speed")
    }

    pub fn wifi_signal(&self) -> String {
        self.sub("sensor/wifi_signal")
    }

    pub fn uptime(&self) -> String {
        self.sub("sensor/uptime")
    }

    pub fn mode_state(&self) -> String {
        self.sub("mode/state")
    }

    pub fn auto_state(&self) -> String {
        self.sub("auto/state")
    }

    pub fn mode_set(&self) -> String {
        self.sub("mode/set")
    }

    pub fn auto_set(&self) -> String {
        self.sub("auto/set")
    }

    pub fn manual_set(&self) -> String {
        self.sub("manual/set")
    }

    pub fn mapping_set(&self) -> String {
        self.sub("mapping/set")
    }

    pub fn restart(&self) -> String {
        self.sub("button/restart")
    }

    pub fn subscriptions(&self) -> Vec<String> {
        vec![
            self.mode_set(),
            self.auto_set(),
            self.manual_set(),
            self.mapping_set(),
            self.restart(),
        ]
    }

    pub fn classify(&self, topic: &str) -> Option<InboundTopic> {
        let suffix = topic.strip_prefix(self.base.as_str())?.strip_prefix('/')?;
        match suffix {
            "mode/set" => Some(InboundTopic::Command(CommandKind::Mode)),
            "auto/set" => Some(InboundTopic::Command(CommandKind::AutoEnabled)),
            "manual/set" => Some(InboundTopic::Command(CommandKind::Manual)),
            "mapping/set" => Some(InboundTopic::Command(CommandKind::Mapping)),
            "button/restart" => Some(InboundTopic::Restart),
            _ => None,
        }
    }

    pub fn discovery(&self, component: &str, object_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/config",
            DISCOVERY_PREFIX, component, self.device_id, object_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_suffix_becomes_device_id() {
        assert_eq!(
            device_id_from_mac([0x24, 0x0a, 0xc4, 0x1d, 0xe2, 0x0f]),
            "1D_E2_0F"
        );
    }

    #[test]
    fn topics_hang_off_prefix_and_device() {
        let topics = Topics::new("homeassistant/esp32/", "1D_E2_0F");
        assert_eq!(topics.base(), "homeassistant/esp32/1D_E2_0F");
        assert_eq!(topics.status(), "homeassistant/esp32/1D_E2_0F/status");
        assert_eq!(
            topics.fan_speed(),
            "homeassistant/esp32/1D_E2_0F/sensor/fan_speed"
        );
        assert_eq!(
            topics.discovery("sensor", "temperature"),
            "homeassistant/sensor/1D_E2_0F/temperature/config"
        );
    }

    #[test]
    fn classify_inbound_topics() {
        let topics = Topics::new("fans", "lab");
        assert_eq!(
            topics.classify("fans/lab/manual/set"),
            Some(InboundTopic::Command(CommandKind::Manual))
        );
        assert_eq!(
            topics.classify("fans/lab/button/restart"),
            Some(InboundTopic::Restart)
        );
        assert_eq!(topics.classify("fans/lab/state"), None);
        assert_eq!(topics.classify("fans/lab2/mode/set"), None);
        assert_eq!(topics.classify("other/lab/mode/set"), None);

        for topic in topics.subscriptions() {
            assert!(topics.classify(&topic).is_some(), "{topic}");
        }
    }
}
