use serde::{Deserialize, Serialize};

use crate::types::AutoMode;

pub const DEFAULT_CORRECTION_INTERVAL: i32 = 10;
pub const DEFAULT_SCALE: i32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorRule {
    #[default]
    Average,
    Max,
    Min,
}

/// Group definition as pushed by the server and persisted by the store.
///
/// Every field but `group` is optional: the same record is used as a full
/// configuration and as a delta, where `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub group: i32,
    #[serde(rename = "friendlyName", default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leds: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blinds: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hvacs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nanosenses: Option<Vec<String>>,
    #[serde(rename = "firstDay", default, skip_serializing_if = "Option::is_none")]
    pub first_day: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    #[serde(rename = "slopeStartAuto", default, skip_serializing_if = "Option::is_none")]
    pub slope_start_auto: Option<i32>,
    #[serde(rename = "slopeStopAuto", default, skip_serializing_if = "Option::is_none")]
    pub slope_stop_auto: Option<i32>,
    #[serde(rename = "slopeStartManual", default, skip_serializing_if = "Option::is_none")]
    pub slope_start_manual: Option<i32>,
    #[serde(rename = "slopeStopManual", default, skip_serializing_if = "Option::is_none")]
    pub slope_stop_manual: Option<i32>,
    #[serde(rename = "correctionInterval", default, skip_serializing_if = "Option::is_none")]
    pub correction_interval: Option<i32>,
    #[serde(rename = "sensorRule", default, skip_serializing_if = "Option::is_none")]
    pub sensor_rule: Option<SensorRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog: Option<i32>,
    #[serde(rename = "ruleBrightness", default, skip_serializing_if = "Option::is_none")]
    pub rule_brightness: Option<i32>,
    #[serde(rename = "rulePresence", default, skip_serializing_if = "Option::is_none")]
    pub rule_presence: Option<i32>,
    #[serde(rename = "firstDayOffset", default, skip_serializing_if = "Option::is_none")]
    pub first_day_offset: Option<i32>,

    // HVAC setpoints are in 1/10 °C.
    #[serde(rename = "hvacsSetpointCoolOccupied", default, skip_serializing_if = "Option::is_none")]
    pub hvacs_setpoint_cool_occupied: Option<i32>,
    #[serde(rename = "hvacsSetpointHeatOccupied", default, skip_serializing_if = "Option::is_none")]
    pub hvacs_setpoint_heat_occupied: Option<i32>,
    #[serde(rename = "hvacsSetpointCoolInoccupied", default, skip_serializing_if = "Option::is_none")]
    pub hvacs_setpoint_cool_inoccupied: Option<i32>,
    #[serde(rename = "hvacsSetpointHeatInoccupied", default, skip_serializing_if = "Option::is_none")]
    pub hvacs_setpoint_heat_inoccupied: Option<i32>,
    #[serde(rename = "hvacsSetpointCoolStandby", default, skip_serializing_if = "Option::is_none")]
    pub hvacs_setpoint_cool_standby: Option<i32>,
    #[serde(rename = "hvacsSetpointHeatStandby", default, skip_serializing_if = "Option::is_none")]
    pub hvacs_setpoint_heat_standby: Option<i32>,
    #[serde(rename = "hvacsTargetMode", default, skip_serializing_if = "Option::is_none")]
    pub hvacs_target_mode: Option<i32>,
    #[serde(rename = "hvacsHeatCool", default, skip_serializing_if = "Option::is_none")]
    pub hvacs_heat_cool: Option<i32>,

    // Transient commands, never persisted.
    #[serde(rename = "setpointLeds", default, skip_serializing_if = "Option::is_none")]
    pub setpoint_leds: Option<i32>,
    #[serde(rename = "setpointBlinds", default, skip_serializing_if = "Option::is_none")]
    pub setpoint_blinds: Option<i32>,
    #[serde(rename = "setpointSlatBlinds", default, skip_serializing_if = "Option::is_none")]
    pub setpoint_slat_blinds: Option<i32>,
    #[serde(rename = "setpointTempOffset", default, skip_serializing_if = "Option::is_none")]
    pub setpoint_temp_offset: Option<i32>,
    #[serde(rename = "eipDriversReset", default, skip_serializing_if = "Option::is_none")]
    pub eip_drivers_reset: Option<bool>,
}

impl GroupConfig {
    pub fn new(group: i32) -> Self {
        Self {
            group,
            ..Self::default()
        }
    }

    pub fn auto_mode(&self) -> AutoMode {
        AutoMode::from(self.auto)
    }

    pub fn correction_interval(&self) -> i32 {
        self.correction_interval
            .unwrap_or(DEFAULT_CORRECTION_INTERVAL)
    }

    pub fn sensor_rule(&self) -> SensorRule {
        self.sensor_rule.unwrap_or_default()
    }

    pub fn has_hvac_config(&self) -> bool {
        self.hvacs_setpoint_cool_occupied.is_some()
            || self.hvacs_setpoint_heat_occupied.is_some()
            || self.hvacs_setpoint_cool_inoccupied.is_some()
            || self.hvacs_setpoint_heat_inoccupied.is_some()
            || self.hvacs_setpoint_cool_standby.is_some()
            || self.hvacs_setpoint_heat_standby.is_some()
            || self.hvacs_target_mode.is_some()
            || self.hvacs_heat_cool.is_some()
    }

    /// Merges every non-`None` settings field of `delta` into `self`.
    ///
    /// Command fields (led/blind/slat setpoints, temperature offset, driver
    /// reset) are left out: they act once and do not belong to the stored
    /// definition of the group.
    pub fn merge_settings(&mut self, delta: &GroupConfig) {
        fn take<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }

        take(&mut self.friendly_name, &delta.friendly_name);
        take(&mut self.leds, &delta.leds);
        take(&mut self.blinds, &delta.blinds);
        take(&mut self.sensors, &delta.sensors);
        take(&mut self.hvacs, &delta.hvacs);
        take(&mut self.nanosenses, &delta.nanosenses);
        take(&mut self.first_day, &delta.first_day);
        take(&mut self.auto, &delta.auto);
        take(&mut self.slope_start_auto, &delta.slope_start_auto);
        take(&mut self.slope_stop_auto, &delta.slope_stop_auto);
        take(&mut self.slope_start_manual, &delta.slope_start_manual);
        take(&mut self.slope_stop_manual, &delta.slope_stop_manual);
        take(&mut self.correction_interval, &delta.correction_interval);
        take(&mut self.sensor_rule, &delta.sensor_rule);
        take(&mut self.watchdog, &delta.watchdog);
        take(&mut self.rule_brightness, &delta.rule_brightness);
        take(&mut self.rule_presence, &delta.rule_presence);
        take(&mut self.first_day_offset, &delta.first_day_offset);
        take(
            &mut self.hvacs_setpoint_cool_occupied,
            &delta.hvacs_setpoint_cool_occupied,
        );
        take(
            &mut self.hvacs_setpoint_heat_occupied,
            &delta.hvacs_setpoint_heat_occupied,
        );
        take(
            &mut self.hvacs_setpoint_cool_inoccupied,
            &delta.hvacs_setpoint_cool_inoccupied,
        );
        take(
            &mut self.hvacs_setpoint_heat_inoccupied,
            &delta.hvacs_setpoint_heat_inoccupied,
        );
        take(
            &mut self.hvacs_setpoint_cool_standby,
            &delta.hvacs_setpoint_cool_standby,
        );
        take(
            &mut self.hvacs_setpoint_heat_standby,
            &delta.hvacs_setpoint_heat_standby,
        );
        take(&mut self.hvacs_target_mode, &delta.hvacs_target_mode);
        take(&mut self.hvacs_heat_cool, &delta.hvacs_heat_cool);
    }

    /// Copy of the config without its transient command fields.
    pub fn settings(&self) -> GroupConfig {
        GroupConfig {
            setpoint_leds: None,
            setpoint_blinds: None,
            setpoint_slat_blinds: None,
            setpoint_temp_offset: None,
            eip_drivers_reset: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub mac: String,
    pub local: BrokerConfig,
    pub server: Option<BrokerConfig>,
    pub http_port: u16,
    pub max_payload_bytes: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mac: "00:00:00:00:00:00".to_string(),
            local: BrokerConfig::default(),
            server: None,
            http_port: 8080,
            max_payload_bytes: 16 * 1024,
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        self.mac = self.mac.trim().to_ascii_uppercase();
        if self.local.port == 0 {
            self.local.port = 1883;
        }
        if let Some(server) = self.server.as_mut() {
            if server.port == 0 {
                server.port = 1883;
            }
        }
        if self.http_port == 0 {
            self.http_port = 8080;
        }
        self.max_payload_bytes = self.max_payload_bytes.clamp(512, 1024 * 1024);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_camel_case_config() {
        let raw = r#"{
            "group": 3,
            "friendlyName": "Open space",
            "sensors": ["S1", "S2"],
            "sensorRule": "max",
            "correctionInterval": 5,
            "firstDayOffset": 20,
            "hvacsSetpointCoolOccupied": 240
        }"#;
        let config: GroupConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.group, 3);
        assert_eq!(config.friendly_name.as_deref(), Some("Open space"));
        assert_eq!(config.sensor_rule(), SensorRule::Max);
        assert_eq!(config.correction_interval(), 5);
        assert_eq!(config.first_day_offset, Some(20));
        assert!(config.has_hvac_config());
        assert_eq!(config.auto_mode(), AutoMode::Unset);
    }

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = GroupConfig::new(1);
        assert_eq!(config.correction_interval(), DEFAULT_CORRECTION_INTERVAL);
        assert_eq!(config.sensor_rule(), SensorRule::Average);
        assert!(!config.has_hvac_config());
    }

    #[test]
    fn merge_settings_skips_commands_and_none() {
        let mut stored = GroupConfig {
            watchdog: Some(30),
            leds: Some(vec!["L1".to_string()]),
            ..GroupConfig::new(1)
        };
        let delta = GroupConfig {
            rule_brightness: Some(400),
            setpoint_leds: Some(40),
            eip_drivers_reset: Some(true),
            ..GroupConfig::new(1)
        };

        stored.merge_settings(&delta);

        assert_eq!(stored.watchdog, Some(30));
        assert_eq!(stored.leds, Some(vec!["L1".to_string()]));
        assert_eq!(stored.rule_brightness, Some(400));
        assert_eq!(stored.setpoint_leds, None);
        assert_eq!(stored.eip_drivers_reset, None);
    }

    #[test]
    fn settings_strips_transient_fields() {
        let config = GroupConfig {
            setpoint_leds: Some(10),
            setpoint_temp_offset: Some(-5),
            watchdog: Some(60),
            ..GroupConfig::new(2)
        };
        let settings = config.settings();
        assert_eq!(settings.setpoint_leds, None);
        assert_eq!(settings.setpoint_temp_offset, None);
        assert_eq!(settings.watchdog, Some(60));
    }

    #[test]
    fn controller_config_sanitize() {
        let mut config = ControllerConfig {
            mac: " ab:cd:ef:01:02:03 ".to_string(),
            http_port: 0,
            max_payload_bytes: 1,
            ..ControllerConfig::default()
        };
        config.sanitize();
        assert_eq!(config.mac, "AB:CD:EF:01:02:03");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.max_payload_bytes, 512);
    }
}
