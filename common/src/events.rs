use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{config::GroupConfig, error::PayloadError, topics::DeviceClass};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorEvent {
    pub mac: String,
    pub temperature: i32,
    pub brightness: i32,
    pub humidity: i32,
    pub presence: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlindEvent {
    pub mac: String,
    #[serde(rename = "windowStatus1")]
    pub window_status1: bool,
    #[serde(rename = "windowStatus2")]
    pub window_status2: bool,
}

/// HVAC telemetry; setpoints are in 1/10 °C.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HvacEvent {
    pub mac: String,
    #[serde(rename = "setpointCoolOccupied")]
    pub setpoint_cool_occupied: i32,
    #[serde(rename = "setpointHeatOccupied")]
    pub setpoint_heat_occupied: i32,
    #[serde(rename = "setpointCoolInoccupied")]
    pub setpoint_cool_inoccupied: i32,
    #[serde(rename = "setpointHeatInoccupied")]
    pub setpoint_heat_inoccupied: i32,
    #[serde(rename = "setpointCoolStandby")]
    pub setpoint_cool_standby: i32,
    #[serde(rename = "setpointHeatStandby")]
    pub setpoint_heat_standby: i32,
    #[serde(rename = "targetMode")]
    pub target_mode: i32,
    #[serde(rename = "occManCmd1")]
    pub occ_man_cmd1: i32,
    #[serde(rename = "forcing6WaysValve")]
    pub forcing_6_ways_valve: i32,
    #[serde(rename = "forcingDamper")]
    pub forcing_damper: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NanoEvent {
    pub mac: String,
    pub hygrometry: i32,
    pub temperature: i32,
    pub co2: i32,
    pub cov: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceErrorEvent {
    pub mac: String,
}

/// Decoded device report routed to one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Telemetry {
    Sensor(SensorEvent),
    Blind(BlindEvent),
    Hvac(HvacEvent),
    Nano(NanoEvent),
    Error { class: DeviceClass, mac: String },
}

impl Telemetry {
    pub fn mac(&self) -> &str {
        match self {
            Self::Sensor(event) => &event.mac,
            Self::Blind(event) => &event.mac,
            Self::Hvac(event) => &event.mac,
            Self::Nano(event) => &event.mac,
            Self::Error { mac, .. } => mac,
        }
    }

    pub fn decode(class: DeviceClass, payload: &[u8]) -> Result<Self, PayloadError> {
        let telemetry = match class {
            DeviceClass::Sensor => Self::Sensor(decode_json(payload)?),
            DeviceClass::Blind => Self::Blind(decode_json(payload)?),
            DeviceClass::Hvac => Self::Hvac(decode_json(payload)?),
            DeviceClass::Nano => Self::Nano(decode_json(payload)?),
            DeviceClass::Led => {
                return Err(PayloadError::UnknownTopic(format!(
                    "{} telemetry",
                    class.as_str()
                )))
            }
        };
        if telemetry.mac().is_empty() {
            return Err(PayloadError::MissingMac);
        }
        Ok(telemetry)
    }

    pub fn decode_error(class: DeviceClass, payload: &[u8]) -> Result<Self, PayloadError> {
        let event: DeviceErrorEvent = decode_json(payload)?;
        if event.mac.is_empty() {
            return Err(PayloadError::MissingMac);
        }
        Ok(Self::Error {
            class,
            mac: event.mac,
        })
    }
}

/// Operator command routed to a group (wall switch, BLE remote, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCommand {
    pub group: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slats: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blinds: Option<i32>,
    /// Temperature shift in 1/10 °C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heat: Option<i32>,
}

impl GroupCommand {
    pub fn into_delta(self) -> GroupConfig {
        GroupConfig {
            auto: self.leds.map(|_| false),
            setpoint_leds: self.leds,
            setpoint_slat_blinds: self.slats,
            setpoint_blinds: self.blinds,
            setpoint_temp_offset: self.heat,
            ..GroupConfig::new(self.group)
        }
    }
}

/// Group definitions pushed by the server for one switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchSetup {
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub groups: BTreeMap<i32, GroupConfig>,
}

impl SwitchSetup {
    /// Group configs keyed by the map entry, which wins over the inner id.
    pub fn into_configs(self) -> Vec<GroupConfig> {
        self.groups
            .into_iter()
            .map(|(group, mut config)| {
                config.group = group;
                config
            })
            .collect()
    }
}

pub fn decode_json<T: DeserializeOwned>(payload: &[u8]) -> Result<T, PayloadError> {
    Ok(serde_json::from_slice(payload)?)
}
