use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SensorRule;

/// Operating mode of a group.
///
/// `Unset` is what a config without an `auto` field carries; it behaves as
/// `Auto` everywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoMode {
    #[default]
    Unset,
    Auto,
    Manual,
}

impl AutoMode {
    pub fn is_auto(self) -> bool {
        !matches!(self, Self::Manual)
    }

    pub fn is_manual(self) -> bool {
        matches!(self, Self::Manual)
    }

    pub fn as_str(self) -> &'static str {
        if self.is_auto() {
            "AUTO"
        } else {
            "MANUAL"
        }
    }
}

impl From<Option<bool>> for AutoMode {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            None => Self::Unset,
            Some(true) => Self::Auto,
            Some(false) => Self::Manual,
        }
    }
}

/// Snapshot of a group, written to the store every tick and served by the
/// status API. Also used to rehydrate a group after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStatus {
    pub group: i32,
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    pub auto: bool,
    #[serde(rename = "timeToAuto")]
    pub time_to_auto: i32,
    #[serde(rename = "sensorRule")]
    pub sensor_rule: SensorRule,
    pub error: i32,
    pub presence: bool,
    #[serde(rename = "windowsOpened")]
    pub windows_opened: bool,
    #[serde(rename = "timeToLeave")]
    pub time_to_leave: i32,
    #[serde(rename = "correctionInterval")]
    pub correction_interval: i32,
    #[serde(rename = "setpointLeds")]
    pub setpoint_leds: i32,
    #[serde(rename = "firstDaySetpointLeds")]
    pub first_day_setpoint_leds: i32,
    #[serde(rename = "setpointBlinds")]
    pub setpoint_blinds: Option<i32>,
    #[serde(rename = "setpointSlatBlinds")]
    pub setpoint_slat_blinds: Option<i32>,
    #[serde(rename = "setpointTempOffset")]
    pub setpoint_temp_offset: Option<i32>,
    #[serde(rename = "slopeStartAuto")]
    pub slope_start_auto: i32,
    #[serde(rename = "slopeStopAuto")]
    pub slope_stop_auto: i32,
    #[serde(rename = "slopeStartManual")]
    pub slope_start_manual: i32,
    #[serde(rename = "slopeStopManual")]
    pub slope_stop_manual: i32,
    pub brightness: i32,
    #[serde(rename = "ceilingTemperature")]
    pub ceiling_temperature: i32,
    #[serde(rename = "ceilingHumidity")]
    pub ceiling_humidity: i32,
    pub temperature: i32,
    pub hygrometry: i32,
    pub co2: i32,
    pub cov: i32,
    #[serde(rename = "hvacsSetpointCoolOccupied")]
    pub hvacs_setpoint_cool_occupied: i32,
    #[serde(rename = "hvacsSetpointHeatOccupied")]
    pub hvacs_setpoint_heat_occupied: i32,
    #[serde(rename = "hvacsSetpointCoolInoccupied")]
    pub hvacs_setpoint_cool_inoccupied: i32,
    #[serde(rename = "hvacsSetpointHeatInoccupied")]
    pub hvacs_setpoint_heat_inoccupied: i32,
    #[serde(rename = "hvacsSetpointCoolStandby")]
    pub hvacs_setpoint_cool_standby: i32,
    #[serde(rename = "hvacsSetpointHeatStandby")]
    pub hvacs_setpoint_heat_standby: i32,
    #[serde(rename = "hvacsTargetMode")]
    pub hvacs_target_mode: Option<i32>,
    #[serde(rename = "hvacsHeatCool")]
    pub hvacs_heat_cool: Option<i32>,
    pub leds: Vec<String>,
    pub blinds: Vec<String>,
    pub sensors: Vec<String>,
    pub hvacs: Vec<String>,
    pub nanosenses: Vec<String>,
    #[serde(rename = "firstDay")]
    pub first_day: Vec<String>,
    #[serde(rename = "untrustedDevices")]
    pub untrusted_devices: Vec<String>,
    #[serde(rename = "ruleBrightness")]
    pub rule_brightness: Option<i32>,
    #[serde(rename = "rulePresence")]
    pub rule_presence: Option<i32>,
    #[serde(rename = "firstDayOffset")]
    pub first_day_offset: Option<i32>,
    pub watchdog: i32,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_behaves_as_auto() {
        assert!(AutoMode::Unset.is_auto());
        assert!(AutoMode::Auto.is_auto());
        assert!(AutoMode::Manual.is_manual());
        assert_eq!(AutoMode::from(None), AutoMode::Unset);
        assert_eq!(AutoMode::from(Some(false)), AutoMode::Manual);
        assert_eq!(AutoMode::Unset.as_str(), "AUTO");
    }
}
