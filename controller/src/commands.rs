use serde::Serialize;

use switch_common::{device_settings_topic, DeviceClass, GroupAction};

#[derive(Debug, Serialize)]
struct LedSettings<'a> {
    mac: &'a str,
    #[serde(rename = "setpointAuto")]
    setpoint_auto: i32,
    #[serde(rename = "slopeStartAuto")]
    slope_start_auto: i32,
    #[serde(rename = "slopeStopAuto")]
    slope_stop_auto: i32,
}

/// Both motors of a blind driver receive the same position.
#[derive(Debug, Serialize)]
struct BlindSettings<'a> {
    mac: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    blind1: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blind2: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slat1: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slat2: Option<i32>,
}

#[derive(Debug, Serialize)]
struct HvacShift<'a> {
    mac: &'a str,
    shift: i32,
}

#[derive(Debug, Serialize)]
struct HvacSpaceValues<'a> {
    mac: &'a str,
    temperature: i32,
    co2: i32,
    cov: i32,
    hygrometry: i32,
    #[serde(rename = "windowStatus")]
    window_status: bool,
    presence: bool,
}

#[derive(Debug, Serialize)]
struct HvacConfigSettings<'a> {
    mac: &'a str,
    #[serde(rename = "setpointCoolOccupied", skip_serializing_if = "Option::is_none")]
    setpoint_cool_occupied: Option<i32>,
    #[serde(rename = "setpointHeatOccupied", skip_serializing_if = "Option::is_none")]
    setpoint_heat_occupied: Option<i32>,
    #[serde(rename = "setpointCoolInoccupied", skip_serializing_if = "Option::is_none")]
    setpoint_cool_inoccupied: Option<i32>,
    #[serde(rename = "setpointHeatInoccupied", skip_serializing_if = "Option::is_none")]
    setpoint_heat_inoccupied: Option<i32>,
    #[serde(rename = "setpointCoolStandby", skip_serializing_if = "Option::is_none")]
    setpoint_cool_standby: Option<i32>,
    #[serde(rename = "setpointHeatStandby", skip_serializing_if = "Option::is_none")]
    setpoint_heat_standby: Option<i32>,
    #[serde(rename = "targetMode", skip_serializing_if = "Option::is_none")]
    target_mode: Option<i32>,
    #[serde(rename = "heatCool", skip_serializing_if = "Option::is_none")]
    heat_cool: Option<i32>,
}

#[derive(Debug, Serialize)]
struct DriverReset<'a> {
    mac: &'a str,
    #[serde(rename = "isConfigured")]
    is_configured: bool,
}

/// Topic and JSON body of a device command. `None` for actions that do not
/// go on the wire.
pub fn encode(action: &GroupAction) -> anyhow::Result<Option<(String, Vec<u8>)>> {
    let encoded = match action {
        GroupAction::LedSetpoint {
            mac,
            setpoint,
            slopes,
        } => (
            device_settings_topic(DeviceClass::Led, mac),
            serde_json::to_vec(&LedSettings {
                mac,
                setpoint_auto: *setpoint,
                slope_start_auto: slopes.start,
                slope_stop_auto: slopes.stop,
            })?,
        ),
        GroupAction::BlindSetpoint { mac, blind, slat } => (
            device_settings_topic(DeviceClass::Blind, mac),
            serde_json::to_vec(&BlindSettings {
                mac,
                blind1: *blind,
                blind2: *blind,
                slat1: *slat,
                slat2: *slat,
            })?,
        ),
        GroupAction::HvacShift { mac, shift } => (
            device_settings_topic(DeviceClass::Hvac, mac),
            serde_json::to_vec(&HvacShift { mac, shift: *shift })?,
        ),
        GroupAction::HvacSpaceValues { mac, values } => (
            device_settings_topic(DeviceClass::Hvac, mac),
            serde_json::to_vec(&HvacSpaceValues {
                mac,
                temperature: values.temperature,
                co2: values.co2,
                cov: values.cov,
                hygrometry: values.hygrometry,
                window_status: values.window_status,
                presence: values.presence,
            })?,
        ),
        GroupAction::HvacConfig { mac, setpoints } => (
            device_settings_topic(DeviceClass::Hvac, mac),
            serde_json::to_vec(&HvacConfigSettings {
                mac,
                setpoint_cool_occupied: setpoints.cool_occupied,
                setpoint_heat_occupied: setpoints.heat_occupied,
                setpoint_cool_inoccupied: setpoints.cool_inoccupied,
                setpoint_heat_inoccupied: setpoints.heat_inoccupied,
                setpoint_cool_standby: setpoints.cool_standby,
                setpoint_heat_standby: setpoints.heat_standby,
                target_mode: setpoints.target_mode,
                heat_cool: setpoints.heat_cool,
            })?,
        ),
        GroupAction::DriverReset { class, mac } => (
            device_settings_topic(*class, mac),
            serde_json::to_vec(&DriverReset {
                mac,
                is_configured: false,
            })?,
        ),
        GroupAction::PersistStatus => return Ok(None),
    };
    Ok(Some(encoded))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use switch_common::{HvacSetpoints, Slopes, SpaceValues};

    use super::*;

    fn decoded(action: GroupAction) -> (String, serde_json::Value) {
        let (topic, payload) = encode(&action).unwrap().unwrap();
        (topic, serde_json::from_slice(&payload).unwrap())
    }

    #[test]
    fn led_setpoint_payload() {
        let (topic, body) = decoded(GroupAction::LedSetpoint {
            mac: "L1".to_string(),
            setpoint: 40,
            slopes: Slopes { start: 10, stop: 20 },
        });
        assert_eq!(topic, "/write/led/L1/update/settings");
        assert_eq!(
            body,
            json!({"mac": "L1", "setpointAuto": 40, "slopeStartAuto": 10, "slopeStopAuto": 20})
        );
    }

    #[test]
    fn blind_payload_only_carries_provided_fields() {
        let (topic, body) = decoded(GroupAction::BlindSetpoint {
            mac: "B1".to_string(),
            blind: None,
            slat: Some(30),
        });
        assert_eq!(topic, "/write/blind/B1/update/settings");
        assert_eq!(body, json!({"mac": "B1", "slat1": 30, "slat2": 30}));
    }

    #[test]
    fn hvac_payloads() {
        let (_, body) = decoded(GroupAction::HvacSpaceValues {
            mac: "H1".to_string(),
            values: SpaceValues {
                temperature: 215,
                co2: 800,
                cov: 100,
                hygrometry: 45,
                window_status: true,
                presence: false,
            },
        });
        assert_eq!(
            body,
            json!({
                "mac": "H1", "temperature": 215, "co2": 800, "cov": 100,
                "hygrometry": 45, "windowStatus": true, "presence": false
            })
        );

        let (_, body) = decoded(GroupAction::HvacConfig {
            mac: "H1".to_string(),
            setpoints: HvacSetpoints {
                cool_occupied: Some(250),
                heat_cool: Some(1),
                ..HvacSetpoints::default()
            },
        });
        assert_eq!(
            body,
            json!({"mac": "H1", "setpointCoolOccupied": 250, "heatCool": 1})
        );

        let (_, body) = decoded(GroupAction::HvacShift {
            mac: "H1".to_string(),
            shift: -10,
        });
        assert_eq!(body, json!({"mac": "H1", "shift": -10}));
    }

    #[test]
    fn driver_reset_targets_the_device_class() {
        let (topic, body) = decoded(GroupAction::DriverReset {
            class: DeviceClass::Hvac,
            mac: "H2".to_string(),
        });
        assert_eq!(topic, "/write/hvac/H2/update/settings");
        assert_eq!(body, json!({"mac": "H2", "isConfigured": false}));
    }

    #[test]
    fn persist_status_is_not_a_device_command() {
        assert!(encode(&GroupAction::PersistStatus).unwrap().is_none());
    }
}
