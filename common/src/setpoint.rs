use crate::{config::GroupConfig, types::AutoMode};

pub const SETPOINT_MIN: i32 = 0;
pub const SETPOINT_MAX: i32 = 100;

pub fn clamp_setpoint(value: i32) -> i32 {
    value.clamp(SETPOINT_MIN, SETPOINT_MAX)
}

/// Lighting setpoints of a group: the main ramp and the first-day ramp used
/// by corridor fixtures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lighting {
    pub setpoint: i32,
    pub first_day: i32,
}

impl Lighting {
    pub fn full_on() -> Self {
        Self {
            setpoint: SETPOINT_MAX,
            first_day: SETPOINT_MAX,
        }
    }

    pub fn off() -> Self {
        Self::default()
    }

    /// Moves both ramps one `scale` step toward the brightness target.
    ///
    /// Without a target both ramps go full on. With a first-day offset the
    /// corridor ramp dims first and the main ramp follows only once the
    /// corridor level is within the offset; on the way up the corridor ramp
    /// follows the main ramp until the main ramp passes the offset, then
    /// switches off unless it already sits at full.
    pub fn nudge(
        &mut self,
        brightness: i32,
        target: Option<i32>,
        first_day_offset: Option<i32>,
        scale: i32,
    ) {
        let Some(target) = target else {
            *self = Self::full_on();
            return;
        };

        if brightness > target {
            match first_day_offset {
                Some(offset) => {
                    self.first_day = (self.first_day - scale).max(SETPOINT_MIN);
                    if self.first_day <= offset {
                        self.setpoint -= scale;
                    }
                }
                None => {
                    self.setpoint -= scale;
                    self.first_day = self.setpoint;
                }
            }
        } else if brightness < target {
            self.setpoint += scale;
            match first_day_offset {
                Some(offset) if self.setpoint > offset => {
                    if self.first_day != SETPOINT_MAX {
                        self.first_day = SETPOINT_MIN;
                    }
                }
                Some(_) => self.first_day += scale,
                None => self.first_day = self.setpoint,
            }
        }

        self.clamp();
    }

    pub fn clamp(&mut self) {
        self.setpoint = clamp_setpoint(self.setpoint);
        self.first_day = clamp_setpoint(self.first_day);
    }
}

/// Ramp durations sent with every LED setpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slopes {
    pub start: i32,
    pub stop: i32,
}

impl Slopes {
    pub fn for_mode(config: &GroupConfig, mode: AutoMode) -> Self {
        let (start, stop) = if mode.is_auto() {
            (config.slope_start_auto, config.slope_stop_auto)
        } else {
            (config.slope_start_manual, config.slope_stop_manual)
        };
        Self {
            start: start.unwrap_or(0),
            stop: stop.unwrap_or(0),
        }
    }
}

/// Room conditions pushed to HVAC terminals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpaceValues {
    pub temperature: i32,
    pub co2: i32,
    pub cov: i32,
    pub hygrometry: i32,
    pub window_status: bool,
    pub presence: bool,
}

/// Setpoint configuration pushed to HVAC terminals, in 1/10 °C. Only the
/// configured fields are sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HvacSetpoints {
    pub cool_occupied: Option<i32>,
    pub heat_occupied: Option<i32>,
    pub cool_inoccupied: Option<i32>,
    pub heat_inoccupied: Option<i32>,
    pub cool_standby: Option<i32>,
    pub heat_standby: Option<i32>,
    pub target_mode: Option<i32>,
    pub heat_cool: Option<i32>,
}

impl HvacSetpoints {
    pub fn from_config(config: &GroupConfig) -> Self {
        Self {
            cool_occupied: config.hvacs_setpoint_cool_occupied,
            heat_occupied: config.hvacs_setpoint_heat_occupied,
            cool_inoccupied: config.hvacs_setpoint_cool_inoccupied,
            heat_inoccupied: config.hvacs_setpoint_heat_inoccupied,
            cool_standby: config.hvacs_setpoint_cool_standby,
            heat_standby: config.hvacs_setpoint_heat_standby,
            target_mode: config.hvacs_target_mode,
            heat_cool: config.hvacs_heat_cool,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SCALE: i32 = 10;

    #[test]
    fn nudge_tracks_brightness_target() {
        let mut lighting = Lighting {
            setpoint: 50,
            first_day: 50,
        };

        lighting.nudge(600, Some(400), None, SCALE);
        assert_eq!(lighting.setpoint, 40);

        lighting.nudge(200, Some(400), None, SCALE);
        lighting.nudge(200, Some(400), None, SCALE);
        assert_eq!(lighting.setpoint, 60);
        assert_eq!(lighting.first_day, 60);

        lighting.nudge(400, Some(400), None, SCALE);
        assert_eq!(lighting.setpoint, 60);
    }

    #[test]
    fn nudge_without_target_goes_full_on() {
        let mut lighting = Lighting::off();
        lighting.nudge(0, None, Some(20), SCALE);
        assert_eq!(lighting, Lighting::full_on());
    }

    #[test]
    fn nudge_stays_within_bounds() {
        let mut lighting = Lighting {
            setpoint: 95,
            first_day: 5,
        };
        lighting.nudge(0, Some(400), None, SCALE);
        assert_eq!(lighting.setpoint, 100);

        let mut lighting = Lighting {
            setpoint: 5,
            first_day: 5,
        };
        lighting.nudge(900, Some(400), Some(20), SCALE);
        assert_eq!(lighting, Lighting::off());
    }

    #[test]
    fn first_day_dims_before_main_ramp() {
        let mut lighting = Lighting {
            setpoint: 60,
            first_day: 40,
        };

        lighting.nudge(900, Some(400), Some(20), SCALE);
        assert_eq!(lighting, Lighting { setpoint: 60, first_day: 30 });

        lighting.nudge(900, Some(400), Some(20), SCALE);
        assert_eq!(lighting, Lighting { setpoint: 50, first_day: 20 });

        lighting.nudge(900, Some(400), Some(20), SCALE);
        assert_eq!(lighting, Lighting { setpoint: 40, first_day: 10 });
    }

    #[test]
    fn first_day_switches_off_once_main_ramp_passes_offset() {
        let mut lighting = Lighting {
            setpoint: 10,
            first_day: 10,
        };

        lighting.nudge(0, Some(400), Some(20), SCALE);
        assert_eq!(lighting, Lighting { setpoint: 20, first_day: 20 });

        lighting.nudge(0, Some(400), Some(20), SCALE);
        assert_eq!(lighting, Lighting { setpoint: 30, first_day: 0 });

        let mut full = Lighting {
            setpoint: 30,
            first_day: 100,
        };
        full.nudge(0, Some(400), Some(20), SCALE);
        assert_eq!(full, Lighting { setpoint: 40, first_day: 100 });
    }

    #[test]
    fn slopes_follow_mode() {
        let config = GroupConfig {
            slope_start_auto: Some(10),
            slope_stop_auto: Some(20),
            slope_start_manual: Some(1),
            ..GroupConfig::new(1)
        };
        assert_eq!(
            Slopes::for_mode(&config, AutoMode::Unset),
            Slopes { start: 10, stop: 20 }
        );
        assert_eq!(
            Slopes::for_mode(&config, AutoMode::Manual),
            Slopes { start: 1, stop: 0 }
        );
    }
}
