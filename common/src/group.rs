use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::{
    aggregate::{aggregate, is_presence_detected, is_window_opened, Seed},
    config::{GroupConfig, DEFAULT_SCALE},
    device_set::DeviceSet,
    events::{BlindEvent, HvacEvent, NanoEvent, SensorEvent, Telemetry},
    mode::{ModeController, ModeStep},
    setpoint::{clamp_setpoint, HvacSetpoints, Lighting, Slopes, SpaceValues},
    topics::DeviceClass,
    types::{AutoMode, GroupStatus},
};

/// Follow-up work produced by a config change, handled on the group's own
/// queue after the change has been merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEvent {
    Manual,
    Blind,
    Hvac,
    HvacConfig,
    ResetDrivers,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupAction {
    LedSetpoint {
        mac: String,
        setpoint: i32,
        slopes: Slopes,
    },
    BlindSetpoint {
        mac: String,
        blind: Option<i32>,
        slat: Option<i32>,
    },
    HvacShift {
        mac: String,
        shift: i32,
    },
    HvacSpaceValues {
        mac: String,
        values: SpaceValues,
    },
    HvacConfig {
        mac: String,
        setpoints: HvacSetpoints,
    },
    DriverReset {
        class: DeviceClass,
        mac: String,
    },
    PersistStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Environment {
    brightness: i32,
    ceiling_temperature: i32,
    ceiling_humidity: i32,
    temperature: i32,
    hygrometry: i32,
    co2: i32,
    cov: i32,
}

// Aggregated from HVAC telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HvacReadings {
    cool_occupied: i32,
    heat_occupied: i32,
    cool_inoccupied: i32,
    heat_inoccupied: i32,
    cool_standby: i32,
    heat_standby: i32,
}

/// Control engine of one group. Pure state: every side effect is returned as
/// a `GroupAction` for the host loop to carry out.
#[derive(Debug, Clone)]
pub struct GroupEngine {
    config: GroupConfig,
    mode: ModeController,

    sensors: DeviceSet<SensorEvent>,
    blinds: DeviceSet<BlindEvent>,
    hvacs: DeviceSet<HvacEvent>,
    nanosenses: DeviceSet<NanoEvent>,
    first_day: BTreeSet<String>,

    lighting: Lighting,
    env: Environment,
    hvac: HvacReadings,

    presence: bool,
    last_presence: bool,
    opened: bool,
    presence_timeout: i32,
    counter: i32,
    error: i32,

    pending_blind: Option<i32>,
    pending_slat: Option<i32>,
    pending_shift: Option<i32>,
}

impl GroupEngine {
    pub fn new(config: GroupConfig) -> Self {
        let config = config.settings();
        let mut mode = ModeController::new(config.auto_mode());
        if mode.is_manual() {
            mode.arm(config.watchdog);
        }

        Self {
            mode,
            sensors: DeviceSet::with_members(members(&config.sensors)),
            blinds: DeviceSet::with_members(members(&config.blinds)),
            hvacs: DeviceSet::with_members(members(&config.hvacs)),
            nanosenses: DeviceSet::with_members(members(&config.nanosenses)),
            first_day: members(&config.first_day).iter().cloned().collect(),
            lighting: Lighting::default(),
            env: Environment::default(),
            hvac: HvacReadings::default(),
            presence: false,
            last_presence: false,
            opened: false,
            presence_timeout: 0,
            counter: 0,
            error: 0,
            pending_blind: None,
            pending_slat: None,
            pending_shift: None,
            config,
        }
    }

    /// Picks up where a previous run left off.
    pub fn restore(&mut self, status: &GroupStatus) {
        self.lighting = Lighting {
            setpoint: status.setpoint_leds,
            first_day: status.first_day_setpoint_leds,
        };
        self.lighting.clamp();

        let mode = if status.auto {
            AutoMode::Auto
        } else {
            AutoMode::Manual
        };
        self.mode.restore(mode, status.time_to_auto);
        self.config.auto = Some(status.auto);
    }

    pub fn id(&self) -> i32 {
        self.config.group
    }

    /// Runtime definition of the group, without transient command fields.
    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    pub fn mode(&self) -> AutoMode {
        self.mode.mode()
    }

    pub fn setpoint(&self) -> i32 {
        self.lighting.setpoint
    }

    pub fn first_day_setpoint(&self) -> i32 {
        self.lighting.first_day
    }

    pub fn presence(&self) -> bool {
        self.presence
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    /// Stores a device report. Returns `false` when the device is not a
    /// member of the group.
    pub fn on_telemetry(&mut self, telemetry: Telemetry) -> bool {
        match telemetry {
            Telemetry::Sensor(event) => {
                let mac = event.mac.clone();
                self.sensors.update(&mac, event)
            }
            Telemetry::Blind(event) => {
                let mac = event.mac.clone();
                self.blinds.update(&mac, event)
            }
            Telemetry::Hvac(event) => {
                let mac = event.mac.clone();
                self.hvacs.update(&mac, event)
            }
            Telemetry::Nano(event) => {
                let mac = event.mac.clone();
                self.nanosenses.update(&mac, event)
            }
            Telemetry::Error { class, mac } => match class {
                DeviceClass::Sensor => self.sensors.mark_untrusted(&mac),
                DeviceClass::Blind => self.blinds.mark_untrusted(&mac),
                DeviceClass::Hvac => self.hvacs.mark_untrusted(&mac),
                DeviceClass::Nano => self.nanosenses.mark_untrusted(&mac),
                DeviceClass::Led => false,
            },
        }
    }

    /// Merges a config delta. Only fields set in `delta` are applied; the
    /// returned events still have to be fed back through `handle_event`.
    pub fn apply_config(&mut self, delta: &GroupConfig) -> Vec<GroupEvent> {
        let mut events = Vec::new();
        let mut post = |event: GroupEvent| {
            if !events.contains(&event) {
                events.push(event);
            }
        };

        self.config.merge_settings(delta);

        if let Some(auto) = delta.auto {
            let mode = AutoMode::from(Some(auto));
            if self.mode.set_mode(mode) && mode.is_manual() {
                self.mode.arm(self.config.watchdog);
                post(GroupEvent::Manual);
            }
        }
        if let Some(setpoint) = delta.setpoint_leds {
            if self.mode.is_manual() {
                self.mode.arm(self.config.watchdog);
                self.lighting.setpoint = setpoint;
                self.lighting.clamp();
                post(GroupEvent::Manual);
            }
        }
        if delta.setpoint_blinds.is_some() || delta.setpoint_slat_blinds.is_some() {
            self.pending_blind = delta.setpoint_blinds;
            self.pending_slat = delta.setpoint_slat_blinds;
            post(GroupEvent::Blind);
        }
        if let Some(shift) = delta.setpoint_temp_offset {
            self.pending_shift = Some(shift);
            post(GroupEvent::Hvac);
        }
        if delta.has_hvac_config() {
            post(GroupEvent::HvacConfig);
        }
        if delta.eip_drivers_reset == Some(true) {
            post(GroupEvent::ResetDrivers);
        }

        if let Some(ids) = &delta.sensors {
            self.sensors.reconcile(ids);
        }
        if let Some(ids) = &delta.blinds {
            self.blinds.reconcile(ids);
        }
        if let Some(ids) = &delta.hvacs {
            self.hvacs.reconcile(ids);
        }
        if let Some(ids) = &delta.nanosenses {
            self.nanosenses.reconcile(ids);
        }
        if let Some(ids) = &delta.first_day {
            self.first_day = ids.iter().cloned().collect();
        }

        if let Some(interval) = delta.correction_interval {
            if self.counter > interval {
                self.counter = interval.max(0);
            }
        }
        if let Some(watchdog) = delta.watchdog {
            self.mode.clamp(watchdog);
        }
        if let Some(rule) = delta.rule_presence {
            if self.presence_timeout > rule {
                self.presence_timeout = rule.max(0);
            }
        }

        events
    }

    /// Swaps in a whole new definition. Settings missing from `config` go
    /// back to their defaults and missing device lists empty the group. The
    /// mode is kept unless `config` sets it.
    pub fn replace_config(&mut self, config: &GroupConfig) -> Vec<GroupEvent> {
        let mut next = GroupConfig::new(self.id());
        next.merge_settings(config);

        let delta = GroupConfig {
            group: self.id(),
            leds: Some(next.leds.clone().unwrap_or_default()),
            blinds: Some(next.blinds.clone().unwrap_or_default()),
            sensors: Some(next.sensors.clone().unwrap_or_default()),
            hvacs: Some(next.hvacs.clone().unwrap_or_default()),
            nanosenses: Some(next.nanosenses.clone().unwrap_or_default()),
            first_day: Some(next.first_day.clone().unwrap_or_default()),
            ..config.clone()
        };
        let events = self.apply_config(&delta);

        next.auto = self.config.auto;
        self.config = next;
        events
    }

    pub fn handle_event(&mut self, event: GroupEvent) -> Vec<GroupAction> {
        let mut actions = Vec::new();
        match event {
            GroupEvent::Manual => {
                self.push_leds(&mut actions);
                actions.push(GroupAction::PersistStatus);
            }
            GroupEvent::Blind => {
                for mac in members(&self.config.blinds) {
                    actions.push(GroupAction::BlindSetpoint {
                        mac: mac.clone(),
                        blind: self.pending_blind,
                        slat: self.pending_slat,
                    });
                }
            }
            GroupEvent::Hvac => {
                if let Some(shift) = self.pending_shift {
                    for mac in members(&self.config.hvacs) {
                        actions.push(GroupAction::HvacShift {
                            mac: mac.clone(),
                            shift,
                        });
                    }
                }
            }
            GroupEvent::HvacConfig => {
                let setpoints = HvacSetpoints::from_config(&self.config);
                for mac in members(&self.config.hvacs) {
                    actions.push(GroupAction::HvacConfig {
                        mac: mac.clone(),
                        setpoints,
                    });
                }
            }
            GroupEvent::ResetDrivers => {
                let classes = [
                    (DeviceClass::Led, &self.config.leds),
                    (DeviceClass::Blind, &self.config.blinds),
                    (DeviceClass::Hvac, &self.config.hvacs),
                ];
                for (class, list) in classes {
                    for mac in members(list) {
                        actions.push(GroupAction::DriverReset {
                            class,
                            mac: mac.clone(),
                        });
                    }
                }
            }
        }
        actions
    }

    /// One control period.
    pub fn tick(&mut self) -> Vec<GroupAction> {
        let mut actions = Vec::new();

        self.counter += 1;
        let at_interval = self.counter >= self.config.correction_interval();

        if self.mode.tick(!self.sensors.is_empty(), self.config.watchdog)
            == ModeStep::RevertedToAuto
        {
            self.config.auto = Some(true);
        }

        self.compute_presence();
        self.opened = is_window_opened(&self.blinds);
        self.compute_environment();
        let faulty = self.untrusted_devices().next().is_some();
        self.error = faulty as i32;

        if at_interval {
            self.push_space_values(&mut actions);
        }

        if self.mode.is_manual() {
            self.push_leds(&mut actions);
        } else if self.presence != self.last_presence {
            if self.presence {
                self.nudge();
            } else {
                self.lighting = Lighting::off();
            }
            self.push_leds(&mut actions);
        } else if at_interval {
            if self.presence {
                self.nudge();
            } else {
                self.lighting = Lighting::off();
            }
            self.push_leds(&mut actions);
        }

        if at_interval {
            self.counter = 0;
        }

        actions.push(GroupAction::PersistStatus);
        actions
    }

    pub fn status(&self, now: DateTime<Utc>) -> GroupStatus {
        let config = &self.config;
        GroupStatus {
            group: config.group,
            friendly_name: config.friendly_name.clone().unwrap_or_default(),
            auto: self.mode.mode().is_auto(),
            time_to_auto: self.mode.time_to_auto(),
            sensor_rule: config.sensor_rule(),
            error: self.error,
            presence: self.presence,
            windows_opened: self.opened,
            time_to_leave: self.presence_timeout,
            correction_interval: config.correction_interval(),
            setpoint_leds: self.lighting.setpoint,
            first_day_setpoint_leds: self.lighting.first_day,
            setpoint_blinds: self.pending_blind,
            setpoint_slat_blinds: self.pending_slat,
            setpoint_temp_offset: self.pending_shift,
            slope_start_auto: config.slope_start_auto.unwrap_or(0),
            slope_stop_auto: config.slope_stop_auto.unwrap_or(0),
            slope_start_manual: config.slope_start_manual.unwrap_or(0),
            slope_stop_manual: config.slope_stop_manual.unwrap_or(0),
            brightness: self.env.brightness,
            ceiling_temperature: self.env.ceiling_temperature,
            ceiling_humidity: self.env.ceiling_humidity,
            temperature: self.env.temperature,
            hygrometry: self.env.hygrometry,
            co2: self.env.co2,
            cov: self.env.cov,
            hvacs_setpoint_cool_occupied: self.hvac.cool_occupied,
            hvacs_setpoint_heat_occupied: self.hvac.heat_occupied,
            hvacs_setpoint_cool_inoccupied: self.hvac.cool_inoccupied,
            hvacs_setpoint_heat_inoccupied: self.hvac.heat_inoccupied,
            hvacs_setpoint_cool_standby: self.hvac.cool_standby,
            hvacs_setpoint_heat_standby: self.hvac.heat_standby,
            hvacs_target_mode: config.hvacs_target_mode,
            hvacs_heat_cool: config.hvacs_heat_cool,
            leds: members(&config.leds).to_vec(),
            blinds: self.blinds.ids().map(str::to_string).collect(),
            sensors: self.sensors.ids().map(str::to_string).collect(),
            hvacs: self.hvacs.ids().map(str::to_string).collect(),
            nanosenses: self.nanosenses.ids().map(str::to_string).collect(),
            first_day: self.first_day.iter().cloned().collect(),
            untrusted_devices: self.untrusted_devices().map(str::to_string).collect(),
            rule_brightness: config.rule_brightness,
            rule_presence: config.rule_presence,
            first_day_offset: config.first_day_offset,
            watchdog: config.watchdog.unwrap_or(0),
            updated_at: now,
        }
    }

    fn untrusted_devices(&self) -> impl Iterator<Item = &str> {
        self.sensors
            .untrusted()
            .chain(self.blinds.untrusted())
            .chain(self.hvacs.untrusted())
            .chain(self.nanosenses.untrusted())
    }

    fn compute_presence(&mut self) {
        self.last_presence = self.presence;

        if self.sensors.is_empty() {
            self.presence = true;
            return;
        }

        let detected = is_presence_detected(&self.sensors);
        match self.config.rule_presence.filter(|rule| *rule > 0) {
            Some(rule) if detected => {
                self.presence = true;
                self.presence_timeout = rule;
            }
            Some(rule) => {
                if self.presence_timeout <= 0 {
                    self.presence_timeout = rule;
                } else {
                    self.presence_timeout -= 1;
                    if self.presence_timeout == 0 {
                        self.presence = false;
                    }
                }
            }
            None => self.presence = detected,
        }
    }

    fn compute_environment(&mut self) {
        let rule = self.config.sensor_rule();
        let env = &mut self.env;

        let update = |slot: &mut i32, value: Option<i32>| {
            if let Some(value) = value {
                *slot = value;
            }
        };

        update(
            &mut env.brightness,
            aggregate(&self.sensors, rule, Seed::Divided, |s| s.brightness),
        );
        update(
            &mut env.ceiling_temperature,
            aggregate(&self.sensors, rule, Seed::RawOnMin, |s| s.temperature),
        );
        update(
            &mut env.ceiling_humidity,
            aggregate(&self.sensors, rule, Seed::RawOnMin, |s| s.humidity),
        );
        update(
            &mut env.temperature,
            aggregate(&self.nanosenses, rule, Seed::RawOnMin, |n| n.temperature),
        );
        update(
            &mut env.hygrometry,
            aggregate(&self.nanosenses, rule, Seed::RawOnMin, |n| n.hygrometry),
        );
        update(
            &mut env.co2,
            aggregate(&self.nanosenses, rule, Seed::Divided, |n| n.co2),
        );
        update(
            &mut env.cov,
            aggregate(&self.nanosenses, rule, Seed::Divided, |n| n.cov),
        );

        let hvac = &mut self.hvac;
        let hvacs = &self.hvacs;
        let setpoint = |field: fn(&HvacEvent) -> i32| aggregate(hvacs, rule, Seed::Divided, field);
        update(&mut hvac.cool_occupied, setpoint(|h| h.setpoint_cool_occupied));
        update(&mut hvac.heat_occupied, setpoint(|h| h.setpoint_heat_occupied));
        update(
            &mut hvac.cool_inoccupied,
            setpoint(|h| h.setpoint_cool_inoccupied),
        );
        update(
            &mut hvac.heat_inoccupied,
            setpoint(|h| h.setpoint_heat_inoccupied),
        );
        update(&mut hvac.cool_standby, setpoint(|h| h.setpoint_cool_standby));
        update(&mut hvac.heat_standby, setpoint(|h| h.setpoint_heat_standby));
    }

    fn nudge(&mut self) {
        self.lighting.nudge(
            self.env.brightness,
            self.config.rule_brightness,
            self.config.first_day_offset,
            DEFAULT_SCALE,
        );
    }

    fn space_values(&self) -> SpaceValues {
        let (temperature, hygrometry) = if self.nanosenses.is_empty() {
            (self.env.ceiling_temperature, self.env.ceiling_humidity)
        } else {
            (self.env.temperature, self.env.hygrometry)
        };
        SpaceValues {
            temperature,
            co2: self.env.co2,
            cov: self.env.cov,
            hygrometry,
            window_status: self.opened,
            presence: self.presence,
        }
    }

    fn push_space_values(&self, actions: &mut Vec<GroupAction>) {
        let values = self.space_values();
        for mac in members(&self.config.hvacs) {
            actions.push(GroupAction::HvacSpaceValues {
                mac: mac.clone(),
                values,
            });
        }
    }

    fn push_leds(&self, actions: &mut Vec<GroupAction>) {
        let mode = self.mode.mode();
        let slopes = Slopes::for_mode(&self.config, mode);
        for mac in members(&self.config.leds) {
            let setpoint = if mode.is_auto() && self.first_day.contains(mac) {
                self.lighting.first_day
            } else {
                self.lighting.setpoint
            };
            actions.push(GroupAction::LedSetpoint {
                mac: mac.clone(),
                setpoint: clamp_setpoint(setpoint),
                slopes,
            });
        }
    }
}

fn members(list: &Option<Vec<String>>) -> &[String] {
    list.as_deref().unwrap_or(&[])
}
