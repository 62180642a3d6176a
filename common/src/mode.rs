use crate::types::AutoMode;

/// Auto/manual decision and the watchdog countdown back to auto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeController {
    mode: AutoMode,
    time_to_auto: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStep {
    Unchanged,
    RevertedToAuto,
}

impl ModeController {
    pub fn new(mode: AutoMode) -> Self {
        Self {
            mode,
            time_to_auto: 0,
        }
    }

    pub fn mode(&self) -> AutoMode {
        self.mode
    }

    pub fn is_manual(&self) -> bool {
        self.mode.is_manual()
    }

    pub fn time_to_auto(&self) -> i32 {
        self.time_to_auto
    }

    /// Applies an explicit mode. Returns whether the effective mode changed.
    pub fn set_mode(&mut self, mode: AutoMode) -> bool {
        let changed = self.mode.is_manual() != mode.is_manual();
        self.mode = mode;
        changed
    }

    /// Arms the countdown for a manual override.
    pub fn arm(&mut self, watchdog: Option<i32>) {
        self.time_to_auto = watchdog.unwrap_or(0).max(0);
    }

    /// One tick of the manual countdown.
    ///
    /// Without sensors a manual group stays manual for good. With sensors and
    /// a watchdog rule the countdown decrements and flips the group back to
    /// auto when it reaches zero.
    pub fn tick(&mut self, has_sensors: bool, watchdog: Option<i32>) -> ModeStep {
        if !self.is_manual() {
            return ModeStep::Unchanged;
        }
        if !has_sensors {
            self.mode = AutoMode::Manual;
            return ModeStep::Unchanged;
        }
        if watchdog.is_none() {
            return ModeStep::Unchanged;
        }

        self.time_to_auto = (self.time_to_auto - 1).max(0);
        if self.time_to_auto == 0 {
            self.mode = AutoMode::Auto;
            return ModeStep::RevertedToAuto;
        }
        ModeStep::Unchanged
    }

    /// Caps an in-flight countdown after the watchdog rule was lowered.
    pub fn clamp(&mut self, watchdog: i32) {
        if self.time_to_auto > watchdog {
            self.time_to_auto = watchdog.max(0);
        }
    }

    pub fn restore(&mut self, mode: AutoMode, time_to_auto: i32) {
        self.mode = mode;
        self.time_to_auto = time_to_auto.max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchdog_reverts_after_configured_ticks() {
        let mut mode = ModeController::new(AutoMode::Manual);
        mode.arm(Some(3));

        assert_eq!(mode.tick(true, Some(3)), ModeStep::Unchanged);
        assert_eq!(mode.time_to_auto(), 2);
        assert_eq!(mode.tick(true, Some(3)), ModeStep::Unchanged);
        assert_eq!(mode.tick(true, Some(3)), ModeStep::RevertedToAuto);
        assert_eq!(mode.mode(), AutoMode::Auto);
        assert_eq!(mode.time_to_auto(), 0);
    }

    #[test]
    fn no_sensor_pins_manual() {
        let mut mode = ModeController::new(AutoMode::Manual);
        mode.arm(Some(1));
        for _ in 0..100 {
            assert_eq!(mode.tick(false, Some(1)), ModeStep::Unchanged);
        }
        assert!(mode.is_manual());
    }

    #[test]
    fn no_watchdog_rule_never_reverts() {
        let mut mode = ModeController::new(AutoMode::Manual);
        mode.arm(None);
        for _ in 0..10 {
            mode.tick(true, None);
        }
        assert!(mode.is_manual());
    }

    #[test]
    fn auto_mode_ignores_countdown() {
        let mut mode = ModeController::new(AutoMode::Unset);
        assert_eq!(mode.tick(true, Some(1)), ModeStep::Unchanged);
        assert!(!mode.is_manual());
    }

    #[test]
    fn clamp_only_lowers_the_countdown() {
        let mut mode = ModeController::new(AutoMode::Manual);
        mode.arm(Some(60));
        mode.clamp(90);
        assert_eq!(mode.time_to_auto(), 60);
        mode.clamp(10);
        assert_eq!(mode.time_to_auto(), 10);
    }

    #[test]
    fn set_mode_reports_effective_changes() {
        let mut mode = ModeController::new(AutoMode::Unset);
        assert!(!mode.set_mode(AutoMode::Auto));
        assert!(mode.set_mode(AutoMode::Manual));
        assert!(!mode.set_mode(AutoMode::Manual));
    }
}
