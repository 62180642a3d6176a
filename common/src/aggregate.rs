use crate::{
    config::SensorRule,
    device_set::DeviceSet,
    events::{BlindEvent, SensorEvent},
};

/// How the reference member seeds the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// `reference / count` whatever the rule.
    Divided,
    /// Like `Divided`, except the raw reference value under `SensorRule::Min`.
    /// Used for temperature and humidity.
    RawOnMin,
}

/// Reduces the trusted members of `set` to one value.
///
/// The first trusted member seeds the result with `value / count`; the other
/// members are folded in with `rule`. Averaging adds `value / count` per
/// member, each quotient truncated on its own, so the result can differ from
/// `sum / count`. Returns `None` when no member is trusted.
pub fn aggregate<T>(
    set: &DeviceSet<T>,
    rule: SensorRule,
    seed: Seed,
    value: impl Fn(&T) -> i32,
) -> Option<i32> {
    let count = set.trusted_count() as i32;
    let mut members = set.trusted();
    let (_, reference) = members.next()?;

    let reference = value(reference);
    let mut result = match (seed, rule) {
        (Seed::RawOnMin, SensorRule::Min) => reference,
        _ => reference / count,
    };

    for (_, member) in members {
        let member = value(member);
        match rule {
            SensorRule::Average => result += member / count,
            SensorRule::Max => result = result.max(member),
            SensorRule::Min => result = result.min(member),
        }
    }

    Some(result)
}

pub fn is_presence_detected(sensors: &DeviceSet<SensorEvent>) -> bool {
    sensors.trusted().any(|(_, sensor)| sensor.presence)
}

pub fn is_window_opened(blinds: &DeviceSet<BlindEvent>) -> bool {
    if blinds.is_empty() {
        return false;
    }
    blinds
        .trusted()
        .any(|(_, blind)| blind.window_status1 || blind.window_status2)
}
