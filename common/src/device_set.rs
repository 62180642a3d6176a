use std::collections::{BTreeMap, BTreeSet};

/// Latest telemetry of every member of one device class in a group, plus the
/// ids currently excluded from aggregation ("untrusted").
///
/// Members are kept in id order so the aggregation reference is stable from
/// one tick to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSet<T> {
    members: BTreeMap<String, T>,
    issues: BTreeSet<String>,
}

impl<T> Default for DeviceSet<T> {
    fn default() -> Self {
        Self {
            members: BTreeMap::new(),
            issues: BTreeSet::new(),
        }
    }
}

impl<T: Default> DeviceSet<T> {
    /// Builds a set where every member starts untrusted until it reports.
    pub fn with_members<'a>(ids: impl IntoIterator<Item = &'a String>) -> Self {
        let mut set = Self::default();
        set.reconcile(ids);
        set
    }

    /// Aligns membership with `ids`: newcomers are added untrusted, members
    /// missing from `ids` are dropped along with their untrusted mark. When
    /// membership changed, every member is untrusted again until it reports.
    /// Returns whether membership changed.
    pub fn reconcile<'a>(&mut self, ids: impl IntoIterator<Item = &'a String>) -> bool {
        let wanted: BTreeSet<&String> = ids.into_iter().collect();
        let before = self.members.len();

        self.members.retain(|id, _| wanted.contains(id));
        self.issues.retain(|id| wanted.contains(id));
        let kept = self.members.len();

        for id in wanted {
            if !self.members.contains_key(id) {
                self.members.insert(id.clone(), T::default());
                self.issues.insert(id.clone());
            }
        }

        let changed = kept != before || self.members.len() != kept;
        if changed {
            self.issues = self.members.keys().cloned().collect();
        }
        changed
    }
}

impl<T> DeviceSet<T> {
    /// Stores a valid report and clears the untrusted mark. Reports from ids
    /// outside the membership are refused.
    pub fn update(&mut self, id: &str, value: T) -> bool {
        match self.members.get_mut(id) {
            Some(slot) => {
                *slot = value;
                self.issues.remove(id);
                true
            }
            None => false,
        }
    }

    pub fn mark_untrusted(&mut self, id: &str) -> bool {
        if self.members.contains_key(id) {
            self.issues.insert(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn trusted(&self) -> impl Iterator<Item = (&str, &T)> {
        self.members
            .iter()
            .filter(|(id, _)| !self.issues.contains(*id))
            .map(|(id, value)| (id.as_str(), value))
    }

    pub fn trusted_count(&self) -> usize {
        self.trusted().count()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn untrusted(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(String::as_str)
    }
}

#[cfg(test)]
impl<T> DeviceSet<T> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    pub fn is_trusted(&self, id: &str) -> bool {
        self.members.contains_key(id) && !self.issues.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.members.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn new_members_start_untrusted() {
        let set: DeviceSet<i32> = DeviceSet::with_members(&ids(&["S1", "S2"]));
        assert_eq!(set.len(), 2);
        assert_eq!(set.trusted_count(), 0);
        assert!(!set.is_trusted("S1"));
    }

    #[test]
    fn valid_report_clears_untrusted_mark() {
        let mut set: DeviceSet<i32> = DeviceSet::with_members(&ids(&["S1"]));
        assert!(set.update("S1", 42));
        assert!(set.is_trusted("S1"));
        assert_eq!(set.get("S1"), Some(&42));

        assert!(set.mark_untrusted("S1"));
        assert!(!set.is_trusted("S1"));
        assert!(set.contains("S1"));
    }

    #[test]
    fn reports_from_non_members_are_refused() {
        let mut set: DeviceSet<i32> = DeviceSet::with_members(&ids(&["S1"]));
        assert!(!set.update("S9", 1));
        assert!(!set.mark_untrusted("S9"));
        assert!(!set.contains("S9"));
        assert_eq!(set.untrusted().collect::<Vec<_>>(), vec!["S1"]);
    }

    #[test]
    fn reconcile_drops_removed_and_adds_newcomers_untrusted() {
        let mut set: DeviceSet<i32> = DeviceSet::with_members(&ids(&["S1", "S3"]));
        set.update("S3", 7);
        set.mark_untrusted("S1");

        let changed = set.reconcile(&ids(&["S2", "S3"]));

        assert!(changed);
        assert!(!set.contains("S1"));
        assert!(!set.untrusted().any(|id| id == "S1"));
        assert!(set.contains("S2"));
        assert!(!set.is_trusted("S2"));
        // Surviving members keep their last report but must report again.
        assert!(!set.is_trusted("S3"));
        assert_eq!(set.get("S3"), Some(&7));
    }

    #[test]
    fn reconcile_with_same_members_is_a_no_op() {
        let mut set: DeviceSet<i32> = DeviceSet::with_members(&ids(&["S1"]));
        set.update("S1", 3);
        assert!(!set.reconcile(&ids(&["S1"])));
        assert!(set.is_trusted("S1"));
    }
}
