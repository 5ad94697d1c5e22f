/// Version counter used to detect edits to materials and uniform sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    version: u64,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self { version: 0 }
    }

    /// Marks as modified, increments version by 1
    pub fn changed(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True if the tracker moved past `version`.
    #[must_use]
    pub fn changed_since(&self, version: u64) -> bool {
        self.version != version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_bumps_version() {
        let mut tracker = ChangeTracker::new();
        let before = tracker.version();
        assert!(!tracker.changed_since(before));
        tracker.changed();
        assert!(tracker.changed_since(before));
    }

    #[test]
    fn version_wraps() {
        let mut tracker = ChangeTracker { version: u64::MAX };
        tracker.changed();
        assert_eq!(tracker.version(), 0);
    }
}
