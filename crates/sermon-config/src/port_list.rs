//! Differences between two port enumerations

use std::collections::BTreeSet;

/// Ports that appeared or vanished between two enumerations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortListChange {
    /// Present now, absent before (sorted)
    pub added: Vec<String>,
    /// Present before, absent now (sorted)
    pub removed: Vec<String>,
}

impl PortListChange {
    pub fn between<S: AsRef<str>>(old: &[S], new: &[S]) -> Self {
        let old: BTreeSet<&str> = old.iter().map(AsRef::as_ref).collect();
        let new: BTreeSet<&str> = new.iter().map(AsRef::as_ref).collect();
        Self {
            added: new.difference(&old).map(|s| s.to_string()).collect(),
            removed: old.difference(&new).map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
