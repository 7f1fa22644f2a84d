use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    dom::NodeId,
    domain::{Label, UnitState},
};

#[derive(Debug, Clone)]
pub struct UnitRecord {
    pub state: UnitState,
    pub label: Option<Label>,
    /// Control element currently rendered for the unit (overlay, toolbar or
    /// prompt). At most one exists at a time.
    pub control: Option<NodeId>,
    pub first_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerCounts {
    pub pending: usize,
    pub empty: usize,
    pub classified: usize,
    pub hidden: usize,
    pub visible: usize,
    pub corrected: usize,
    pub evicted: usize,
}

#[derive(Debug, Default)]
struct Entries {
    live: HashMap<NodeId, UnitRecord>,
    /// Ids whose record was dropped. A detached node can be attached again,
    /// so these are never claimable.
    evicted: HashSet<NodeId>,
}

/// Process-scoped table of every unit the scanner has seen.
///
/// Entries are created on first sight and normally never removed. Every
/// operation takes the lock for its whole duration and never across an
/// await point.
#[derive(Debug, Default)]
pub struct UnitTracker {
    entries: Mutex<Entries>,
}

impl UnitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `unit` pending. Returns false if it was already tracked or has
    /// been evicted.
    pub fn try_claim(&self, unit: NodeId) -> bool {
        let mut entries = self.entries.lock();
        if entries.live.contains_key(&unit) || entries.evicted.contains(&unit) {
            return false;
        }
        entries.live.insert(
            unit,
            UnitRecord {
                state: UnitState::Pending,
                label: None,
                control: None,
                first_seen: Utc::now(),
            },
        );
        true
    }

    pub fn set_state(&self, unit: NodeId, state: UnitState) {
        if let Some(record) = self.entries.lock().live.get_mut(&unit) {
            record.state = state;
        }
    }

    pub fn update<R>(&self, unit: NodeId, f: impl FnOnce(&mut UnitRecord) -> R) -> Option<R> {
        self.entries.lock().live.get_mut(&unit).map(f)
    }

    pub fn state(&self, unit: NodeId) -> Option<UnitState> {
        self.entries.lock().live.get(&unit).map(|r| r.state.clone())
    }

    #[cfg(test)]
    pub fn record(&self, unit: NodeId) -> Option<UnitRecord> {
        self.entries.lock().live.get(&unit).cloned()
    }

    /// Units with a live record.
    pub fn len(&self) -> usize {
        self.entries.lock().live.len()
    }

    pub fn snapshot(&self) -> Vec<(NodeId, UnitRecord)> {
        let mut entries: Vec<_> = self
            .entries
            .lock()
            .live
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    pub fn counts(&self) -> TrackerCounts {
        let entries = self.entries.lock();
        let mut counts = TrackerCounts {
            evicted: entries.evicted.len(),
            ..TrackerCounts::default()
        };
        for record in entries.live.values() {
            match record.state {
                UnitState::Pending => counts.pending += 1,
                UnitState::Empty => counts.empty += 1,
                UnitState::Classified(_) => counts.classified += 1,
                UnitState::Hidden(_) => counts.hidden += 1,
                UnitState::Visible => counts.visible += 1,
                UnitState::Corrected(_) => counts.corrected += 1,
            }
        }
        counts
    }

    /// Drops the records of units `keep` rejects, leaving a tombstone so the
    /// id is never claimed again. Returns how many went.
    pub fn evict(&self, mut keep: impl FnMut(NodeId) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let Entries { live, evicted } = &mut *entries;
        let before = live.len();
        live.retain(|id, _| {
            let kept = keep(*id);
            if !kept {
                evicted.insert(*id);
            }
            kept
        });
        before - live.len()
    }
}
