use crate::types::Idea;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Per-option ceiling the remote service enforces.
pub const MAX_PERCENT: u32 = 60;
pub const MIN_ENTRIES: usize = 2;
/// Upper bound on how many non-self options share the remainder.
pub const MAX_SHARED: usize = 4;
const TOTAL: u32 = 100;

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub idea_id: String,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub allocations: Vec<AllocationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationViolation {
    #[error("allocation needs at least 2 entries, got {0}")]
    TooFewEntries(usize),
    #[error("entry '{0}' has a zero percentage")]
    ZeroEntry(String),
    #[error("entry '{id}' has {percent}%, above the 60% cap")]
    AboveCap { id: String, percent: u32 },
    #[error("percentages sum to {0}, expected 100")]
    BadSum(u32),
    #[error("idea '{0}' appears more than once")]
    Duplicate(String),
}

impl Allocation {
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.allocations.iter().map(|e| e.percent).sum()
    }

    pub fn percent_for(&self, idea_id: &str) -> Option<u32> {
        self.allocations
            .iter()
            .find(|e| e.idea_id == idea_id)
            .map(|e| e.percent)
    }

    pub fn validate(&self) -> Result<(), AllocationViolation> {
        if self.allocations.len() < MIN_ENTRIES {
            return Err(AllocationViolation::TooFewEntries(self.allocations.len()));
        }
        let mut seen = HashSet::new();
        for entry in &self.allocations {
            if !seen.insert(entry.idea_id.as_str()) {
                return Err(AllocationViolation::Duplicate(entry.idea_id.clone()));
            }
            if entry.percent == 0 {
                return Err(AllocationViolation::ZeroEntry(entry.idea_id.clone()));
            }
            if entry.percent > MAX_PERCENT {
                return Err(AllocationViolation::AboveCap {
                    id: entry.idea_id.clone(),
                    percent: entry.percent,
                });
            }
        }
        let total = self.total();
        if total != TOTAL {
            return Err(AllocationViolation::BadSum(total));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build a percentage allocation over `options`.
///
/// `self_id` names our own idea; it receives `self_percent` (clamped to
/// `0..=60`) when that is positive and is left out otherwise. The remainder
/// is split evenly over the most active of the other ideas, at most
/// [`MAX_SHARED`] of them. Returns `None` when no valid allocation exists.
pub fn build_allocation(
    options: &[Idea],
    self_id: Option<&str>,
    self_percent: i64,
) -> Option<Allocation> {
    let usable = usable_options(options);
    if usable.len() < MIN_ENTRIES {
        tracing::debug!(usable = usable.len(), "not enough options to allocate");
        return None;
    }

    let self_percent = self_percent.clamp(0, MAX_PERCENT as i64) as u32;
    let self_id = self_id.filter(|id| usable.iter().any(|o| o.id == *id));

    let mut entries = Vec::new();
    let mut reserved = 0;
    if let Some(id) = self_id {
        if self_percent > 0 {
            reserved = self_percent;
            entries.push(AllocationEntry {
                idea_id: id.to_string(),
                percent: self_percent,
            });
        }
    }

    let mut others: Vec<&Idea> = usable
        .into_iter()
        .filter(|o| Some(o.id.as_str()) != self_id)
        .collect();
    others.sort_by(|a, b| b.activity().cmp(&a.activity()));
    others.truncate(MAX_SHARED);
    if others.is_empty() {
        return None;
    }

    let remainder = TOTAL - reserved;
    let n = others.len() as u32;
    let base = remainder / n;
    let extra = remainder % n;
    for (i, idea) in others.iter().enumerate() {
        let bump = u32::from((i as u32) < extra);
        entries.push(AllocationEntry {
            idea_id: idea.id.clone(),
            percent: base + bump,
        });
    }

    clamp_to_cap(&mut entries)?;

    let allocation = Allocation {
        allocations: entries,
    };
    match allocation.validate() {
        Ok(()) => Some(allocation),
        Err(violation) => {
            tracing::warn!(%violation, "discarding invalid allocation");
            None
        }
    }
}

/// Options with a non-empty id, first occurrence of each id only.
fn usable_options(options: &[Idea]) -> Vec<&Idea> {
    let mut seen = HashSet::new();
    options
        .iter()
        .filter(|o| !o.id.trim().is_empty())
        .filter(|o| seen.insert(o.id.as_str()))
        .collect()
}

/// Clip entries above the cap and hand the excess to entries with headroom,
/// last entry first. `None` if the excess cannot be placed.
fn clamp_to_cap(entries: &mut [AllocationEntry]) -> Option<()> {
    let mut excess = 0;
    for entry in entries.iter_mut() {
        if entry.percent > MAX_PERCENT {
            excess += entry.percent - MAX_PERCENT;
            entry.percent = MAX_PERCENT;
        }
    }
    for entry in entries.iter_mut().rev() {
        if excess == 0 {
            break;
        }
        let room = MAX_PERCENT - entry.percent;
        let moved = room.min(excess);
        entry.percent += moved;
        excess -= moved;
    }
    (excess == 0).then_some(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
