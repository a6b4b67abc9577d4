use crate::error::{ConclaveError, Result};
use crate::types::Debate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Hard ceiling on join attempts per tick, whatever the configuration says.
pub const MAX_JOIN_ATTEMPTS: usize = 10;

// ---------------------------------------------------------------------------
// RankKey / RankPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankKey {
    /// Earlier lifecycle phases first.
    Phase,
    /// Less occupied debates first.
    OccupancyAsc,
    /// More occupied (more active) debates first.
    OccupancyDesc,
}

impl RankKey {
    pub fn as_str(self) -> &'static str {
        match self {
            RankKey::Phase => "phase",
            RankKey::OccupancyAsc => "occupancy_asc",
            RankKey::OccupancyDesc => "occupancy_desc",
        }
    }

    fn compare(self, a: &Debate, b: &Debate) -> Ordering {
        match self {
            RankKey::Phase => b.phase().priority().cmp(&a.phase().priority()),
            RankKey::OccupancyAsc => a.occupancy.cmp(&b.occupancy),
            RankKey::OccupancyDesc => b.occupancy.cmp(&a.occupancy),
        }
    }
}

impl std::str::FromStr for RankKey {
    type Err = ConclaveError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "phase" => Ok(RankKey::Phase),
            "occupancy_asc" => Ok(RankKey::OccupancyAsc),
            "occupancy_desc" => Ok(RankKey::OccupancyDesc),
            other => Err(ConclaveError::InvalidRankKey(other.to_string())),
        }
    }
}

/// Ordered list of ranking keys; earlier keys dominate, later keys break ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankPolicy {
    pub keys: Vec<RankKey>,
}

impl Default for RankPolicy {
    fn default() -> Self {
        Self {
            keys: vec![RankKey::Phase, RankKey::OccupancyAsc],
        }
    }
}

impl RankPolicy {
    pub fn new(keys: Vec<RankKey>) -> Self {
        Self { keys }
    }

    /// Parse a comma-separated key list such as `phase,occupancy_asc`.
    pub fn parse(list: &str) -> Result<Self> {
        let keys = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<RankKey>>>()?;
        if keys.is_empty() {
            return Err(ConclaveError::InvalidRankKey(list.trim().to_string()));
        }
        Ok(Self { keys })
    }

    pub fn compare(&self, a: &Debate, b: &Debate) -> Ordering {
        self.keys
            .iter()
            .map(|k| k.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for RankPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.keys.iter().map(|k| k.as_str()).collect();
        f.write_str(&keys.join(","))
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

pub fn is_eligible(debate: &Debate) -> bool {
    debate.id.is_some() && !debate.phase().is_terminal() && !debate.is_full()
}

/// Eligible candidates in the order they should be attempted. The sort is
/// stable, so input order settles anything the policy leaves equal.
pub fn select_order(candidates: &[Debate], policy: &RankPolicy) -> Vec<Debate> {
    let mut eligible: Vec<Debate> = candidates.iter().filter(|d| is_eligible(d)).cloned().collect();
    eligible.sort_by(|a, b| policy.compare(a, b));
    eligible
}

// ---------------------------------------------------------------------------
// Join attempts
// ---------------------------------------------------------------------------

/// How the remote service answered a single join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinResponse {
    Joined,
    /// Expected refusal (full, not accepting). Try the next candidate.
    SoftRejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined { debate_id: String, attempted: usize },
    NoneAvailable { attempted: usize },
}

/// Attempt `join` on each ranked candidate until one accepts.
///
/// Soft rejections move on to the next candidate; any error stops the walk
/// and is returned as-is. At most `max_attempts` (capped at
/// [`MAX_JOIN_ATTEMPTS`]) calls are made.
pub fn attempt_joins<F>(ordered: &[Debate], max_attempts: usize, mut join: F) -> Result<JoinOutcome>
where
    F: FnMut(&str) -> Result<JoinResponse>,
{
    let cap = max_attempts.min(MAX_JOIN_ATTEMPTS);
    let mut attempted = 0;

    for debate in ordered.iter().take(cap) {
        let Some(id) = debate.id.as_deref() else {
            continue;
        };
        attempted += 1;
        match join(id)? {
            JoinResponse::Joined => {
                tracing::info!(debate = id, attempted, "joined debate");
                return Ok(JoinOutcome::Joined {
                    debate_id: id.to_string(),
                    attempted,
                });
            }
            JoinResponse::SoftRejected(reason) => {
                tracing::debug!(debate = id, %reason, "join soft-rejected, trying next");
            }
        }
    }

    Ok(JoinOutcome::NoneAvailable { attempted })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn debate(id: &str, phase: &str, occupancy: u32, capacity: Option<u32>) -> Debate {
        Debate {
            id: Some(id.to_string()),
            phase: Some(phase.to_string()),
            occupancy,
            capacity,
            ..Default::default()
        }
    }

    fn ids(debates: &[Debate]) -> Vec<&str> {
        debates.iter().filter_map(|d| d.id.as_deref()).collect()
    }

    #[test]
    fn drops_terminal_phase() {
        let candidates = vec![
            debate("1", "ended", 0, None),
            debate("2", "debate", 0, Some(5)),
        ];
        let order = select_order(&candidates, &RankPolicy::default());
        assert_eq!(ids(&order), vec!["2"]);
    }

    #[test]
    fn drops_full_and_anonymous() {
        let candidates = vec![
            debate("full", "propose", 5, Some(5)),
            Debate {
                id: None,
                phase: Some("propose".into()),
                ..Default::default()
            },
            debate("open", "propose", 4, Some(5)),
        ];
        let order = select_order(&candidates, &RankPolicy::default());
        assert_eq!(ids(&order), vec!["open"]);
    }

    #[test]
    fn phase_then_occupancy_ascending() {
        let candidates = vec![
            debate("alloc", "allocation", 0, None),
            debate("busy", "propose", 7, Some(10)),
            debate("quiet", "propose", 1, Some(10)),
            debate("mid", "debate", 0, None),
            debate("odd", "mystery", 0, None),
        ];
        let order = select_order(&candidates, &RankPolicy::default());
        assert_eq!(ids(&order), vec!["quiet", "busy", "mid", "alloc", "odd"]);
    }

    #[test]
    fn occupancy_descending_policy() {
        let policy = RankPolicy::parse("phase,occupancy_desc").unwrap();
        let candidates = vec![
            debate("quiet", "propose", 1, None),
            debate("busy", "propose", 7, None),
        ];
        let order = select_order(&candidates, &policy);
        assert_eq!(ids(&order), vec!["busy", "quiet"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let candidates = vec![
            debate("b", "debate", 2, None),
            debate("a", "debate", 2, None),
        ];
        let order = select_order(&candidates, &RankPolicy::default());
        assert_eq!(ids(&order), vec!["b", "a"]);
    }

    #[test]
    fn policy_parse_and_display() {
        let policy = RankPolicy::parse("occupancy_desc, phase").unwrap();
        assert_eq!(policy.keys, vec![RankKey::OccupancyDesc, RankKey::Phase]);
        assert_eq!(policy.to_string(), "occupancy_desc,phase");
        assert!(RankPolicy::parse("phase,popularity").is_err());
    }

    #[test]
    fn empty_policy_is_rejected() {
        for list in ["", "  ", ",", " , "] {
            assert!(
                matches!(RankPolicy::parse(list), Err(ConclaveError::InvalidRankKey(_))),
                "{list:?}"
            );
        }
    }

    #[test]
    fn join_stops_at_first_success() {
        let ordered = vec![
            debate("1", "propose", 0, None),
            debate("2", "propose", 0, None),
            debate("3", "propose", 0, None),
        ];
        let mut calls = Vec::new();
        let outcome = attempt_joins(&ordered, 10, |id| {
            calls.push(id.to_string());
            Ok(match id {
                "1" => JoinResponse::SoftRejected("full".into()),
                _ => JoinResponse::Joined,
            })
        })
        .unwrap();
        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                debate_id: "2".into(),
                attempted: 2
            }
        );
        assert_eq!(calls, vec!["1", "2"]);
    }

    #[test]
    fn join_exhaustion_is_not_an_error() {
        let ordered = vec![debate("1", "propose", 0, None), debate("2", "debate", 0, None)];
        let outcome =
            attempt_joins(&ordered, 10, |_| Ok(JoinResponse::SoftRejected("full".into()))).unwrap();
        assert_eq!(outcome, JoinOutcome::NoneAvailable { attempted: 2 });
    }

    #[test]
    fn join_hard_error_propagates() {
        let ordered = vec![debate("1", "propose", 0, None), debate("2", "debate", 0, None)];
        let mut calls = 0;
        let err = attempt_joins(&ordered, 10, |_| {
            calls += 1;
            Err(ConclaveError::Api {
                endpoint: "/join/1".into(),
                status: 401,
                body: "unauthorized".into(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, ConclaveError::Api { status: 401, .. }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn join_attempts_are_capped() {
        let ordered: Vec<Debate> = (0..20)
            .map(|i| debate(&i.to_string(), "propose", 0, None))
            .collect();
        let mut calls = 0;
        let outcome = attempt_joins(&ordered, 50, |_| {
            calls += 1;
            Ok(JoinResponse::SoftRejected("full".into()))
        })
        .unwrap();
        assert_eq!(calls, MAX_JOIN_ATTEMPTS);
        assert_eq!(
            outcome,
            JoinOutcome::NoneAvailable {
                attempted: MAX_JOIN_ATTEMPTS
            }
        );
    }

    fn arb_debate() -> impl Strategy<Value = Debate> {
        (
            proptest::option::of("[a-z0-9]{1,4}"),
            proptest::option::of(prop_oneof![
                Just("propose".to_string()),
                Just("debate".to_string()),
                Just("allocation".to_string()),
                Just("ended".to_string()),
                Just("results".to_string()),
                Just("closed".to_string()),
                "[a-z]{1,8}",
            ]),
            0u32..20,
            proptest::option::of(0u32..20),
        )
            .prop_map(|(id, phase, occupancy, capacity)| Debate {
                id,
                phase,
                occupancy,
                capacity,
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn selection_never_returns_ineligible(candidates in proptest::collection::vec(arb_debate(), 0..16)) {
            let order = select_order(&candidates, &RankPolicy::default());
            for d in &order {
                prop_assert!(d.id.is_some());
                prop_assert!(!d.phase().is_terminal());
                if let Some(cap) = d.capacity {
                    prop_assert!(cap == 0 || d.occupancy < cap);
                }
            }
        }

        #[test]
        fn selection_is_deterministic(candidates in proptest::collection::vec(arb_debate(), 0..16)) {
            let policy = RankPolicy::default();
            prop_assert_eq!(select_order(&candidates, &policy), select_order(&candidates, &policy));
        }
    }
}
