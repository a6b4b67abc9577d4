//! One scheduled run: read status, pick at most one action, report.

use crate::allocation::build_allocation;
use crate::classifier::classify;
use crate::client::{AllocateRequest, CommentRequest, DebateApi, RefineRequest};
use crate::config::Config;
use crate::error::{ConclaveError, Result};
use crate::notify::Notify;
use crate::selector::{attempt_joins, select_order, JoinOutcome};
use crate::template::{build_comment, build_content};
use crate::ticker::derive_ticker;
use crate::types::{Category, Idea, Phase, Status};
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt;

// ---------------------------------------------------------------------------
// TickOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    ApprovalRequired {
        debate_id: Option<String>,
    },
    Joined {
        debate_id: String,
        attempted: usize,
    },
    NoDebateAvailable {
        candidates: usize,
        attempted: usize,
    },
    Proposed {
        debate_id: String,
        category: Category,
        ticker: String,
    },
    Commented {
        debate_id: String,
        idea_id: String,
        category: Category,
    },
    Allocated {
        debate_id: String,
        entries: usize,
    },
    SkippedUnclassified {
        debate_id: String,
    },
    AllocationInvalid {
        debate_id: String,
        options: usize,
    },
    RemoteError {
        endpoint: String,
        status: u16,
    },
    /// Dry run: what would have been sent.
    Planned {
        action: String,
        debate_id: Option<String>,
    },
    Idle {
        phase: Phase,
    },
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickOutcome::ApprovalRequired { debate_id } => match debate_id {
                Some(id) => write!(f, "approval required for debate {id}"),
                None => f.write_str("approval required"),
            },
            TickOutcome::Joined {
                debate_id,
                attempted,
            } => write!(f, "joined debate {debate_id} after {attempted} attempt(s)"),
            TickOutcome::NoDebateAvailable {
                candidates,
                attempted,
            } => write!(
                f,
                "no debate available ({candidates} listed, {attempted} attempted)"
            ),
            TickOutcome::Proposed {
                debate_id,
                category,
                ticker,
            } => write!(f, "proposed {ticker} ({category}) in debate {debate_id}"),
            TickOutcome::Commented {
                debate_id,
                idea_id,
                category,
            } => write!(f, "commented on idea {idea_id} ({category}) in debate {debate_id}"),
            TickOutcome::Allocated { debate_id, entries } => {
                write!(f, "allocated across {entries} ideas in debate {debate_id}")
            }
            TickOutcome::SkippedUnclassified { debate_id } => {
                write!(f, "skipped debate {debate_id}: topic not recognized")
            }
            TickOutcome::AllocationInvalid { debate_id, options } => write!(
                f,
                "no valid allocation for debate {debate_id} from {options} idea(s)"
            ),
            TickOutcome::RemoteError { endpoint, status } => {
                write!(f, "remote error {status} on {endpoint}")
            }
            TickOutcome::Planned { action, debate_id } => match debate_id {
                Some(id) => write!(f, "dry run: would {action} in debate {id}"),
                None => write!(f, "dry run: would {action}"),
            },
            TickOutcome::Idle { phase } => write!(f, "nothing to do (phase {phase})"),
        }
    }
}

// ---------------------------------------------------------------------------
// run_tick
// ---------------------------------------------------------------------------

/// Run one tick against `api`, reporting to `notifier`.
///
/// Remote client errors and unreadable replies are reported to the operator
/// and end the tick normally as [`TickOutcome::RemoteError`]. Transient failures that
/// survive retrying are returned as errors.
pub fn run_tick(config: &Config, api: &dyn DebateApi, notifier: &dyn Notify) -> Result<TickOutcome> {
    match decide_and_act(config, api, notifier) {
        Err(ConclaveError::Api {
            endpoint,
            status,
            body,
        }) if status < 500 => {
            tracing::warn!(%endpoint, status, "remote rejected request");
            notifier.notify(&format!("{endpoint} failed with {status}: {body}"));
            Ok(TickOutcome::RemoteError { endpoint, status })
        }
        Err(ConclaveError::UnexpectedBody {
            endpoint,
            status,
            body,
        }) => {
            tracing::warn!(%endpoint, status, "remote sent an unreadable body");
            notifier.notify(&format!("{endpoint} returned an unreadable body ({status}): {body}"));
            Ok(TickOutcome::RemoteError { endpoint, status })
        }
        other => other,
    }
}

fn decide_and_act(config: &Config, api: &dyn DebateApi, notifier: &dyn Notify) -> Result<TickOutcome> {
    let status = api.status()?;
    let phase = status.phase();
    tracing::info!(%phase, debate = ?status.debate_id, "status fetched");

    if status.awaiting_approval {
        let outcome = TickOutcome::ApprovalRequired {
            debate_id: status.debate_id.clone(),
        };
        notifier.notify(&outcome.to_string());
        return Ok(outcome);
    }

    let debate_id = match status.debate_id.as_deref() {
        Some(id) if !phase.is_terminal() => id,
        _ => return join_debate(config, api, notifier),
    };

    let outcome = match phase {
        Phase::Propose if !status.has_proposal => propose(config, api, &status, debate_id)?,
        Phase::Debate if !status.has_commented => comment(config, api, &status, debate_id)?,
        Phase::Allocation if !status.has_allocated => {
            allocate(config, api, notifier, &status, debate_id)?
        }
        _ => TickOutcome::Idle { phase },
    };

    if config.notify.on_success && is_action(&outcome) {
        notifier.notify(&outcome.to_string());
    }
    Ok(outcome)
}

fn is_action(outcome: &TickOutcome) -> bool {
    matches!(
        outcome,
        TickOutcome::Proposed { .. } | TickOutcome::Commented { .. } | TickOutcome::Allocated { .. }
    )
}

fn join_debate(config: &Config, api: &dyn DebateApi, notifier: &dyn Notify) -> Result<TickOutcome> {
    let debates = api.list_debates()?;
    let ordered = select_order(&debates, &config.rank_policy);
    tracing::info!(listed = debates.len(), eligible = ordered.len(), "debates ranked");

    if config.dry_run {
        return Ok(TickOutcome::Planned {
            action: "join".into(),
            debate_id: ordered.first().and_then(|d| d.id.clone()),
        });
    }

    let outcome = match attempt_joins(&ordered, config.max_join_attempts, |id| api.join(id))? {
        JoinOutcome::Joined {
            debate_id,
            attempted,
        } => TickOutcome::Joined {
            debate_id,
            attempted,
        },
        JoinOutcome::NoneAvailable { attempted } => TickOutcome::NoDebateAvailable {
            candidates: debates.len(),
            attempted,
        },
    };
    if config.notify.on_success && matches!(outcome, TickOutcome::Joined { .. }) {
        notifier.notify(&outcome.to_string());
    }
    Ok(outcome)
}

fn propose(
    config: &Config,
    api: &dyn DebateApi,
    status: &Status,
    debate_id: &str,
) -> Result<TickOutcome> {
    let text = status.brief_text();
    let category = classify(&text);
    let Some(body) = build_content(&text, category, config.max_content_len) else {
        tracing::info!(debate = debate_id, "brief not classified, skipping proposal");
        return Ok(TickOutcome::SkippedUnclassified {
            debate_id: debate_id.to_string(),
        });
    };
    let ticker = derive_ticker(&text, debate_id);

    if config.dry_run {
        return Ok(planned("propose", debate_id));
    }
    api.refine(&RefineRequest {
        debate_id,
        ticker: &ticker,
        body: &body,
    })?;
    Ok(TickOutcome::Proposed {
        debate_id: debate_id.to_string(),
        category,
        ticker,
    })
}

fn comment(
    config: &Config,
    api: &dyn DebateApi,
    status: &Status,
    debate_id: &str,
) -> Result<TickOutcome> {
    let own = self_idea(config, status);
    let Some(target) = most_active_other(&status.ideas, own) else {
        return Ok(TickOutcome::Idle {
            phase: Phase::Debate,
        });
    };

    let mut category = classify(&target.text());
    if !category.is_known() {
        category = classify(&status.brief_text());
    }
    let label = target.title.as_deref().unwrap_or(&target.id);
    let Some(body) = build_comment(category, label, config.max_content_len) else {
        return Ok(TickOutcome::SkippedUnclassified {
            debate_id: debate_id.to_string(),
        });
    };

    if config.dry_run {
        return Ok(planned("comment", debate_id));
    }
    api.comment(&CommentRequest {
        debate_id,
        idea_id: &target.id,
        body: &body,
    })?;
    Ok(TickOutcome::Commented {
        debate_id: debate_id.to_string(),
        idea_id: target.id.clone(),
        category,
    })
}

fn allocate(
    config: &Config,
    api: &dyn DebateApi,
    notifier: &dyn Notify,
    status: &Status,
    debate_id: &str,
) -> Result<TickOutcome> {
    let own = self_idea(config, status);
    let Some(allocation) = build_allocation(&status.ideas, own, config.self_percent as i64) else {
        let outcome = TickOutcome::AllocationInvalid {
            debate_id: debate_id.to_string(),
            options: status.ideas.len(),
        };
        notifier.notify(&outcome.to_string());
        return Ok(outcome);
    };

    if config.dry_run {
        return Ok(planned("allocate", debate_id));
    }
    api.allocate(&AllocateRequest {
        debate_id,
        allocations: &allocation.allocations,
    })?;
    Ok(TickOutcome::Allocated {
        debate_id: debate_id.to_string(),
        entries: allocation.len(),
    })
}

/// Our own idea: as reported by the API, else as configured.
fn self_idea<'a>(config: &'a Config, status: &'a Status) -> Option<&'a str> {
    status
        .self_idea_id
        .as_deref()
        .or(config.self_id.as_deref())
}

fn most_active_other<'a>(ideas: &'a [Idea], own: Option<&str>) -> Option<&'a Idea> {
    ideas
        .iter()
        .filter(|i| !i.id.is_empty() && Some(i.id.as_str()) != own)
        .min_by_key(|i| Reverse(i.activity()))
}

fn planned(action: &str, debate_id: &str) -> TickOutcome {
    TickOutcome::Planned {
        action: action.to_string(),
        debate_id: Some(debate_id.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
