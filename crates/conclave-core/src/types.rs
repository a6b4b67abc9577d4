use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Lifecycle phase of a debate, parsed from the open set of labels the API
/// reports. Parsing never fails; labels we do not know become `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Propose,
    Debate,
    Allocation,
    Ended,
    Results,
    Closed,
    Finished,
    Archived,
    Unknown,
}

impl Phase {
    pub fn from_label(label: &str) -> Phase {
        match label.trim().to_ascii_lowercase().as_str() {
            "propose" | "proposal" | "proposing" | "open" | "waiting" | "lobby" => Phase::Propose,
            "debate" | "debating" | "discussion" => Phase::Debate,
            "allocation" | "allocate" | "allocating" | "voting" => Phase::Allocation,
            "ended" => Phase::Ended,
            "results" => Phase::Results,
            "closed" => Phase::Closed,
            "finished" => Phase::Finished,
            "archived" => Phase::Archived,
            _ => Phase::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Ended | Phase::Results | Phase::Closed | Phase::Finished | Phase::Archived
        )
    }

    /// Earlier lifecycle phases are more likely to still accept an entrant.
    pub fn priority(self) -> u8 {
        match self {
            Phase::Propose => 3,
            Phase::Debate => 2,
            Phase::Allocation => 1,
            _ => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Propose => "propose",
            Phase::Debate => "debate",
            Phase::Allocation => "allocation",
            Phase::Ended => "ended",
            Phase::Results => "results",
            Phase::Closed => "closed",
            Phase::Finished => "finished",
            Phase::Archived => "archived",
            Phase::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Oracle,
    Identity,
    Governance,
    Markets,
    Interoperability,
    Privacy,
    Unknown,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::Oracle,
            Category::Identity,
            Category::Governance,
            Category::Markets,
            Category::Interoperability,
            Category::Privacy,
            Category::Unknown,
        ]
    }

    pub fn is_known(self) -> bool {
        self != Category::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Oracle => "oracle",
            Category::Identity => "identity",
            Category::Governance => "governance",
            Category::Markets => "markets",
            Category::Interoperability => "interoperability",
            Category::Privacy => "privacy",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = crate::error::ConclaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| crate::error::ConclaveError::InvalidCategory(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Debate
// ---------------------------------------------------------------------------

/// A joinable debate as reported by `GET /list`. The API is loose about
/// field names and types, so every field is optional or defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDebate")]
pub struct Debate {
    pub id: Option<String>,
    pub phase: Option<String>,
    pub occupancy: u32,
    pub capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brief: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Every name a debate field has been seen under. When several are present
/// the first one that decodes wins, in declaration order.
#[derive(Deserialize)]
struct RawDebate {
    id: Option<Value>,
    phase: Option<Value>,
    state: Option<Value>,
    status: Option<Value>,
    occupancy: Option<Value>,
    participant_count: Option<Value>,
    agent_count: Option<Value>,
    participants: Option<Value>,
    capacity: Option<Value>,
    max_participants: Option<Value>,
    max_agents: Option<Value>,
    title: Option<Value>,
    brief: Option<Value>,
    description: Option<Value>,
}

impl From<RawDebate> for Debate {
    fn from(raw: RawDebate) -> Self {
        Self {
            id: first_of([raw.id], id_from_value),
            phase: first_of([raw.phase, raw.state, raw.status], text_from_value),
            occupancy: first_of(
                [
                    raw.occupancy,
                    raw.participant_count,
                    raw.agent_count,
                    raw.participants,
                ],
                count_from_value,
            )
            .unwrap_or(0),
            capacity: first_of(
                [raw.capacity, raw.max_participants, raw.max_agents],
                count_from_value,
            ),
            title: first_of([raw.title], text_from_value),
            brief: first_of([raw.brief], text_from_value),
            description: first_of([raw.description], text_from_value),
        }
    }
}

impl Debate {
    pub fn phase(&self) -> Phase {
        self.phase
            .as_deref()
            .map(Phase::from_label)
            .unwrap_or(Phase::Unknown)
    }

    pub fn is_full(&self) -> bool {
        matches!(self.capacity, Some(cap) if cap > 0 && self.occupancy >= cap)
    }

    /// Title, brief and description joined for classification.
    pub fn text(&self) -> String {
        [&self.title, &self.brief, &self.description]
            .iter()
            .filter_map(|f| f.as_deref())
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Idea
// ---------------------------------------------------------------------------

/// A proposal inside a debate; the options an allocation distributes over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawIdea")]
pub struct Idea {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub comment_count: u32,
    pub refine_count: u32,
}

#[derive(Deserialize)]
struct RawIdea {
    id: Option<Value>,
    author: Option<Value>,
    ticker: Option<Value>,
    title: Option<Value>,
    body: Option<Value>,
    comment_count: Option<Value>,
    comments: Option<Value>,
    refine_count: Option<Value>,
    refines: Option<Value>,
}

impl From<RawIdea> for Idea {
    fn from(raw: RawIdea) -> Self {
        Self {
            id: first_of([raw.id], id_from_value).unwrap_or_default(),
            author: first_of([raw.author], id_from_value),
            ticker: first_of([raw.ticker], text_from_value),
            title: first_of([raw.title], text_from_value),
            body: first_of([raw.body], text_from_value),
            comment_count: first_of([raw.comment_count, raw.comments], count_from_value)
                .unwrap_or(0),
            refine_count: first_of([raw.refine_count, raw.refines], count_from_value)
                .unwrap_or(0),
        }
    }
}

impl Idea {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn activity(&self) -> u32 {
        self.comment_count.saturating_add(self.refine_count)
    }

    pub fn text(&self) -> String {
        [&self.title, &self.body]
            .iter()
            .filter_map(|f| f.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// The agent's own participation state from `GET /status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawStatus")]
pub struct Status {
    pub phase: Option<String>,
    pub debate_id: Option<String>,
    pub awaiting_approval: bool,
    pub has_proposal: bool,
    pub has_commented: bool,
    pub has_allocated: bool,
    pub self_idea_id: Option<String>,
    pub title: Option<String>,
    pub brief: Option<String>,
    pub ideas: Vec<Idea>,
}

#[derive(Deserialize)]
struct RawStatus {
    phase: Option<Value>,
    state: Option<Value>,
    status: Option<Value>,
    debate_id: Option<Value>,
    debate: Option<Value>,
    awaiting_approval: Option<Value>,
    has_proposal: Option<Value>,
    has_commented: Option<Value>,
    has_allocated: Option<Value>,
    self_idea_id: Option<Value>,
    title: Option<Value>,
    brief: Option<Value>,
    ideas: Option<Value>,
}

impl From<RawStatus> for Status {
    fn from(raw: RawStatus) -> Self {
        Self {
            phase: first_of([raw.phase, raw.state, raw.status], text_from_value),
            debate_id: first_of([raw.debate_id, raw.debate], id_from_value),
            awaiting_approval: flag(raw.awaiting_approval),
            has_proposal: flag(raw.has_proposal),
            has_commented: flag(raw.has_commented),
            has_allocated: flag(raw.has_allocated),
            self_idea_id: first_of([raw.self_idea_id], id_from_value),
            title: first_of([raw.title], text_from_value),
            brief: first_of([raw.brief], text_from_value),
            ideas: match raw.ideas {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

impl Status {
    pub fn phase(&self) -> Phase {
        self.phase
            .as_deref()
            .map(Phase::from_label)
            .unwrap_or(Phase::Unknown)
    }

    pub fn brief_text(&self) -> String {
        [&self.title, &self.brief]
            .iter()
            .filter_map(|f| f.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Lenient field decoders
// ---------------------------------------------------------------------------

fn first_of<T, const N: usize>(
    candidates: [Option<Value>; N],
    decode: fn(Value) -> Option<T>,
) -> Option<T> {
    candidates.into_iter().flatten().find_map(decode)
}

/// Ids arrive as strings, numbers, or an object carrying an `id`.
fn id_from_value(v: Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(mut map) => map.remove("id").and_then(id_from_value),
        _ => None,
    }
}

fn text_from_value(v: Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

fn count_from_value(v: Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().map(|n| n.min(u32::MAX as u64) as u32),
        Value::Array(items) => Some(items.len().min(u32::MAX as usize) as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(v: Option<Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_u64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
