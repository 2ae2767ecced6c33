//! `recall-types` – shared data model for the Recall memory stack.
//!
//! Holds the records stored by the memory graph and the thought tracker, the
//! error taxonomy every store reports with, and the [`ToolResponse`] envelope
//! a transport adapter wraps results in.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Allocate a fresh opaque identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory graph records
// ─────────────────────────────────────────────────────────────────────────────

/// Access bookkeeping carried by every stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Monotonic read counter.
    pub access_count: u64,
}

impl NodeMetadata {
    fn fresh() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }
}

/// A stored text memory and its outgoing associations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryNode {
    pub id: String,
    pub text: String,
    /// Ids of associated nodes, in the order they were written.
    pub associations: Vec<String>,
    pub metadata: NodeMetadata,
}

impl MemoryNode {
    /// Build a node with a freshly allocated id and initialised metadata.
    pub fn new(text: String, associations: Vec<String>) -> Self {
        Self {
            id: new_id(),
            text,
            associations,
            metadata: NodeMetadata::fresh(),
        }
    }

    /// Record a read: refresh `last_accessed` and bump `access_count`.
    pub fn touch(&mut self) {
        self.metadata.last_accessed = Utc::now();
        self.metadata.access_count += 1;
    }
}

/// A single search match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
}

/// Result of reading a node together with its reachable neighbourhood.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NodeRecall {
    pub node: MemoryNode,
    /// Nodes reachable within the requested depth, in discovery order.
    pub associations: Vec<MemoryNode>,
}

/// One entry of the scratch buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScratchEntry {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Thought tracking records
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a lower-case tag into one of the enums below.
macro_rules! tagged_enum {
    ($name:ident, $label:literal, { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = RecallError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($tag => Ok($name::$variant),)+
                    other => Err(RecallError::Validation(format!(
                        "unknown {}: {other}",
                        $label
                    ))),
                }
            }
        }
    };
}

/// What kind of reasoning step a thought represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtType {
    Observation,
    Analysis,
    Decision,
    Action,
    Reflection,
    Hypothesis,
}

tagged_enum!(ThoughtType, "thought type", {
    Observation => "observation",
    Analysis => "analysis",
    Decision => "decision",
    Action => "action",
    Reflection => "reflection",
    Hypothesis => "hypothesis",
});

/// Lifecycle of a single thought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtStatus {
    Active,
    Completed,
    Discarded,
    Pending,
}

tagged_enum!(ThoughtStatus, "thought status", {
    Active => "active",
    Completed => "completed",
    Discarded => "discarded",
    Pending => "pending",
});

/// Lifecycle of a reasoning chain.
///
/// `Active → Completed` is terminal; `Active ⇄ Paused` via pause/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Active,
    Completed,
    Paused,
}

tagged_enum!(ChainStatus, "chain status", {
    Active => "active",
    Completed => "completed",
    Paused => "paused",
});

/// Reasoning style tag attached to a thinking session and to each chain.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CognitiveMode {
    #[default]
    Analytical,
    Creative,
    Critical,
    Intuitive,
    MetaCognitive,
}

tagged_enum!(CognitiveMode, "cognitive mode", {
    Analytical => "analytical",
    Creative => "creative",
    Critical => "critical",
    Intuitive => "intuitive",
    MetaCognitive => "meta_cognitive",
});

/// Coarse size tag derived from a thought's word count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Classify `text`: fewer than 20 words is low, fewer than 60 medium.
    pub fn of(text: &str) -> Self {
        match text.split_whitespace().count() {
            0..20 => Complexity::Low,
            20..60 => Complexity::Medium,
            _ => Complexity::High,
        }
    }
}

/// Free-form annotations recorded when a thought is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtMetadata {
    /// Milliseconds since the previous thought of the chain (or the chain's
    /// creation for the first one).
    pub thinking_time_ms: u64,
    pub complexity: Complexity,
}

/// A typed, confidence-scored step inside a [`ThoughtChain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtNode {
    #[serde(flatten)]
    pub memory: MemoryNode,
    #[serde(rename = "type")]
    pub thought_type: ThoughtType,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
    pub status: ThoughtStatus,
    pub parent_chain: String,
    pub previous_thought: Option<String>,
    pub next_thoughts: Vec<String>,
    pub reasoning_depth: u32,
    pub thought_metadata: ThoughtMetadata,
}

impl ThoughtNode {
    pub fn id(&self) -> &str {
        &self.memory.id
    }
}

/// An ordered reasoning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtChain {
    pub id: String,
    pub goal: String,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ChainStatus,
    pub thoughts: Vec<String>,
    /// Ids of chains branched off this one.
    pub branches: Vec<String>,
    pub cognitive_mode: CognitiveMode,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Stable tag for each [`RecallError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    Integrity,
    Storage,
}

/// Error taxonomy shared by every store.
///
/// Validation, not-found, state and integrity failures are raised before any
/// mutation, so in-memory state is unchanged when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecallError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl RecallError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        RecallError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RecallError::Validation(_) => ErrorKind::Validation,
            RecallError::NotFound { .. } => ErrorKind::NotFound,
            RecallError::State(_) => ErrorKind::State,
            RecallError::Integrity(_) => ErrorKind::Integrity,
            RecallError::Storage(_) => ErrorKind::Storage,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Result shape handed across the adapter boundary.
///
/// Either `{"success": true, "data": …}` or
/// `{"success": false, "error": "…", "details": {"kind": "…"}}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl<T> ToolResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
        }
    }

    pub fn failure(err: &RecallError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            details: Some(serde_json::json!({ "kind": err.kind() })),
        }
    }
}

impl<T> From<Result<T, RecallError>> for ToolResponse<T> {
    fn from(result: Result<T, RecallError>) -> Self {
        match result {
            Ok(data) => ToolResponse::ok(data),
            Err(e) => ToolResponse::failure(&e),
        }
    }
}
